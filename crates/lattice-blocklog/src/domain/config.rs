//! Block log configuration.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Default cap on one encoded record: 32 MiB.
pub const DEFAULT_MAX_RECORD_SIZE_BYTES: u32 = 32 * 1024 * 1024;

/// Default grace distance for the block tracker.
pub const DEFAULT_TRACKER_GRACE_DISTANCE: u64 = 5;

fn default_virtual_chain_id() -> u32 {
    42
}

fn default_max_record_size() -> u32 {
    DEFAULT_MAX_RECORD_SIZE_BYTES
}

fn default_grace_distance() -> u64 {
    DEFAULT_TRACKER_GRACE_DISTANCE
}

/// Configuration for one block log attachment.
///
/// Loadable from a JSON file; every field but `data_dir` has a default:
///
/// ```json
/// {
///   "data_dir": "/var/lib/lattice/blocks",
///   "virtual_chain_id": 42,
///   "max_record_size_bytes": 33554432,
///   "tracker_grace_distance": 5
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct BlockLogConfig {
    /// Directory holding the data file and the advisory lock file.
    pub data_dir: PathBuf,

    /// Virtual chain this log belongs to; selects the data file name.
    #[serde(default = "default_virtual_chain_id")]
    pub virtual_chain_id: u32,

    /// Upper bound on one encoded record, enforced on encode and decode.
    #[serde(default = "default_max_record_size")]
    pub max_record_size_bytes: u32,

    /// How far above the committed top a tracker wait may reach before
    /// failing immediately.
    #[serde(default = "default_grace_distance")]
    pub tracker_grace_distance: u64,
}

impl BlockLogConfig {
    /// Config with defaults for everything but the data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            virtual_chain_id: default_virtual_chain_id(),
            max_record_size_bytes: default_max_record_size(),
            tracker_grace_distance: default_grace_distance(),
        }
    }

    pub fn with_virtual_chain_id(mut self, id: u32) -> Self {
        self.virtual_chain_id = id;
        self
    }

    pub fn with_max_record_size_bytes(mut self, max: u32) -> Self {
        self.max_record_size_bytes = max;
        self
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// One data file per virtual chain under the data directory.
    pub fn blocks_file_path(&self) -> PathBuf {
        self.data_dir
            .join(format!("blocks-{:06}", self.virtual_chain_id))
    }
}

/// Failures loading a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
