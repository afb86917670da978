//! Cross-process advisory lock on the data directory.
//!
//! Uses `fs2` for cross-platform file locking (flock on Unix, LockFile on
//! Windows). A second process attaching to the same directory fails fast;
//! there is no retry, the two would otherwise corrupt the shared file.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

/// Lock file name inside the data directory.
const LOCK_FILE: &str = "LOCK";

/// Errors from directory locking.
#[derive(Debug)]
pub enum LockError {
    /// Lock file could not be created.
    CreateFailed(io::Error),
    /// Data directory is already locked by another process.
    AlreadyLocked {
        holder_pid: Option<u32>,
        path: PathBuf,
    },
    /// Failed to write the PID to the lock file.
    WriteFailed(io::Error),
}

impl std::fmt::Display for LockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockError::CreateFailed(e) => write!(f, "failed to create lock file: {e}"),
            LockError::AlreadyLocked { holder_pid, path } => {
                if let Some(pid) = holder_pid {
                    write!(
                        f,
                        "data directory already in use by process {} ({})",
                        pid,
                        path.display()
                    )
                } else {
                    write!(f, "data directory already in use ({})", path.display())
                }
            }
            LockError::WriteFailed(e) => write!(f, "failed to write PID to lock file: {e}"),
        }
    }
}

impl std::error::Error for LockError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LockError::CreateFailed(e) | LockError::WriteFailed(e) => Some(e),
            LockError::AlreadyLocked { .. } => None,
        }
    }
}

/// Exclusive advisory lock on a data directory.
///
/// Acquired at attach time, held for the attachment's lifetime, released
/// on drop (RAII).
#[derive(Debug)]
pub struct DirectoryLock {
    file: File,
    path: PathBuf,
    pid: u32,
}

impl DirectoryLock {
    /// Acquires the lock or fails immediately.
    ///
    /// On contention the error carries the holder's PID when the lock file
    /// is readable.
    pub fn acquire(data_dir: &Path) -> Result<Self, LockError> {
        let lock_path = data_dir.join(LOCK_FILE);

        // No truncation before the lock is ours: the current content may be
        // another live process's PID.
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&lock_path)
            .map_err(LockError::CreateFailed)?;

        if file.try_lock_exclusive().is_err() {
            return Err(LockError::AlreadyLocked {
                holder_pid: Self::read_existing_pid(&lock_path),
                path: lock_path,
            });
        }

        let pid = std::process::id();
        let mut locked_file = file;
        locked_file.set_len(0).map_err(LockError::WriteFailed)?;
        writeln!(locked_file, "{pid}").map_err(LockError::WriteFailed)?;
        locked_file.sync_all().map_err(LockError::WriteFailed)?;

        tracing::debug!(path = %lock_path.display(), pid, "acquired data directory lock");

        Ok(Self {
            file: locked_file,
            path: lock_path,
            pid,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// PID from an existing lock file, for error messages.
    fn read_existing_pid(path: &Path) -> Option<u32> {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        let _ = std::fs::remove_file(&self.path);
    }
}
