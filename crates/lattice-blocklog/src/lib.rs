//! # Lattice Block Log
//!
//! The durable block log of a Lattice node: persists finalized blocks to
//! local disk, serves ordered and random-access retrieval, and survives
//! process crashes and file corruption without losing previously-committed
//! data.
//!
//! ## Components
//!
//! - [`domain::codec`] - checksummed, size-bounded record serialization
//! - [`domain::index`] - in-memory height-to-offset table plus timestamp
//!   buckets, rebuilt at attach time by replaying the file
//! - [`adapters::filesystem`] - the writing tip and the
//!   [`FilesystemPersistence`] orchestrator implementing the
//!   [`BlockPersistence`] contract
//! - [`adapters::lock`] - cross-process advisory lock on the data dir
//! - [`sync`] - the [`BlockTracker`] height gate
//!
//! ## Durability model
//!
//! A write is acknowledged only after its record was fsynced; the index is
//! always a subset of what is durably on disk. A crash mid-flush leaves a
//! garbage tail that the next attach silently treats as "not yet
//! committed" and the next append overwrites. Bit corruption anywhere in a
//! committed record is caught by a CRC32-C checksum on every read.
//!
//! ## Concurrency model
//!
//! One logical writer at a time, arbitrarily many readers. Writers
//! serialize on the writing tip; readers snapshot an offset from the index
//! and then run on their own file handles outside any lock.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod sync;

pub use adapters::filesystem::FilesystemPersistence;
pub use adapters::lock::{DirectoryLock, LockError};
pub use domain::codec::{Codec, CODEC_VERSION, RECORD_HEADER_LEN};
pub use domain::config::{BlockLogConfig, ConfigError};
pub use domain::errors::{CodecError, IndexError, PersistenceError};
pub use domain::index::BlockHeightIndex;
pub use domain::metrics::BlockLogMetrics;
pub use ports::{BlockPersistence, ScanCursor};
pub use sync::{BlockTracker, TrackerError};
