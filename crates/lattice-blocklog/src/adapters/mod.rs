//! Adapter implementations: the filesystem persistence engine and the
//! cross-process directory lock it holds.

pub mod filesystem;
pub mod lock;

pub use filesystem::FilesystemPersistence;
pub use lock::{DirectoryLock, LockError};
