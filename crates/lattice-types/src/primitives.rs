//! Primitive aliases used across the workspace.

/// Length of every hash in the system.
pub const HASH_LEN: usize = 32;

/// A 32-byte SHA-256 digest.
pub type Hash = [u8; HASH_LEN];

/// 1-based sequential block position. Height 0 is never stored; it denotes
/// the empty log.
pub type BlockHeight = u64;

/// Nanoseconds since the Unix epoch.
pub type TimestampNano = u64;
