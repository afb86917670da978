//! Error types for the block log, one enum per failure layer.
//!
//! Corruption-class codec errors always carry how many bytes of the record
//! were consumed before the failure, so the index rebuild can decide where
//! the valid prefix of the file ends.

use std::io;

use thiserror::Error;

use lattice_types::{BlockHeight, TypesError};

use crate::domain::codec::RECORD_HEADER_LEN;

/// Failures while encoding or decoding one on-disk record.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The record would exceed the configured maximum size. Raised before
    /// any byte is written.
    #[error("record of {size} bytes exceeds the {max} byte limit")]
    SizeLimitExceeded { size: usize, max: usize },

    /// The header declares a record larger than the configured maximum.
    #[error("record header declares {declared} bytes, limit is {max}")]
    DeclaredTooLarge { declared: usize, max: usize },

    /// Clean end of the log: zero bytes available where the next record
    /// header would start.
    #[error("end of log")]
    Eof,

    /// The reader ran dry in the middle of a record.
    #[error("truncated record after {consumed} bytes")]
    TruncatedRecord { consumed: usize },

    /// The record version is not the one this codec writes.
    #[error("unsupported record version {version}")]
    UnsupportedVersion { version: u32, consumed: usize },

    /// A chunk length would overrun the size the header declared.
    #[error("chunk of {chunk_len} bytes overruns the declared record size {declared}")]
    ChunkOverrun {
        chunk_len: usize,
        declared: usize,
        consumed: usize,
    },

    /// A section header declares more elements than the record could hold.
    #[error("section declares {count} elements, record is only {declared} bytes")]
    ImplausibleCount {
        count: u32,
        declared: usize,
        consumed: usize,
    },

    /// The chunks did not add up to the size the header declared.
    #[error("record consumed {consumed} bytes, header declared {declared}")]
    DeclaredSizeMismatch { declared: usize, consumed: usize },

    /// The stored checksum disagrees with the one recomputed while reading.
    #[error("record checksum mismatch: computed {computed:#010x}, stored {stored:#010x}")]
    ChecksumMismatch {
        computed: u32,
        stored: u32,
        consumed: usize,
    },

    /// A chunk parsed into an invalid sub-record.
    #[error("invalid sub-record in chunk: {source}")]
    InvalidChunk {
        #[source]
        source: TypesError,
        consumed: usize,
    },

    /// An I/O failure outside the codec's control.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl CodecError {
    /// Bytes of the record successfully consumed before the failure.
    pub fn consumed(&self) -> usize {
        match self {
            CodecError::SizeLimitExceeded { .. } | CodecError::Eof | CodecError::Io(_) => 0,
            CodecError::DeclaredTooLarge { .. } => RECORD_HEADER_LEN,
            CodecError::TruncatedRecord { consumed }
            | CodecError::UnsupportedVersion { consumed, .. }
            | CodecError::ChunkOverrun { consumed, .. }
            | CodecError::ImplausibleCount { consumed, .. }
            | CodecError::DeclaredSizeMismatch { consumed, .. }
            | CodecError::ChecksumMismatch { consumed, .. }
            | CodecError::InvalidChunk { consumed, .. } => *consumed,
        }
    }
}

/// Failures of the in-memory block height index.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// The caller's view of the top offset disagrees with the index: the
    /// signature of a second writer racing on the same file.
    #[error("unexpected top block offset: index records {expected}, caller saw {found}; \
             possibly two processes writing the same file")]
    UnexpectedTopOffset { expected: u64, found: u64 },

    /// A block arrived whose height does not extend the contiguous run.
    #[error("block height {height} does not follow current top {top}")]
    HeightGap { height: BlockHeight, top: BlockHeight },

    /// Internal bookkeeping lost an offset it must always hold.
    #[error("index missing offset for block height {height}")]
    MissingOffset { height: BlockHeight },
}

/// Failures surfaced by the public persistence contract.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("attempt to write block {height} out of order; current top height is {top}")]
    BlockOutOfOrder { height: BlockHeight, top: BlockHeight },

    /// A block was resubmitted at the current top height with different
    /// content than what is committed.
    #[error("block {height} is already committed with different content")]
    BlockConflict { height: BlockHeight },

    #[error("no block at height {height}")]
    HeightNotFound { height: BlockHeight },

    /// Corruption detected while reading previously-indexed data. Unlike
    /// the rebuild-time truncation policy this is never swallowed: the
    /// index promised this offset held a valid record.
    #[error("block record for height {height} is corrupt: {source}")]
    Corruption {
        height: BlockHeight,
        #[source]
        source: CodecError,
    },

    /// The codec rejected the record on the write path.
    #[error("record rejected by codec: {0}")]
    Codec(#[from] CodecError),

    /// The submitted block pair is internally inconsistent.
    #[error("inconsistent block pair: {0}")]
    InvalidBlock(#[from] TypesError),

    #[error(transparent)]
    Index(#[from] IndexError),

    /// The data directory's advisory lock is held by another process.
    #[error("data directory locked: {message}")]
    Locked { message: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}
