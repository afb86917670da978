//! # Lattice Shared Types
//!
//! Domain entities for the Lattice block log. A committed block is a
//! [`BlockPair`]: a transactions section (header, metadata, signed
//! transactions, proof) plus a results section (header, bloom filter,
//! receipts, state diffs, proof).
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every crate in the workspace consumes the
//!   entities defined here.
//! - **Byte-faithful sub-records**: each sub-record serializes to an exact
//!   little-endian byte layout via `to_bytes` and reconstructs losslessly
//!   via `from_bytes`. The storage codec treats sub-records as opaque
//!   chunks through this contract alone.
//! - **Declared counts are authoritative**: the section headers carry the
//!   transaction / receipt / state-diff counts that the storage codec
//!   trusts when sizing its reads.

pub mod block;
pub mod builders;
pub mod encoding;
pub mod primitives;
pub mod results;
pub mod transactions;

pub use block::{BlockPair, ResultsBlockContainer, TransactionsBlockContainer};
pub use builders::{build_deterministic_chain, build_random_chain, BlockPairBuilder};
pub use encoding::TypesError;
pub use primitives::{BlockHeight, Hash, TimestampNano, HASH_LEN};
pub use results::{
    ContractStateDiff, ResultsBlockHeader, ResultsBlockProof, ResultsBloomFilter,
    TransactionReceipt,
};
pub use transactions::{
    SignedTransaction, TransactionsBlockHeader, TransactionsBlockMetadata, TransactionsBlockProof,
};
