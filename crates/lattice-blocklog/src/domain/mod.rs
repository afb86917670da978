//! Pure domain logic of the block log: record codec, height index,
//! configuration, metrics and the error taxonomy. No file handles live
//! here; the adapters own those.

pub mod codec;
pub mod config;
pub mod errors;
pub mod index;
pub mod metrics;
