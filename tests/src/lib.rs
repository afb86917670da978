//! # Lattice Block Log Test Suite
//!
//! Cross-crate tests exercising the persistence contract end to end
//! against real temp directories:
//!
//! ```text
//! tests/src/
//! ├── contract.rs        # Public BlockPersistence behavior over full
//! │                      # attach / write / reopen cycles
//! ├── crash_recovery.rs  # Truncated and bit-corrupted file tails
//! └── concurrency.rs     # Scans racing writes, waiters racing commits
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p lattice-tests
//! ```

#[cfg(test)]
mod concurrency;
#[cfg(test)]
mod contract;
#[cfg(test)]
mod crash_recovery;
