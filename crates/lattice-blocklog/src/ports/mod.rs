//! The public block persistence contract.

use std::sync::Arc;

use lattice_types::{
    BlockHeight, BlockPair, Hash, ResultsBlockContainer, TimestampNano,
    TransactionsBlockContainer,
};

use crate::domain::errors::PersistenceError;
use crate::sync::BlockTracker;

/// Page callback for [`BlockPersistence::scan_blocks`]. Receives the height
/// of the first block in the page and the page itself; returns whether the
/// scan should continue.
pub type ScanCursor<'a> = &'a mut dyn FnMut(BlockHeight, &[BlockPair]) -> bool;

/// Ordered, corruption-checked storage and retrieval of committed blocks.
///
/// Callers hand in already-validated blocks; the log guarantees faithful
/// bytes, strict height ordering and fsync-before-acknowledge durability.
/// It never judges block semantics.
pub trait BlockPersistence: Send + Sync {
    /// Appends the next block. Returns `Ok(true)` when the block was
    /// committed, `Ok(false)` when it is a byte-identical resubmission of
    /// the current top (idempotent retry), and an error for any
    /// out-of-order or conflicting write. Does not return before the
    /// record reached stable storage.
    fn write_next_block(&self, block: BlockPair) -> Result<bool, PersistenceError>;

    /// Streams pages of up to `page_size` consecutive blocks starting at
    /// `from_height`, until the cursor declines or the top height is
    /// reached. Fails up front when `from_height` is not in the log.
    ///
    /// A scan overlapping a concurrent write may or may not observe the
    /// new top block, depending on interleaving; the log is append-only,
    /// so everything the scan does return is final.
    fn scan_blocks(
        &self,
        from_height: BlockHeight,
        page_size: u8,
        cursor: ScanCursor<'_>,
    ) -> Result<(), PersistenceError>;

    /// The most recently committed block, if any.
    fn get_last_block(&self) -> Result<Option<Arc<BlockPair>>, PersistenceError>;

    /// Height of the most recently committed block; 0 for an empty log.
    fn get_last_block_height(&self) -> Result<BlockHeight, PersistenceError>;

    /// Transactions section of the block at `height`.
    fn get_transactions_block(
        &self,
        height: BlockHeight,
    ) -> Result<TransactionsBlockContainer, PersistenceError>;

    /// Results section of the block at `height`.
    fn get_results_block(
        &self,
        height: BlockHeight,
    ) -> Result<ResultsBlockContainer, PersistenceError>;

    /// Finds the block holding the receipt for `tx_hash` among blocks whose
    /// timestamps fall within `[min_timestamp, max_timestamp]`. Returns the
    /// block and the receipt's index within it, or `None` when nothing in
    /// the range matches.
    fn get_block_by_tx(
        &self,
        tx_hash: Hash,
        min_timestamp: TimestampNano,
        max_timestamp: TimestampNano,
    ) -> Result<Option<(BlockPair, usize)>, PersistenceError>;

    /// Height gate woken on every durable append.
    fn get_block_tracker(&self) -> &BlockTracker;
}
