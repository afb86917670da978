//! The filesystem persistence adapter.
//!
//! Composes the height index (where), the writing tip and raw file reads
//! (what) into the [`BlockPersistence`] contract over a single growing
//! data file. One writer at a time, serialized through the tip mutex;
//! readers snapshot an offset under the index read lock and then do all
//! file I/O on independently-opened handles, so a long scan never blocks a
//! write and a write never blocks a running scan.

mod writer;

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use lattice_types::{
    BlockHeight, BlockPair, Hash, ResultsBlockContainer, TimestampNano,
    TransactionsBlockContainer,
};

use crate::adapters::lock::DirectoryLock;
use crate::domain::codec::Codec;
use crate::domain::config::BlockLogConfig;
use crate::domain::errors::PersistenceError;
use crate::domain::index::BlockHeightIndex;
use crate::domain::metrics::BlockLogMetrics;
use crate::ports::{BlockPersistence, ScanCursor};
use crate::sync::BlockTracker;

use writer::WritingTip;

const REBUILD_READ_BUFFER: usize = 1024 * 1024;

/// Block persistence over one append-only file per virtual chain.
///
/// Startup: lock the directory, open (or create) the data file, rebuild
/// the index by replaying the codec, position the writing tip at the end
/// of the valid prefix. Only then are reads and writes served.
#[derive(Debug)]
pub struct FilesystemPersistence {
    config: BlockLogConfig,
    codec: Codec,
    index: BlockHeightIndex,
    tip: Mutex<WritingTip>,
    tracker: BlockTracker,
    metrics: Arc<BlockLogMetrics>,
    // Held for the attachment's lifetime; released on drop.
    _lock: DirectoryLock,
}

impl FilesystemPersistence {
    /// Attaches to `config.data_dir`, creating it if needed.
    pub fn open(config: BlockLogConfig) -> Result<Self, PersistenceError> {
        Self::open_with_metrics(config, Arc::new(BlockLogMetrics::new()))
    }

    /// Attaches with a caller-owned metrics handle.
    ///
    /// Failures that are not decode errors (unusable directory, lock
    /// contention, permissions) abort the attach. A corrupt or truncated
    /// file tail does not: the log ends at the last good record.
    pub fn open_with_metrics(
        config: BlockLogConfig,
        metrics: Arc<BlockLogMetrics>,
    ) -> Result<Self, PersistenceError> {
        fs::create_dir_all(&config.data_dir)?;
        let lock = DirectoryLock::acquire(&config.data_dir)
            .map_err(|e| PersistenceError::Locked {
                message: e.to_string(),
            })?;

        let path = config.blocks_file_path();
        let existed = path.exists();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;
        if existed {
            tracing::info!(file = %path.display(), "opened existing blocks file");
        } else {
            tracing::info!(file = %path.display(), "created new blocks file");
        }

        let codec = Codec::new(config.max_record_size_bytes as usize);
        let index = BlockHeightIndex::new();
        let valid_len = {
            let mut reader = BufReader::with_capacity(REBUILD_READ_BUFFER, &file);
            index.rebuild(&mut reader, &codec)?
        };

        let tip = WritingTip::new(file, codec, valid_len)?;
        let tracker = BlockTracker::new(index.last_height(), config.tracker_grace_distance);
        metrics.record_open(valid_len, index.last_height());

        Ok(Self {
            config,
            codec,
            index,
            tip: Mutex::new(tip),
            tracker,
            metrics,
            _lock: lock,
        })
    }

    pub fn metrics(&self) -> &BlockLogMetrics {
        &self.metrics
    }

    /// Flushes the data file and logs the shutdown. The file handles and
    /// the directory lock release on drop; cancellation takes effect
    /// between operations, never inside an fsync.
    pub fn graceful_shutdown(&self) {
        let tip = self.tip.lock().expect("writing tip lock poisoned");
        if let Err(e) = tip.sync() {
            tracing::error!(error = %e, "failed to flush blocks file on shutdown");
            return;
        }
        tracing::info!(file = %self.blocks_file_path().display(), "closed blocks file");
    }

    fn blocks_file_path(&self) -> PathBuf {
        self.config.blocks_file_path()
    }

    /// Opens an independent read handle positioned at the record for
    /// `height`.
    fn open_reader_at(&self, height: BlockHeight) -> Result<BufReader<File>, PersistenceError> {
        let offset = self
            .index
            .block_start_offset(height)
            .ok_or(PersistenceError::HeightNotFound { height })?;

        let file = File::open(self.blocks_file_path())?;
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(offset))?;
        Ok(reader)
    }

    /// Point read of one block by height.
    fn fetch_block(&self, height: BlockHeight) -> Result<BlockPair, PersistenceError> {
        let mut reader = self.open_reader_at(height)?;
        let (block, _) = self
            .codec
            .decode(&mut reader)
            .map_err(|source| PersistenceError::Corruption { height, source })?;
        Ok(block)
    }
}

impl BlockPersistence for FilesystemPersistence {
    fn write_next_block(&self, block: BlockPair) -> Result<bool, PersistenceError> {
        block.check_consistency()?;

        // The tip mutex is the writer serialization point; it stays held
        // across encode+fsync+index so concurrent writers queue up here.
        let mut tip = self.tip.lock().expect("writing tip lock poisoned");

        let top = self.index.last_height();
        let height = block.height();

        if height != top + 1 {
            if height == top && top > 0 {
                let stored = self
                    .index
                    .last_block()
                    .ok_or(PersistenceError::HeightNotFound { height })?;
                if *stored == block {
                    tracing::debug!(height, "ignoring resubmission of current top block");
                    return Ok(false);
                }
                return Err(PersistenceError::BlockConflict { height });
            }
            return Err(PersistenceError::BlockOutOfOrder { height, top });
        }

        let start_pos = self.index.top_end_offset();
        let new_pos = tip.write_block_at_offset(start_pos, &block)?;

        let block = Arc::new(block);
        self.index.append_block(start_pos, new_pos, Arc::clone(&block))?;
        self.tracker.advance_to(height);
        self.metrics.record_commit(new_pos - start_pos, height);

        tracing::info!(
            height,
            bytes = new_pos - start_pos,
            num_transactions = block.transactions_block.signed_transactions.len(),
            "committed block"
        );
        Ok(true)
    }

    fn scan_blocks(
        &self,
        from_height: BlockHeight,
        page_size: u8,
        cursor: ScanCursor<'_>,
    ) -> Result<(), PersistenceError> {
        let mut top = self.index.last_height();
        if from_height == 0 || from_height > top {
            return Err(PersistenceError::HeightNotFound {
                height: from_height,
            });
        }
        let page_size = usize::from(page_size.max(1));

        let mut reader = self.open_reader_at(from_height)?;
        let mut next_height = from_height;
        let mut wants_more = true;

        while wants_more && next_height <= top {
            let mut page = Vec::with_capacity(page_size);
            while page.len() < page_size && next_height <= top {
                // Unlike the index rebuild, a decode failure on
                // previously-indexed data is unexpected and fatal to the
                // scan: the index promised this offset was valid.
                let (block, _) = self.codec.decode(&mut reader).map_err(|source| {
                    PersistenceError::Corruption {
                        height: next_height,
                        source,
                    }
                })?;
                next_height = block.height() + 1;
                page.push(block);
            }
            if page.is_empty() {
                break;
            }
            wants_more = cursor(page[0].height(), &page);
            // New blocks committed while the cursor ran become visible to
            // the next page.
            top = self.index.last_height();
        }
        Ok(())
    }

    fn get_last_block(&self) -> Result<Option<Arc<BlockPair>>, PersistenceError> {
        Ok(self.index.last_block())
    }

    fn get_last_block_height(&self) -> Result<BlockHeight, PersistenceError> {
        Ok(self.index.last_height())
    }

    fn get_transactions_block(
        &self,
        height: BlockHeight,
    ) -> Result<TransactionsBlockContainer, PersistenceError> {
        Ok(self.fetch_block(height)?.transactions_block)
    }

    fn get_results_block(
        &self,
        height: BlockHeight,
    ) -> Result<ResultsBlockContainer, PersistenceError> {
        Ok(self.fetch_block(height)?.results_block)
    }

    fn get_block_by_tx(
        &self,
        tx_hash: Hash,
        min_timestamp: TimestampNano,
        max_timestamp: TimestampNano,
    ) -> Result<Option<(BlockPair, usize)>, PersistenceError> {
        let Some(scan_from) = self
            .index
            .earliest_height_in_time_range(min_timestamp, max_timestamp)
        else {
            tracing::debug!(
                tx_hash = %hex::encode(&tx_hash[..8]),
                "no timestamp bucket matches the requested range"
            );
            return Ok(None);
        };

        let mut found: Option<(BlockPair, usize)> = None;
        self.scan_blocks(scan_from, 1, &mut |_, page| {
            let block = &page[0];
            let ts = block.timestamp();
            if ts > max_timestamp {
                return false;
            }
            if ts < min_timestamp {
                return true;
            }
            for (i, receipt) in block.results_block.transaction_receipts.iter().enumerate() {
                if receipt.tx_hash == tx_hash {
                    found = Some((block.clone(), i));
                    return false;
                }
            }
            true
        })?;

        Ok(found)
    }

    fn get_block_tracker(&self) -> &BlockTracker {
        &self.tracker
    }
}
