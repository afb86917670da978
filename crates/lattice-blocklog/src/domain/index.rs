//! The in-memory block height index.
//!
//! Answers "at which byte offset does the record for height H start" and
//! "which is the earliest block whose timestamp falls into a time range"
//! without touching the file. Built once at attach time by replaying the
//! codec over the existing file, then extended in memory after every
//! fsynced append. Never persisted: durability lives in the file.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::Read;
use std::sync::{Arc, RwLock};

use lattice_types::{BlockHeight, BlockPair, TimestampNano};

use crate::domain::codec::Codec;
use crate::domain::errors::{CodecError, IndexError};

const MINUTE_NANOS: u64 = 60 * 1_000_000_000;

/// Bucket key for the coarse timestamp index: one bucket per minute.
pub(crate) fn ts_bucket_key(ts: TimestampNano) -> u32 {
    (ts / MINUTE_NANOS) as u32
}

#[derive(Debug)]
struct IndexState {
    /// `end_offset[h]` is the byte offset at which the record for `h + 1`
    /// begins (equivalently, the end of record `h`). Height 0 maps to
    /// offset 0 so "where does block 1 start" is always answerable.
    end_offset: HashMap<BlockHeight, u64>,
    /// Earliest block height per timestamp bucket, blocks with receipts
    /// only. First writer wins so "earliest" is preserved.
    first_block_in_ts_bucket: HashMap<u32, BlockHeight>,
    top_height: BlockHeight,
    top_block: Option<Arc<BlockPair>>,
}

impl IndexState {
    fn empty() -> Self {
        Self {
            end_offset: HashMap::from([(0, 0)]),
            first_block_in_ts_bucket: HashMap::new(),
            top_height: 0,
            top_block: None,
        }
    }
}

/// Single owned structure, many readers, one logical writer at a time.
/// Mutations hold the write lock only for the bookkeeping step, never
/// across file I/O.
#[derive(Debug)]
pub struct BlockHeightIndex {
    state: RwLock<IndexState>,
}

impl Default for BlockHeightIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockHeightIndex {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(IndexState::empty()),
        }
    }

    /// Resets and rebuilds by replaying `codec` over `reader` from offset 0.
    /// Returns the byte length of the valid record prefix.
    ///
    /// Decode failures end the replay without propagating: trailing garbage
    /// or a partially-flushed record from an interrupted prior run is an
    /// expected, recoverable event: the log simply ends at the last good
    /// record. Bookkeeping failures (`IndexError`) do propagate; they mean
    /// the file holds well-formed records that are not a contiguous chain.
    pub fn rebuild(&self, reader: &mut impl Read, codec: &Codec) -> Result<u64, IndexError> {
        *self.state.write().expect("index lock poisoned") = IndexState::empty();

        let mut offset: u64 = 0;
        loop {
            match codec.decode(reader) {
                Ok((block, consumed)) => {
                    let new_offset = offset + consumed as u64;
                    self.append_block(offset, new_offset, Arc::new(block))?;
                    offset = new_offset;
                }
                Err(CodecError::Eof) => {
                    tracing::info!(
                        valid_bytes = offset,
                        top_height = self.last_height(),
                        "rebuilt block height index"
                    );
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        valid_bytes = offset,
                        top_height = self.last_height(),
                        error = %e,
                        "rebuilt block height index, ignoring invalid trailing records"
                    );
                    break;
                }
            }
        }
        Ok(offset)
    }

    /// Records one appended block. `prev_top_offset` must equal the end
    /// offset currently recorded for the top block; a disagreement means a
    /// second writer raced on the same file and fails loudly rather than
    /// silently corrupting the index.
    pub fn append_block(
        &self,
        prev_top_offset: u64,
        new_top_offset: u64,
        block: Arc<BlockPair>,
    ) -> Result<(), IndexError> {
        let mut state = self.state.write().expect("index lock poisoned");

        let expected = *state
            .end_offset
            .get(&state.top_height)
            .ok_or(IndexError::MissingOffset {
                height: state.top_height,
            })?;
        if expected != prev_top_offset {
            return Err(IndexError::UnexpectedTopOffset {
                expected,
                found: prev_top_offset,
            });
        }

        let height = block.height();
        if height != state.top_height + 1 {
            return Err(IndexError::HeightGap {
                height,
                top: state.top_height,
            });
        }

        state.end_offset.insert(height, new_top_offset);
        state.top_height = height;

        if block.num_transaction_receipts() > 0 {
            if let Entry::Vacant(slot) = state
                .first_block_in_ts_bucket
                .entry(ts_bucket_key(block.timestamp()))
            {
                slot.insert(height);
            }
        }

        state.top_block = Some(block);
        Ok(())
    }

    /// Byte offset at which the record for `height` starts, if stored.
    pub fn block_start_offset(&self, height: BlockHeight) -> Option<u64> {
        let state = self.state.read().expect("index lock poisoned");
        if height == 0 || height > state.top_height {
            return None;
        }
        state.end_offset.get(&(height - 1)).copied()
    }

    /// End offset of the top record, where the next append begins.
    pub fn top_end_offset(&self) -> u64 {
        let state = self.state.read().expect("index lock poisoned");
        state
            .end_offset
            .get(&state.top_height)
            .copied()
            .unwrap_or(0)
    }

    pub fn last_height(&self) -> BlockHeight {
        self.state.read().expect("index lock poisoned").top_height
    }

    pub fn last_block(&self) -> Option<Arc<BlockPair>> {
        self.state
            .read()
            .expect("index lock poisoned")
            .top_block
            .clone()
    }

    /// Earliest stored height whose timestamp bucket falls inside
    /// `[from, to]`, scanning bucket keys in order.
    pub fn earliest_height_in_time_range(
        &self,
        from: TimestampNano,
        to: TimestampNano,
    ) -> Option<BlockHeight> {
        if from > to {
            return None;
        }
        let state = self.state.read().expect("index lock poisoned");
        (ts_bucket_key(from)..=ts_bucket_key(to))
            .find_map(|bucket| state.first_block_in_ts_bucket.get(&bucket).copied())
    }
}
