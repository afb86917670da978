//! Storage metrics.
//!
//! Plain atomic counters read by operators and tests. The handle is passed
//! into the adapter explicitly; nothing here is process-global.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one block log attachment.
#[derive(Debug, Default)]
pub struct BlockLogMetrics {
    /// Bytes of valid records on disk.
    size_on_disk_bytes: AtomicU64,
    /// Height of the last committed block.
    top_height: AtomicU64,
    /// Blocks committed during this attachment (excludes replayed ones).
    blocks_written: AtomicU64,
}

impl BlockLogMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the gauges after the index rebuild.
    pub fn record_open(&self, size_on_disk: u64, top_height: u64) {
        self.size_on_disk_bytes.store(size_on_disk, Ordering::Relaxed);
        self.top_height.store(top_height, Ordering::Relaxed);
    }

    /// Records one committed block.
    pub fn record_commit(&self, record_bytes: u64, height: u64) {
        self.size_on_disk_bytes
            .fetch_add(record_bytes, Ordering::Relaxed);
        self.top_height.store(height, Ordering::Relaxed);
        self.blocks_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn size_on_disk_bytes(&self) -> u64 {
        self.size_on_disk_bytes.load(Ordering::Relaxed)
    }

    pub fn top_height(&self) -> u64 {
        self.top_height.load(Ordering::Relaxed)
    }

    pub fn blocks_written(&self) -> u64 {
        self.blocks_written.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_accumulates_over_open_baseline() {
        let metrics = BlockLogMetrics::new();
        metrics.record_open(1000, 4);
        metrics.record_commit(250, 5);
        metrics.record_commit(250, 6);

        assert_eq!(metrics.size_on_disk_bytes(), 1500);
        assert_eq!(metrics.top_height(), 6);
        assert_eq!(metrics.blocks_written(), 2);
    }
}
