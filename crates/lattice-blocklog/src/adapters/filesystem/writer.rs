//! The writing tip: owner of the single write handle and the append cursor
//! of the log file.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};

use lattice_types::BlockPair;

use crate::domain::codec::Codec;
use crate::domain::errors::PersistenceError;

/// Append cursor over the log file. One per attachment; the orchestrator
/// serializes access through a mutex.
///
/// `current_pos` caches where the file cursor stands. `None` means unknown
/// (set after any write error) and forces an explicit seek before the next
/// append, so a failed write can never desynchronize the tip from the file.
#[derive(Debug)]
pub(crate) struct WritingTip {
    file: File,
    current_pos: Option<u64>,
    codec: Codec,
}

impl WritingTip {
    /// Positions the tip at `end_offset` (the end of the valid record
    /// prefix established by the index rebuild).
    pub(crate) fn new(
        mut file: File,
        codec: Codec,
        end_offset: u64,
    ) -> Result<Self, PersistenceError> {
        let reached = file.seek(SeekFrom::Start(end_offset))?;
        if reached != end_offset {
            return Err(PersistenceError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("failed to seek writing tip to offset {end_offset}, reached {reached}"),
            )));
        }
        Ok(Self {
            file,
            current_pos: Some(end_offset),
            codec,
        })
    }

    /// Appends one encoded record at `pos` and forces it to stable storage
    /// before acknowledging. Returns the new end offset.
    ///
    /// Seeks only when the cached position is unknown or differs from the
    /// requested one (first write after reopen, or the file was touched
    /// from outside). The cached position is updated strictly after the
    /// fsync and the position re-read both succeeded.
    pub(crate) fn write_block_at_offset(
        &mut self,
        pos: u64,
        block: &BlockPair,
    ) -> Result<u64, PersistenceError> {
        if self.current_pos != Some(pos) {
            let reached = self.file.seek(SeekFrom::Start(pos))?;
            if reached != pos {
                return Err(PersistenceError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("failed to seek writing tip to offset {pos}, reached {reached}"),
                )));
            }
        }

        // Unknown until the append fully succeeds.
        self.current_pos = None;

        let mut writer = BufWriter::new(&mut self.file);
        self.codec.encode(block, &mut writer)?;
        writer.flush()?;
        drop(writer);

        self.file.sync_data()?;

        let new_pos = self.file.stream_position()?;
        self.current_pos = Some(new_pos);
        Ok(new_pos)
    }

    /// Flushes pending data to stable storage.
    pub(crate) fn sync(&self) -> std::io::Result<()> {
        self.file.sync_data()
    }
}
