//! Little-endian byte readers and writers for the sub-record layouts.
//!
//! Every sub-record in this crate serializes through [`ByteWriter`] and
//! parses through [`ByteReader`]. The reader is strict: a record must
//! consume its input exactly, and every length prefix is bounds-checked
//! before allocation.

use thiserror::Error;

use crate::primitives::{Hash, HASH_LEN};

/// Errors from reconstructing a sub-record out of raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    /// The buffer ended before the record did.
    #[error("truncated record: needed {needed} more bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// The record ended before the buffer did.
    #[error("record leaves {count} trailing bytes")]
    TrailingBytes { count: usize },

    /// A string field held invalid UTF-8.
    #[error("invalid utf-8 in string field")]
    InvalidUtf8,

    /// A header count disagrees with the actual element count.
    #[error("{section} header declares {declared} elements, container holds {actual}")]
    CountMismatch {
        section: &'static str,
        declared: u32,
        actual: usize,
    },

    /// The two block sections disagree on the block height.
    #[error("transactions section height {transactions} != results section height {results}")]
    HeightMismatch { transactions: u64, results: u64 },
}

/// Append-only little-endian writer.
#[derive(Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_hash(&mut self, h: &Hash) {
        self.buf.extend_from_slice(h);
    }

    /// Writes a `u32` length prefix followed by the bytes.
    pub fn put_len_prefixed(&mut self, bytes: &[u8]) {
        self.put_u32(bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Strict little-endian reader over a borrowed buffer.
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], TypesError> {
        if self.remaining() < n {
            return Err(TypesError::Truncated {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn get_u32(&mut self) -> Result<u32, TypesError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().expect("4-byte slice")))
    }

    pub fn get_u64(&mut self) -> Result<u64, TypesError> {
        let bytes = self.take(8)?;
        Ok(u64::from_le_bytes(bytes.try_into().expect("8-byte slice")))
    }

    pub fn get_hash(&mut self) -> Result<Hash, TypesError> {
        let bytes = self.take(HASH_LEN)?;
        Ok(bytes.try_into().expect("32-byte slice"))
    }

    /// Reads a `u32` length prefix followed by exactly that many bytes.
    pub fn get_len_prefixed(&mut self) -> Result<Vec<u8>, TypesError> {
        let len = self.get_u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    pub fn get_string(&mut self) -> Result<String, TypesError> {
        let bytes = self.get_len_prefixed()?;
        String::from_utf8(bytes).map_err(|_| TypesError::InvalidUtf8)
    }

    /// Asserts the record consumed its buffer exactly.
    pub fn finish(self) -> Result<(), TypesError> {
        if self.remaining() != 0 {
            return Err(TypesError::TrailingBytes {
                count: self.remaining(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_reader_round_trip() {
        let mut w = ByteWriter::default();
        w.put_u32(7);
        w.put_u64(u64::MAX);
        w.put_hash(&[0xAB; 32]);
        w.put_len_prefixed(b"chunk");
        let bytes = w.into_bytes();

        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.get_u32().unwrap(), 7);
        assert_eq!(r.get_u64().unwrap(), u64::MAX);
        assert_eq!(r.get_hash().unwrap(), [0xAB; 32]);
        assert_eq!(r.get_len_prefixed().unwrap(), b"chunk");
        r.finish().unwrap();
    }

    #[test]
    fn test_reader_rejects_truncated_length_prefix() {
        let mut w = ByteWriter::default();
        w.put_u32(100); // declares 100 bytes, provides none
        let bytes = w.into_bytes();

        let mut r = ByteReader::new(&bytes);
        let err = r.get_len_prefixed().unwrap_err();
        assert!(matches!(err, TypesError::Truncated { needed: 100, .. }));
    }

    #[test]
    fn test_reader_rejects_trailing_bytes() {
        let bytes = [0u8; 5];
        let mut r = ByteReader::new(&bytes);
        r.get_u32().unwrap();
        let err = r.finish().unwrap_err();
        assert_eq!(err, TypesError::TrailingBytes { count: 1 });
    }
}
