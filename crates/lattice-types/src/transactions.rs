//! Transactions-section records: header, metadata, signed transactions and
//! the section proof.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::encoding::{ByteReader, ByteWriter, TypesError};
use crate::primitives::{BlockHeight, Hash, TimestampNano};

/// Header of the transactions section.
///
/// `num_signed_transactions` is the count the storage codec trusts when it
/// reads the transaction chunks of a record back from disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionsBlockHeader {
    pub protocol_version: u32,
    pub virtual_chain_id: u32,
    pub block_height: BlockHeight,
    pub prev_block_hash: Hash,
    pub timestamp: TimestampNano,
    pub num_signed_transactions: u32,
}

impl TransactionsBlockHeader {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(60);
        w.put_u32(self.protocol_version);
        w.put_u32(self.virtual_chain_id);
        w.put_u64(self.block_height);
        w.put_hash(&self.prev_block_hash);
        w.put_u64(self.timestamp);
        w.put_u32(self.num_signed_transactions);
        w.into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypesError> {
        let mut r = ByteReader::new(bytes);
        let header = Self {
            protocol_version: r.get_u32()?,
            virtual_chain_id: r.get_u32()?,
            block_height: r.get_u64()?,
            prev_block_hash: r.get_hash()?,
            timestamp: r.get_u64()?,
            num_signed_transactions: r.get_u32()?,
        };
        r.finish()?;
        Ok(header)
    }

    /// SHA-256 over the serialized header. Used as the `prev_block_hash`
    /// linkage of the following block.
    pub fn hash(&self) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.to_bytes());
        hasher.finalize().into()
    }
}

/// Opaque metadata attached to the transactions section.
///
/// The block log never interprets the payload; it only needs the exact
/// bytes back on read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionsBlockMetadata {
    bytes: Vec<u8>,
}

impl TransactionsBlockMetadata {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypesError> {
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }
}

/// Opaque consensus proof over the transactions section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionsBlockProof {
    bytes: Vec<u8>,
}

impl TransactionsBlockProof {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypesError> {
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }
}

/// A signed transaction. The body is opaque to storage; the hash identifies
/// the transaction in receipts and lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub body: Vec<u8>,
    pub signature: Vec<u8>,
}

impl SignedTransaction {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(8 + self.body.len() + self.signature.len());
        w.put_len_prefixed(&self.body);
        w.put_len_prefixed(&self.signature);
        w.into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypesError> {
        let mut r = ByteReader::new(bytes);
        let tx = Self {
            body: r.get_len_prefixed()?,
            signature: r.get_len_prefixed()?,
        };
        r.finish()?;
        Ok(tx)
    }

    /// SHA-256 over the transaction body.
    pub fn hash(&self) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(&self.body);
        hasher.finalize().into()
    }
}
