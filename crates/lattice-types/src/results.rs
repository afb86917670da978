//! Results-section records: header, bloom filter, receipts, state diffs and
//! the section proof.

use serde::{Deserialize, Serialize};

use crate::encoding::{ByteReader, ByteWriter, TypesError};
use crate::primitives::{BlockHeight, Hash, TimestampNano};

/// Header of the results section.
///
/// Carries the receipt and state-diff counts the storage codec trusts, and
/// the timestamp the block log indexes time-range queries by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsBlockHeader {
    pub protocol_version: u32,
    pub block_height: BlockHeight,
    pub prev_block_hash: Hash,
    pub timestamp: TimestampNano,
    pub num_transaction_receipts: u32,
    pub num_contract_state_diffs: u32,
}

impl ResultsBlockHeader {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(60);
        w.put_u32(self.protocol_version);
        w.put_u64(self.block_height);
        w.put_hash(&self.prev_block_hash);
        w.put_u64(self.timestamp);
        w.put_u32(self.num_transaction_receipts);
        w.put_u32(self.num_contract_state_diffs);
        w.into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypesError> {
        let mut r = ByteReader::new(bytes);
        let header = Self {
            protocol_version: r.get_u32()?,
            block_height: r.get_u64()?,
            prev_block_hash: r.get_hash()?,
            timestamp: r.get_u64()?,
            num_transaction_receipts: r.get_u32()?,
            num_contract_state_diffs: r.get_u32()?,
        };
        r.finish()?;
        Ok(header)
    }
}

/// Opaque bloom filter over the section's receipt events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsBloomFilter {
    bytes: Vec<u8>,
}

impl ResultsBloomFilter {
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

/// Opaque consensus proof over the results section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsBlockProof {
    bytes: Vec<u8>,
}

impl ResultsBlockProof {
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

/// Execution receipt for one transaction in the block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub tx_hash: Hash,
    pub execution_result: u32,
    pub output: Vec<u8>,
}

impl TransactionReceipt {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(40 + self.output.len());
        w.put_hash(&self.tx_hash);
        w.put_u32(self.execution_result);
        w.put_len_prefixed(&self.output);
        w.into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypesError> {
        let mut r = ByteReader::new(bytes);
        let receipt = Self {
            tx_hash: r.get_hash()?,
            execution_result: r.get_u32()?,
            output: r.get_len_prefixed()?,
        };
        r.finish()?;
        Ok(receipt)
    }
}

/// One contract state mutation recorded by the block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractStateDiff {
    pub contract_name: String,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl ContractStateDiff {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(
            12 + self.contract_name.len() + self.key.len() + self.value.len(),
        );
        w.put_len_prefixed(self.contract_name.as_bytes());
        w.put_len_prefixed(&self.key);
        w.put_len_prefixed(&self.value);
        w.into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypesError> {
        let mut r = ByteReader::new(bytes);
        let diff = Self {
            contract_name: r.get_string()?,
            key: r.get_len_prefixed()?,
            value: r.get_len_prefixed()?,
        };
        r.finish()?;
        Ok(diff)
    }
}
