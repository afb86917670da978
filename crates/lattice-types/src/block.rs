//! Block containers: the [`BlockPair`] the rest of the node commits and
//! retrieves as one unit.

use serde::{Deserialize, Serialize};

use crate::encoding::TypesError;
use crate::primitives::{BlockHeight, Hash, TimestampNano};
use crate::results::{
    ContractStateDiff, ResultsBlockHeader, ResultsBlockProof, ResultsBloomFilter,
    TransactionReceipt,
};
use crate::transactions::{
    SignedTransaction, TransactionsBlockHeader, TransactionsBlockMetadata, TransactionsBlockProof,
};

/// The transactions section of a committed block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionsBlockContainer {
    pub header: TransactionsBlockHeader,
    pub metadata: TransactionsBlockMetadata,
    pub signed_transactions: Vec<SignedTransaction>,
    pub block_proof: TransactionsBlockProof,
}

/// The results section of a committed block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsBlockContainer {
    pub header: ResultsBlockHeader,
    pub bloom_filter: ResultsBloomFilter,
    pub transaction_receipts: Vec<TransactionReceipt>,
    pub contract_state_diffs: Vec<ContractStateDiff>,
    pub block_proof: ResultsBlockProof,
}

/// A committed block: transactions section + results section.
///
/// Both sections carry the same height; the results header is the
/// authoritative source for height and timestamp in storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPair {
    pub transactions_block: TransactionsBlockContainer,
    pub results_block: ResultsBlockContainer,
}

impl BlockPair {
    pub fn height(&self) -> BlockHeight {
        self.results_block.header.block_height
    }

    pub fn timestamp(&self) -> TimestampNano {
        self.results_block.header.timestamp
    }

    pub fn num_transaction_receipts(&self) -> u32 {
        self.results_block.header.num_transaction_receipts
    }

    /// Hash identifying this block, used as the next block's
    /// `prev_block_hash`.
    pub fn block_hash(&self) -> Hash {
        self.transactions_block.header.hash()
    }

    /// Verifies the declared header counts match the container contents and
    /// both sections agree on the height.
    pub fn check_consistency(&self) -> Result<(), TypesError> {
        let tb = &self.transactions_block;
        let rb = &self.results_block;

        if tb.header.block_height != rb.header.block_height {
            return Err(TypesError::HeightMismatch {
                transactions: tb.header.block_height,
                results: rb.header.block_height,
            });
        }
        if tb.header.num_signed_transactions as usize != tb.signed_transactions.len() {
            return Err(TypesError::CountMismatch {
                section: "transactions",
                declared: tb.header.num_signed_transactions,
                actual: tb.signed_transactions.len(),
            });
        }
        if rb.header.num_transaction_receipts as usize != rb.transaction_receipts.len() {
            return Err(TypesError::CountMismatch {
                section: "receipts",
                declared: rb.header.num_transaction_receipts,
                actual: rb.transaction_receipts.len(),
            });
        }
        if rb.header.num_contract_state_diffs as usize != rb.contract_state_diffs.len() {
            return Err(TypesError::CountMismatch {
                section: "state-diffs",
                declared: rb.header.num_contract_state_diffs,
                actual: rb.contract_state_diffs.len(),
            });
        }
        Ok(())
    }
}
