//! Chain builders for tests and tooling.
//!
//! Deterministic by default so fixtures are reproducible across runs; the
//! random variants drive soak-style tests and the CLI chain generator.

use rand::Rng;

use crate::block::{BlockPair, ResultsBlockContainer, TransactionsBlockContainer};
use crate::primitives::{BlockHeight, Hash, TimestampNano};
use crate::results::{
    ContractStateDiff, ResultsBlockHeader, ResultsBlockProof, ResultsBloomFilter,
    TransactionReceipt,
};
use crate::transactions::{
    SignedTransaction, TransactionsBlockHeader, TransactionsBlockMetadata, TransactionsBlockProof,
};

/// Timestamp assigned to block 1 when none is given.
pub const GENESIS_TIMESTAMP_NANO: TimestampNano = 1_700_000_000_000_000_000;

/// Default spacing between consecutive generated blocks.
pub const BLOCK_INTERVAL_NANO: TimestampNano = 1_000_000_000;

/// Builder for a single [`BlockPair`].
pub struct BlockPairBuilder {
    height: BlockHeight,
    timestamp: TimestampNano,
    prev_block_hash: Hash,
    protocol_version: u32,
    virtual_chain_id: u32,
    transactions: Vec<SignedTransaction>,
    receipts: Option<Vec<TransactionReceipt>>,
    state_diffs: Vec<ContractStateDiff>,
}

impl BlockPairBuilder {
    pub fn new(height: BlockHeight) -> Self {
        Self {
            height,
            timestamp: GENESIS_TIMESTAMP_NANO + height.saturating_sub(1) * BLOCK_INTERVAL_NANO,
            prev_block_hash: [0; 32],
            protocol_version: 1,
            virtual_chain_id: 42,
            transactions: Vec::new(),
            receipts: None,
            state_diffs: Vec::new(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: TimestampNano) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_prev_block_hash(mut self, hash: Hash) -> Self {
        self.prev_block_hash = hash;
        self
    }

    pub fn with_virtual_chain_id(mut self, id: u32) -> Self {
        self.virtual_chain_id = id;
        self
    }

    /// Adds `count` deterministic transactions. Unless overridden, `build`
    /// emits one matching receipt per transaction.
    pub fn with_transactions(mut self, count: u32) -> Self {
        self.transactions = (0..count)
            .map(|i| SignedTransaction {
                body: format!("tx-{}-{}", self.height, i).into_bytes(),
                signature: vec![0x5A; 64],
            })
            .collect();
        self
    }

    pub fn with_transaction(mut self, tx: SignedTransaction) -> Self {
        self.transactions.push(tx);
        self
    }

    /// Overrides the auto-generated receipts.
    pub fn with_receipts(mut self, receipts: Vec<TransactionReceipt>) -> Self {
        self.receipts = Some(receipts);
        self
    }

    /// Forces a block with no receipts (such blocks never enter the
    /// timestamp bucket index).
    pub fn without_receipts(self) -> Self {
        self.with_receipts(Vec::new())
    }

    pub fn with_state_diffs(mut self, count: u32) -> Self {
        self.state_diffs = (0..count)
            .map(|i| ContractStateDiff {
                contract_name: format!("contract-{i}"),
                key: format!("key-{}-{}", self.height, i).into_bytes(),
                value: vec![i as u8; 8],
            })
            .collect();
        self
    }

    pub fn build(self) -> BlockPair {
        let receipts = self.receipts.unwrap_or_else(|| {
            self.transactions
                .iter()
                .map(|tx| TransactionReceipt {
                    tx_hash: tx.hash(),
                    execution_result: 0,
                    output: Vec::new(),
                })
                .collect()
        });

        let tx_header = TransactionsBlockHeader {
            protocol_version: self.protocol_version,
            virtual_chain_id: self.virtual_chain_id,
            block_height: self.height,
            prev_block_hash: self.prev_block_hash,
            timestamp: self.timestamp,
            num_signed_transactions: self.transactions.len() as u32,
        };
        let rs_header = ResultsBlockHeader {
            protocol_version: self.protocol_version,
            block_height: self.height,
            prev_block_hash: self.prev_block_hash,
            timestamp: self.timestamp,
            num_transaction_receipts: receipts.len() as u32,
            num_contract_state_diffs: self.state_diffs.len() as u32,
        };

        BlockPair {
            transactions_block: TransactionsBlockContainer {
                header: tx_header,
                metadata: TransactionsBlockMetadata::new(
                    format!("meta-{}", self.height).into_bytes(),
                ),
                signed_transactions: self.transactions,
                block_proof: TransactionsBlockProof::new(self.height.to_le_bytes().to_vec()),
            },
            results_block: ResultsBlockContainer {
                header: rs_header,
                bloom_filter: ResultsBloomFilter::new(vec![0; 16]),
                transaction_receipts: receipts,
                contract_state_diffs: self.state_diffs,
                block_proof: ResultsBlockProof::new(self.height.to_le_bytes().to_vec()),
            },
        }
    }
}

/// Builds heights `1..=count`, hash-linked, two transactions and one state
/// diff per block.
pub fn build_deterministic_chain(count: u64) -> Vec<BlockPair> {
    let mut chain = Vec::with_capacity(count as usize);
    let mut prev_hash: Hash = [0; 32];
    for height in 1..=count {
        let block = BlockPairBuilder::new(height)
            .with_prev_block_hash(prev_hash)
            .with_transactions(2)
            .with_state_diffs(1)
            .build();
        prev_hash = block.block_hash();
        chain.push(block);
    }
    chain
}

/// Builds heights `1..=count` with randomized payload sizes and counts.
pub fn build_random_chain<R: Rng>(rng: &mut R, count: u64) -> Vec<BlockPair> {
    let mut chain = Vec::with_capacity(count as usize);
    let mut prev_hash: Hash = [0; 32];
    for height in 1..=count {
        let mut builder = BlockPairBuilder::new(height)
            .with_prev_block_hash(prev_hash)
            .with_state_diffs(rng.gen_range(0..4));
        for _ in 0..rng.gen_range(0..6u32) {
            let body_len = rng.gen_range(16..256);
            let mut body = vec![0u8; body_len];
            rng.fill(body.as_mut_slice());
            builder = builder.with_transaction(SignedTransaction {
                body,
                signature: vec![0x5A; 64],
            });
        }
        let block = builder.build();
        prev_hash = block.block_hash();
        chain.push(block);
    }
    chain
}
