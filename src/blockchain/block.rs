use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use super::transaction::Transaction;

/// Previous-hash sentinel carried by the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0000000000000000";

/// Represents a block in the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Block {
    /// Index of the block in the chain
    pub index: u64,

    /// Creation time in Unix milliseconds
    pub timestamp: i64,

    /// Transactions included in this block, reward last
    pub transactions: Vec<Transaction>,

    /// Hash of the previous block
    pub previous_hash: String,

    /// Proof-of-work counter
    pub nonce: u64,

    /// Hash of the current block
    pub hash: String,
}

impl Block {
    /// Creates a new unsealed block stamped with the current time
    ///
    /// # Arguments
    ///
    /// * `index` - The index of the block in the chain
    /// * `transactions` - The list of transactions to include in the block
    /// * `previous_hash` - The hash of the previous block
    pub fn new(index: u64, transactions: Vec<Transaction>, previous_hash: String) -> Self {
        Self::with_timestamp(index, Utc::now().timestamp_millis(), transactions, previous_hash)
    }

    pub fn with_timestamp(
        index: u64,
        timestamp: i64,
        transactions: Vec<Transaction>,
        previous_hash: String,
    ) -> Self {
        let block = Block {
            index,
            timestamp,
            transactions,
            previous_hash,
            nonce: 0,
            hash: String::new(),
        };

        let hash = block.calculate_hash();

        Block { hash, ..block }
    }

    /// The canonical first block. It does not depend on the clock, so a
    /// freshly built genesis can be compared with a persisted one.
    pub fn genesis() -> Self {
        Self::with_timestamp(0, 0, Vec::new(), GENESIS_PREVIOUS_HASH.to_string())
    }

    /// Calculates the SHA-256 hash of the block as a hexadecimal string
    pub fn calculate_hash(&self) -> String {
        let block_data = serde_json::json!({
            "index": self.index,
            "timestamp": self.timestamp,
            "transactions": self.transactions,
            "previous_hash": self.previous_hash,
            "nonce": self.nonce,
        });

        format!("{:x}", Sha256::digest(block_data.to_string().as_bytes()))
    }

    /// Searches nonces from zero until the hash has `difficulty` leading
    /// zero hex digits. Unbounded; run it off the async executor.
    pub fn mine_block(&mut self, difficulty: usize) {
        let target = "0".repeat(difficulty);
        self.nonce = 0;

        loop {
            self.hash = self.calculate_hash();
            if self.hash.starts_with(&target) {
                break;
            }
            self.nonce += 1;
        }
    }

    /// Whether the stored hash satisfies the proof-of-work target
    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        self.hash.len() >= difficulty && self.hash.bytes().take(difficulty).all(|b| b == b'0')
    }

    /// A single invalid transaction invalidates the block
    pub fn has_valid_transactions(&self) -> bool {
        self.transactions.iter().all(Transaction::is_valid)
    }

    /// The last transaction, which for mined blocks is the miner's reward
    pub fn mining_data(&self) -> Option<&Transaction> {
        self.transactions.last()
    }
}

/// A block as presented to readers, annotated with its mining reward
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BlockView {
    #[serde(flatten)]
    pub block: Block,

    /// Last transaction of the block, if any
    pub mining_data: Option<Transaction>,
}

impl From<Block> for BlockView {
    fn from(block: Block) -> Self {
        let mining_data = block.mining_data().cloned();
        BlockView { block, mining_data }
    }
}
