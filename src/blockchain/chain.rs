use std::fmt;
use std::sync::Arc;

use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use super::block::{Block, BlockView};
use super::crypto::Address;
use super::storage::{Storage, StorageError, BLOCKS_KEY};
use super::transaction::Transaction;
use crate::config::LedgerConfig;

/// Reasons a transaction is refused admission to the mempool
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Transaction must include from and to address (missing address)")]
    MissingAddress,

    #[error("Cannot add transaction {hash} with an invalid signature")]
    InvalidSignature { hash: String },

    #[error("Transaction amount should be higher than 0 (non-positive amount: {amount})")]
    NonPositiveAmount { amount: u64 },

    #[error("Insufficient balance for {address}: balance {balance}, amount {amount}")]
    InsufficientBalance {
        address: Address,
        balance: i128,
        amount: u64,
    },

    #[error("Pending transactions for {address} exceed its balance: pending {pending} + amount {amount} > balance {balance}")]
    PendingExceedsBalance {
        address: Address,
        pending: i128,
        amount: u64,
        balance: i128,
    },
}

/// What went wrong with the block at a given position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityFailure {
    EmptyChain,
    GenesisMismatch,
    IndexMismatch,
    BrokenLink,
    InvalidTransactions,
    HashMismatch,
}

impl fmt::Display for IntegrityFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            IntegrityFailure::EmptyChain => "chain has no blocks",
            IntegrityFailure::GenesisMismatch => "genesis block differs from the canonical genesis",
            IntegrityFailure::IndexMismatch => "block index does not match its position",
            IntegrityFailure::BrokenLink => "previous hash does not match the preceding block",
            IntegrityFailure::InvalidTransactions => "block contains an invalid transaction",
            IntegrityFailure::HashMismatch => "stored hash does not match its recomputation",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Chain integrity violated at block {index}: {reason}")]
pub struct ChainIntegrityError {
    pub index: usize,
    pub reason: IntegrityFailure,
}

/// Errors that can occur during blockchain operations
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid chain: {0}")]
    InvalidChain(#[from] ChainIntegrityError),

    #[error("Chain rejected: {0}")]
    ChainRejected(String),

    #[error("Block {0} not found")]
    BlockNotFound(u64),

    #[error("Ledger is not open yet")]
    NotReady,

    #[error("Mining failed: {0}")]
    Mining(String),
}

#[derive(Debug, Default)]
struct ChainState {
    ready: bool,
    blocks: Vec<Block>,
    pending_transactions: Vec<Transaction>,
}

impl ChainState {
    fn ensure_ready(&self) -> Result<(), BlockchainError> {
        if self.ready {
            Ok(())
        } else {
            Err(BlockchainError::NotReady)
        }
    }

    fn latest_block(&self) -> Result<&Block, BlockchainError> {
        self.ensure_ready()?;
        self.blocks.last().ok_or(BlockchainError::NotReady)
    }
}

/// The ledger: confirmed blocks plus the mempool.
///
/// Construction is two-phase. [`Blockchain::new`] returns an unready handle
/// and [`Blockchain::open`] loads the persisted chain; every other operation
/// fails with [`BlockchainError::NotReady`] until that has completed.
pub struct Blockchain {
    state: RwLock<ChainState>,

    /// Held for a whole mining cycle or chain replacement
    mining: Mutex<()>,

    storage: Arc<dyn Storage>,

    /// Mining difficulty (number of leading zeros required in hash)
    difficulty: usize,

    mining_reward: u64,
}

impl fmt::Debug for Blockchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blockchain")
            .field("difficulty", &self.difficulty)
            .field("mining_reward", &self.mining_reward)
            .finish()
    }
}

impl Blockchain {
    pub fn new(storage: Arc<dyn Storage>, config: &LedgerConfig) -> Self {
        Blockchain {
            state: RwLock::new(ChainState::default()),
            mining: Mutex::new(()),
            storage,
            difficulty: config.difficulty,
            mining_reward: config.mining_reward,
        }
    }

    /// Loads the persisted chain, or creates and persists the genesis block
    /// when storage is empty. Calling it again on an open ledger is a no-op.
    pub async fn open(&self) -> Result<(), BlockchainError> {
        let mut state = self.state.write().await;
        if state.ready {
            return Ok(());
        }

        let stored = match self.storage.get(BLOCKS_KEY).await? {
            Some(bytes) => bincode::deserialize::<Vec<Block>>(&bytes)
                .map_err(|e| StorageError::DeserializationError(e.to_string()))?,
            None => Vec::new(),
        };

        let blocks = if stored.is_empty() {
            info!("No existing chain found in storage, creating genesis block");
            let blocks = vec![Block::genesis()];
            self.persist(&blocks).await?;
            blocks
        } else {
            info!("Loaded {} blocks from storage", stored.len());
            if let Err(err) = validate_blocks(&stored) {
                warn!("Stored chain fails its integrity check: {}", err);
            }
            stored
        };

        state.blocks = blocks;
        state.ready = true;
        Ok(())
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn mining_reward(&self) -> u64 {
        self.mining_reward
    }

    async fn persist(&self, blocks: &[Block]) -> Result<(), StorageError> {
        let bytes =
            bincode::serialize(blocks).map_err(|e| StorageError::SerializationError(e.to_string()))?;
        self.storage.set(BLOCKS_KEY, bytes).await
    }

    /// Validates and queues a transaction for the next block.
    ///
    /// The checks and the append happen under one write lock, so two
    /// submissions from the same wallet cannot both spend the same balance.
    pub async fn add_transaction(&self, transaction: Transaction) -> Result<(), BlockchainError> {
        let mut state = self.state.write().await;
        state.ensure_ready()?;

        admit(&state.blocks, &state.pending_transactions, &transaction)?;

        debug!("Admitted transaction {} to the mempool", transaction.hash);
        state.pending_transactions.push(transaction);
        Ok(())
    }

    /// Mines every transaction pending right now, plus a reward for
    /// `reward_address`, into a new block.
    ///
    /// The nonce search runs on a blocking worker without holding the state
    /// lock. Transactions admitted meanwhile stay pending for the next block.
    /// The block is persisted before it becomes visible.
    pub async fn mine_pending_transactions(
        &self,
        reward_address: Address,
    ) -> Result<Block, BlockchainError> {
        if reward_address.is_empty() {
            return Err(ValidationError::MissingAddress.into());
        }

        let _mining = self.mining.lock().await;

        let (mut block, taken) = {
            let state = self.state.read().await;
            let latest = state.latest_block()?;

            let mut transactions = state.pending_transactions.clone();
            let taken = transactions.len();
            transactions.push(Transaction::new_reward(reward_address, self.mining_reward));

            (Block::new(latest.index + 1, transactions, latest.hash.clone()), taken)
        };

        info!(
            "Mining block {} with {} pending transactions at difficulty {}",
            block.index, taken, self.difficulty
        );

        let difficulty = self.difficulty;
        block = tokio::task::spawn_blocking(move || {
            block.mine_block(difficulty);
            block
        })
        .await
        .map_err(|e| BlockchainError::Mining(e.to_string()))?;

        let mut state = self.state.write().await;
        let mut blocks = state.blocks.clone();
        blocks.push(block.clone());
        if let Err(err) = self.persist(&blocks).await {
            warn!("Failed to persist block {}: {}", block.index, err);
            return Err(err.into());
        }

        // No await from here on: the chain and the mempool change together
        // or, if this future is dropped above, not at all.
        state.blocks = blocks;

        // Only mining and chain replacement remove from the mempool, and
        // both hold the mining lock, so the snapshot is still its prefix.
        let taken = taken.min(state.pending_transactions.len());
        state.pending_transactions.drain(..taken);

        info!("Mined block {} with hash {} (nonce {})", block.index, block.hash, block.nonce);
        Ok(block)
    }

    /// Alias matching the HTTP surface
    pub async fn mine(&self, reward_address: Address) -> Result<Block, BlockchainError> {
        self.mine_pending_transactions(reward_address).await
    }

    /// Replaces the whole chain with a longer, valid one.
    ///
    /// Pending transactions are re-admitted against the new chain; those
    /// that no longer fit the sender's balance are dropped.
    pub async fn replace_chain(&self, blocks: Vec<Block>) -> Result<(), BlockchainError> {
        let _mining = self.mining.lock().await;
        let mut state = self.state.write().await;
        state.ensure_ready()?;

        if blocks.len() <= state.blocks.len() {
            return Err(BlockchainError::ChainRejected(format!(
                "incoming chain of {} blocks is not longer than the current {}",
                blocks.len(),
                state.blocks.len()
            )));
        }

        validate_blocks(&blocks)?;

        if let Some(block) = blocks.iter().skip(1).find(|b| !b.meets_difficulty(self.difficulty)) {
            return Err(BlockchainError::ChainRejected(format!(
                "block {} does not meet difficulty {}",
                block.index, self.difficulty
            )));
        }

        self.persist(&blocks).await?;

        let pending = std::mem::take(&mut state.pending_transactions);
        state.blocks = blocks;

        let mut kept: Vec<Transaction> = Vec::with_capacity(pending.len());
        for transaction in pending {
            match admit(&state.blocks, &kept, &transaction) {
                Ok(()) => kept.push(transaction),
                Err(err) => warn!("Dropping pending transaction {}: {}", transaction.hash, err),
            }
        }
        state.pending_transactions = kept;

        info!("Replaced chain, new height {}", state.blocks.len() - 1);
        Ok(())
    }

    /// All blocks, each annotated with its last transaction
    pub async fn get_blocks(&self) -> Result<Vec<BlockView>, BlockchainError> {
        let state = self.state.read().await;
        state.ensure_ready()?;
        Ok(state.blocks.iter().cloned().map(BlockView::from).collect())
    }

    /// All blocks, unannotated
    pub async fn get_chain(&self) -> Result<Vec<Block>, BlockchainError> {
        let state = self.state.read().await;
        state.ensure_ready()?;
        Ok(state.blocks.clone())
    }

    pub async fn get_block_by_index(&self, index: u64) -> Result<BlockView, BlockchainError> {
        let state = self.state.read().await;
        state.ensure_ready()?;

        usize::try_from(index)
            .ok()
            .and_then(|i| state.blocks.get(i))
            .cloned()
            .map(BlockView::from)
            .ok_or(BlockchainError::BlockNotFound(index))
    }

    pub async fn get_latest_block(&self) -> Result<Block, BlockchainError> {
        let state = self.state.read().await;
        state.latest_block().cloned()
    }

    /// Confirmed balance, computed by scanning every block
    pub async fn get_balance_of_address(&self, address: &Address) -> Result<i128, BlockchainError> {
        let state = self.state.read().await;
        state.ensure_ready()?;
        Ok(balance_of(&state.blocks, address))
    }

    /// Confirmed transactions to or from `address`, in chain order
    pub async fn get_all_transactions_for_wallet(
        &self,
        address: &Address,
    ) -> Result<Vec<Transaction>, BlockchainError> {
        let state = self.state.read().await;
        state.ensure_ready()?;

        Ok(confirmed(&state.blocks)
            .filter(|tx| tx.involves(address))
            .cloned()
            .collect())
    }

    /// Confirmed transactions followed by pending ones
    pub async fn get_all_transactions(&self) -> Result<Vec<Transaction>, BlockchainError> {
        let state = self.state.read().await;
        state.ensure_ready()?;

        Ok(confirmed(&state.blocks)
            .chain(state.pending_transactions.iter())
            .cloned()
            .collect())
    }

    pub async fn get_pending_transactions(&self) -> Result<Vec<Transaction>, BlockchainError> {
        let state = self.state.read().await;
        state.ensure_ready()?;
        Ok(state.pending_transactions.clone())
    }

    /// First confirmed or pending transaction with the given hash
    pub async fn get_transaction_by_hash(
        &self,
        hash: &str,
    ) -> Result<Option<Transaction>, BlockchainError> {
        let state = self.state.read().await;
        state.ensure_ready()?;

        let found = confirmed(&state.blocks)
            .chain(state.pending_transactions.iter())
            .find(|tx| tx.hash == hash)
            .cloned();
        Ok(found)
    }

    /// Checks genesis, linkage, signatures and stored hashes, reporting the
    /// first failing block
    pub async fn validate_chain(&self) -> Result<(), BlockchainError> {
        let state = self.state.read().await;
        state.ensure_ready()?;
        validate_blocks(&state.blocks)?;
        Ok(())
    }

    /// Boolean form of [`Blockchain::validate_chain`]
    pub async fn is_chain_valid(&self) -> bool {
        self.validate_chain().await.is_ok()
    }
}

fn confirmed(blocks: &[Block]) -> impl Iterator<Item = &Transaction> {
    blocks.iter().flat_map(|block| block.transactions.iter())
}

fn balance_of(blocks: &[Block], address: &Address) -> i128 {
    let mut balance: i128 = 0;

    for transaction in confirmed(blocks) {
        if transaction.from_address.as_ref() == Some(address) {
            balance -= i128::from(transaction.amount);
        }

        if &transaction.to_address == address {
            balance += i128::from(transaction.amount);
        }
    }

    balance
}

/// Admission rules, in order, against a chain and a mempool
fn admit(
    blocks: &[Block],
    pending: &[Transaction],
    transaction: &Transaction,
) -> Result<(), ValidationError> {
    let sender = match &transaction.from_address {
        Some(sender) if !sender.is_empty() => sender,
        _ => return Err(ValidationError::MissingAddress),
    };
    if transaction.to_address.is_empty() {
        return Err(ValidationError::MissingAddress);
    }

    if !transaction.is_valid() {
        return Err(ValidationError::InvalidSignature {
            hash: transaction.hash.clone(),
        });
    }

    if transaction.amount == 0 {
        return Err(ValidationError::NonPositiveAmount {
            amount: transaction.amount,
        });
    }

    let amount = i128::from(transaction.amount);
    let balance = balance_of(blocks, sender);
    if balance < amount {
        return Err(ValidationError::InsufficientBalance {
            address: sender.clone(),
            balance,
            amount: transaction.amount,
        });
    }

    let pending_total: i128 = pending
        .iter()
        .filter(|tx| tx.from_address.as_ref() == Some(sender))
        .map(|tx| i128::from(tx.amount))
        .sum();

    if pending_total + amount > balance {
        return Err(ValidationError::PendingExceedsBalance {
            address: sender.clone(),
            pending: pending_total,
            amount: transaction.amount,
            balance,
        });
    }

    Ok(())
}

/// Structural and cryptographic integrity of a block list
pub fn validate_blocks(blocks: &[Block]) -> Result<(), ChainIntegrityError> {
    let genesis = blocks.first().ok_or(ChainIntegrityError {
        index: 0,
        reason: IntegrityFailure::EmptyChain,
    })?;

    if *genesis != Block::genesis() {
        return Err(ChainIntegrityError {
            index: 0,
            reason: IntegrityFailure::GenesisMismatch,
        });
    }

    for (i, pair) in blocks.windows(2).enumerate() {
        let (previous_block, current_block) = (&pair[0], &pair[1]);
        let index = i + 1;

        let failure = if current_block.index != index as u64 {
            Some(IntegrityFailure::IndexMismatch)
        } else if previous_block.hash != current_block.previous_hash {
            Some(IntegrityFailure::BrokenLink)
        } else if !current_block.has_valid_transactions() {
            Some(IntegrityFailure::InvalidTransactions)
        } else if current_block.hash != current_block.calculate_hash() {
            Some(IntegrityFailure::HashMismatch)
        } else {
            None
        };

        if let Some(reason) = failure {
            return Err(ChainIntegrityError { index, reason });
        }
    }

    Ok(())
}
