// Ledger engine
//
// This module contains the core ledger implementation including:
// - Block structure and proof of work
// - Blockchain state machine (mempool admission, mining, balances, validation)
// - Transaction structure
// - Cryptography utilities
// - Storage collaborator

pub mod block;
pub mod chain;
pub mod crypto;
pub mod storage;
pub mod transaction;

// Re-export main components for easier access
pub use block::{Block, BlockView};
pub use chain::{
    validate_blocks, Blockchain, BlockchainError, ChainIntegrityError, IntegrityFailure,
    ValidationError,
};
pub use crypto::{Address, DigitalSignature, Wallet};
pub use storage::{MemoryStorage, SledStorage, Storage, StorageError};
pub use transaction::{Transaction, TransactionError};
