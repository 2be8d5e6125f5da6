use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use utoipa::ToSchema;

use super::crypto::{verify_signature, Address, CryptoError, DigitalSignature, Wallet};

/// Errors that can occur during transaction operations
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Reward transactions have no sender and cannot be signed")]
    MissingSender,

    #[error("Wallet address does not match sender address {0}")]
    WalletMismatch(Address),

    #[error("Crypto error: {0}")]
    CryptoError(#[from] CryptoError),
}

/// Represents a balance transfer in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    /// Sender's address, absent for a mining reward
    pub from_address: Option<Address>,

    /// Recipient's address
    pub to_address: Address,

    /// Amount being transferred
    pub amount: u64,

    /// Content hash over sender, recipient and amount
    pub hash: String,

    /// DER signature of `hash` by the sender
    pub signature: Option<DigitalSignature>,
}

impl Transaction {
    /// Creates a new unsigned transfer
    pub fn new(from_address: Address, to_address: Address, amount: u64) -> Self {
        Self::build(Some(from_address), to_address, amount)
    }

    /// Creates a mining reward transaction
    pub fn new_reward(to_address: Address, amount: u64) -> Self {
        Self::build(None, to_address, amount)
    }

    fn build(from_address: Option<Address>, to_address: Address, amount: u64) -> Self {
        let hash = content_hash(from_address.as_ref(), &to_address, amount);

        Transaction {
            from_address,
            to_address,
            amount,
            hash,
            signature: None,
        }
    }

    /// Recomputes the content hash. The signature is not part of it.
    pub fn calculate_hash(&self) -> String {
        content_hash(self.from_address.as_ref(), &self.to_address, self.amount)
    }

    /// Attaches a signature computed elsewhere over `hash`
    pub fn sign(&mut self, signature: DigitalSignature) -> Result<(), TransactionError> {
        if self.from_address.is_none() {
            return Err(TransactionError::MissingSender);
        }

        self.signature = Some(signature);
        Ok(())
    }

    /// Signs the transaction with a local wallet
    pub fn sign_with(&mut self, wallet: &Wallet) -> Result<(), TransactionError> {
        let sender = self.from_address.as_ref().ok_or(TransactionError::MissingSender)?;

        if wallet.address() != sender {
            return Err(TransactionError::WalletMismatch(sender.clone()));
        }

        let signature = wallet.sign(&self.hash)?;
        self.sign(signature)
    }

    /// Checks if the transaction is a mining reward
    pub fn is_reward(&self) -> bool {
        self.from_address.is_none()
    }

    /// Reward transactions are trusted. Anything else needs a signature by
    /// `from_address` over an untampered hash.
    pub fn is_valid(&self) -> bool {
        let sender = match &self.from_address {
            Some(sender) => sender,
            None => return true,
        };

        let signature = match &self.signature {
            Some(signature) => signature,
            None => return false,
        };

        if self.hash != self.calculate_hash() {
            return false;
        }

        verify_signature(&self.hash, signature, sender).unwrap_or(false)
    }

    /// True when either side of the transfer is `address`
    pub fn involves(&self, address: &Address) -> bool {
        self.from_address.as_ref() == Some(address) || &self.to_address == address
    }
}

fn content_hash(from_address: Option<&Address>, to_address: &Address, amount: u64) -> String {
    let data = serde_json::json!({
        "from_address": from_address.map(|a| a.0.as_str()),
        "to_address": to_address.0,
        "amount": amount,
    });

    format!("{:x}", Sha256::digest(data.to_string().as_bytes()))
}
