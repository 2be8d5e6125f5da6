use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::blockchain::Block;

/// Request for the transaction endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransactionRequest {
    /// The sender's address (hex public key)
    pub from: String,

    /// The recipient's address (hex public key)
    pub to: String,

    /// The amount to transfer
    pub amount: u64,

    /// Hex DER signature of the transaction hash by the sender
    pub signature: String,
}

/// Request for the sign helper endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SignRequest {
    pub from: String,
    pub to: String,
    pub amount: u64,

    /// The sender's private key (hex encoded)
    pub private_key: String,
}

/// Response for the sign helper endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SignResponse {
    /// Hash of the transfer that was signed
    pub hash: String,

    /// Hex DER signature to submit with the transfer
    pub signature: String,
}

/// Request for the mine endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MineRequest {
    /// Address credited with the mining reward
    pub address: String,
}

/// Request for the chain replacement endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReplaceChainRequest {
    pub blocks: Vec<Block>,
}

/// Response for the create wallet endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WalletResponse {
    /// The wallet's address
    pub address: String,

    /// The wallet's private key (hex encoded)
    pub private_key: String,
}

/// Response for the validate endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ValidationResponse {
    pub valid: bool,

    /// Why the chain is invalid, when it is
    pub error: Option<String>,
}
