use actix_web::{web, HttpResponse, Responder};
use log::{error, warn};

use super::schema::{
    MineRequest, ReplaceChainRequest, SignRequest, SignResponse, TransactionRequest,
    ValidationResponse, WalletResponse,
};
use crate::blockchain::{
    Address, Block, Blockchain, BlockchainError, DigitalSignature, Transaction, Wallet,
};

/// Data structure for the ledger state
pub type BlockchainData = web::Data<Blockchain>;

/// Maps ledger errors onto HTTP statuses
fn error_response(err: BlockchainError) -> HttpResponse {
    let body = serde_json::json!({ "error": err.to_string() });

    match err {
        BlockchainError::Validation(_) => HttpResponse::NotAcceptable().json(body),
        BlockchainError::BlockNotFound(_) => HttpResponse::NotFound().json(body),
        BlockchainError::InvalidChain(_) | BlockchainError::ChainRejected(_) => {
            HttpResponse::Conflict().json(body)
        }
        BlockchainError::NotReady => HttpResponse::ServiceUnavailable().json(body),
        BlockchainError::Storage(_) | BlockchainError::Mining(_) => {
            error!("Ledger failure: {}", body["error"]);
            HttpResponse::InternalServerError().json(body)
        }
    }
}

/// Submit a signed transaction
///
/// Adds a transaction to the mempool after admission checks
#[utoipa::path(
    post,
    path = "/api/v1/transaction",
    request_body = TransactionRequest,
    responses(
        (status = 200, description = "Transaction added to the mempool"),
        (status = 406, description = "Transaction rejected")
    )
)]
pub async fn post_transaction(
    blockchain: BlockchainData,
    request: web::Json<TransactionRequest>,
) -> impl Responder {
    let request = request.into_inner();
    let mut transaction = Transaction::new(Address(request.from), Address(request.to), request.amount);

    if let Err(err) = transaction.sign(DigitalSignature(request.signature)) {
        return HttpResponse::NotAcceptable().json(serde_json::json!({ "error": err.to_string() }));
    }

    let hash = transaction.hash.clone();
    match blockchain.add_transaction(transaction).await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "message": "Add transaction success",
            "hash": hash
        })),
        Err(err) => {
            warn!("Rejected transaction {}: {}", hash, err);
            error_response(err)
        }
    }
}

/// List all transactions
///
/// Returns confirmed transactions followed by pending ones
#[utoipa::path(
    get,
    path = "/api/v1/transactions",
    responses(
        (status = 200, description = "Transactions retrieved successfully", body = Vec<Transaction>)
    )
)]
pub async fn get_transactions(blockchain: BlockchainData) -> impl Responder {
    match blockchain.get_all_transactions().await {
        Ok(transactions) => HttpResponse::Ok().json(transactions),
        Err(err) => error_response(err),
    }
}

/// Get all pending transactions
#[utoipa::path(
    get,
    path = "/api/v1/transactions/pending",
    responses(
        (status = 200, description = "Pending transactions retrieved successfully", body = Vec<Transaction>)
    )
)]
pub async fn get_pending_transactions(blockchain: BlockchainData) -> impl Responder {
    match blockchain.get_pending_transactions().await {
        Ok(transactions) => HttpResponse::Ok().json(transactions),
        Err(err) => error_response(err),
    }
}

/// Find a transaction by hash
#[utoipa::path(
    get,
    path = "/api/v1/transactions/{hash}",
    responses(
        (status = 200, description = "Transaction found", body = Transaction),
        (status = 404, description = "No such transaction")
    )
)]
pub async fn get_transaction_by_hash(
    blockchain: BlockchainData,
    hash: web::Path<String>,
) -> impl Responder {
    match blockchain.get_transaction_by_hash(&hash).await {
        Ok(Some(transaction)) => HttpResponse::Ok().json(transaction),
        Ok(None) => HttpResponse::NotFound().json(serde_json::json!({ "message": "not found" })),
        Err(err) => error_response(err),
    }
}

/// Mine a new block
///
/// Seals all pending transactions plus a reward into a new block
#[utoipa::path(
    post,
    path = "/api/v1/mine",
    request_body = MineRequest,
    responses(
        (status = 200, description = "Block mined successfully", body = Block),
        (status = 406, description = "Missing reward address"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn mine(blockchain: BlockchainData, request: web::Json<MineRequest>) -> impl Responder {
    let reward_address = Address(request.into_inner().address);

    match blockchain.mine(reward_address).await {
        Ok(block) => HttpResponse::Ok().json(block),
        Err(err) => error_response(err),
    }
}

/// Get the full chain
///
/// Each block carries its last transaction as `mining_data`
#[utoipa::path(
    get,
    path = "/api/v1/blockchain",
    responses(
        (status = 200, description = "Chain retrieved successfully", body = Vec<BlockView>)
    )
)]
pub async fn get_blockchain(blockchain: BlockchainData) -> impl Responder {
    match blockchain.get_blocks().await {
        Ok(blocks) => HttpResponse::Ok().json(blocks),
        Err(err) => error_response(err),
    }
}

/// Get a block by index
#[utoipa::path(
    get,
    path = "/api/v1/blockchain/{index}",
    responses(
        (status = 200, description = "Block found", body = BlockView),
        (status = 404, description = "No block at that index")
    )
)]
pub async fn get_block_by_index(
    blockchain: BlockchainData,
    index: web::Path<u64>,
) -> impl Responder {
    match blockchain.get_block_by_index(index.into_inner()).await {
        Ok(block) => HttpResponse::Ok().json(block),
        Err(err) => error_response(err),
    }
}

/// Replace the chain
///
/// Accepts only a longer chain that passes validation and proof of work
#[utoipa::path(
    put,
    path = "/api/v1/blockchain",
    request_body = ReplaceChainRequest,
    responses(
        (status = 200, description = "Chain replaced"),
        (status = 409, description = "Chain rejected")
    )
)]
pub async fn replace_blockchain(
    blockchain: BlockchainData,
    request: web::Json<ReplaceChainRequest>,
) -> impl Responder {
    match blockchain.replace_chain(request.into_inner().blocks).await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({ "message": "Chain replaced" })),
        Err(err) => error_response(err),
    }
}

/// Check if the chain is valid
#[utoipa::path(
    get,
    path = "/api/v1/validate",
    responses(
        (status = 200, description = "Chain validation status", body = ValidationResponse)
    )
)]
pub async fn validate_chain(blockchain: BlockchainData) -> impl Responder {
    let response = match blockchain.validate_chain().await {
        Ok(()) => ValidationResponse {
            valid: true,
            error: None,
        },
        Err(err) => ValidationResponse {
            valid: false,
            error: Some(err.to_string()),
        },
    };

    HttpResponse::Ok().json(response)
}

/// Get the confirmed transactions of a wallet
#[utoipa::path(
    get,
    path = "/api/v1/wallet/{address}/transactions",
    responses(
        (status = 200, description = "Wallet history", body = Vec<Transaction>)
    )
)]
pub async fn get_wallet_transactions(
    blockchain: BlockchainData,
    address: web::Path<String>,
) -> impl Responder {
    let address = Address(address.into_inner());

    match blockchain.get_all_transactions_for_wallet(&address).await {
        Ok(transactions) => HttpResponse::Ok().json(transactions),
        Err(err) => error_response(err),
    }
}

/// Get wallet balance
///
/// Returns the confirmed balance of a wallet as a bare number
#[utoipa::path(
    get,
    path = "/api/v1/wallet/{address}/balance",
    responses(
        (status = 200, description = "Wallet balance retrieved successfully", body = i64)
    )
)]
pub async fn get_wallet_balance(
    blockchain: BlockchainData,
    address: web::Path<String>,
) -> impl Responder {
    let address = Address(address.into_inner());

    match blockchain.get_balance_of_address(&address).await {
        Ok(balance) => HttpResponse::Ok().json(balance),
        Err(err) => error_response(err),
    }
}

/// Create a new wallet
///
/// The private key must be stored by your own
#[utoipa::path(
    post,
    path = "/api/v1/wallet/new",
    responses(
        (status = 201, description = "Wallet created successfully", body = WalletResponse)
    )
)]
pub async fn create_wallet() -> impl Responder {
    let (address, private_key) = crate::blockchain::crypto::generate_key_pair();

    HttpResponse::Created().json(WalletResponse {
        address,
        private_key,
    })
}

/// Sign a transfer
///
/// Development helper: computes the hash of a transfer and signs it with the
/// supplied private key
#[utoipa::path(
    post,
    path = "/api/v1/wallet/sign",
    request_body = SignRequest,
    responses(
        (status = 200, description = "Transfer signed", body = SignResponse),
        (status = 400, description = "Invalid key or sender")
    )
)]
pub async fn sign_transaction(request: web::Json<SignRequest>) -> impl Responder {
    let request = request.into_inner();

    let wallet = match Wallet::from_secret_hex(&request.private_key) {
        Ok(wallet) => wallet,
        Err(err) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": format!("Invalid private key: {}", err)
            }));
        }
    };

    let mut transaction = Transaction::new(Address(request.from), Address(request.to), request.amount);
    match transaction.sign_with(&wallet) {
        Ok(()) => HttpResponse::Ok().json(SignResponse {
            hash: transaction.hash,
            signature: transaction.signature.map(|s| s.0).unwrap_or_default(),
        }),
        Err(err) => HttpResponse::BadRequest().json(serde_json::json!({
            "error": format!("Failed to sign transaction: {}", err)
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::configure_routes;
    use crate::blockchain::MemoryStorage;
    use crate::config::LedgerConfig;
    use actix_web::{http::StatusCode, test, App};
    use std::sync::Arc;

    async fn ledger() -> BlockchainData {
        let config = LedgerConfig {
            difficulty: 1,
            mining_reward: 100,
        };
        let blockchain = Blockchain::new(Arc::new(MemoryStorage::new()), &config);
        blockchain.open().await.unwrap();
        web::Data::new(blockchain)
    }

    #[actix_web::test]
    async fn test_mine_sign_submit_flow() {
        let data = ledger().await;
        let app = test::init_service(App::new().app_data(data.clone()).configure(configure_routes)).await;

        let wallet: WalletResponse = test::call_and_read_body_json(
            &app,
            test::TestRequest::post().uri("/api/v1/wallet/new").to_request(),
        )
        .await;

        let mined: Block = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/api/v1/mine")
                .set_json(MineRequest { address: wallet.address.clone() })
                .to_request(),
        )
        .await;
        assert_eq!(mined.index, 1);

        let recipient = Wallet::new();
        let signed: SignResponse = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/api/v1/wallet/sign")
                .set_json(SignRequest {
                    from: wallet.address.clone(),
                    to: recipient.address().0.clone(),
                    amount: 30,
                    private_key: wallet.private_key.clone(),
                })
                .to_request(),
        )
        .await;

        let submit = |amount: u64| {
            test::TestRequest::post()
                .uri("/api/v1/transaction")
                .set_json(TransactionRequest {
                    from: wallet.address.clone(),
                    to: recipient.address().0.clone(),
                    amount,
                    signature: signed.signature.clone(),
                })
                .to_request()
        };

        let response = test::call_service(&app, submit(30)).await;
        assert_eq!(response.status(), StatusCode::OK);

        // Signature no longer matches the content
        let response = test::call_service(&app, submit(31)).await;
        assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);

        let response = test::call_service(
            &app,
            test::TestRequest::get().uri(&format!("/api/v1/transactions/{}", signed.hash)).to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        // Pending transfers do not move the confirmed balance
        let balance: i64 = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri(&format!("/api/v1/wallet/{}/balance", wallet.address))
                .to_request(),
        )
        .await;
        assert_eq!(balance, 100);
    }

    #[actix_web::test]
    async fn test_block_lookup_and_validation() {
        let data = ledger().await;
        let app = test::init_service(App::new().app_data(data.clone()).configure(configure_routes)).await;

        let response = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/v1/blockchain/5").to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let blocks: Vec<serde_json::Value> = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/v1/blockchain").to_request(),
        )
        .await;
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0]["mining_data"].is_null());

        let validation: ValidationResponse = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/v1/validate").to_request(),
        )
        .await;
        assert!(validation.valid);
    }
}
