use actix_web::web;

use super::handlers;

/// Configures the API routes
///
/// # Arguments
///
/// * `cfg` - The service configuration
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/transaction", web::post().to(handlers::post_transaction))
            .route("/transactions", web::get().to(handlers::get_transactions))
            // Registered before the `{hash}` route so "pending" is not taken as a hash
            .route("/transactions/pending", web::get().to(handlers::get_pending_transactions))
            .route("/transactions/{hash}", web::get().to(handlers::get_transaction_by_hash))
            .route("/mine", web::post().to(handlers::mine))
            .route("/blockchain", web::get().to(handlers::get_blockchain))
            .route("/blockchain", web::put().to(handlers::replace_blockchain))
            .route("/blockchain/{index}", web::get().to(handlers::get_block_by_index))
            .route("/validate", web::get().to(handlers::validate_chain))
            .route("/wallet/new", web::post().to(handlers::create_wallet))
            .route("/wallet/sign", web::post().to(handlers::sign_transaction))
            .route("/wallet/{address}/transactions", web::get().to(handlers::get_wallet_transactions))
            .route("/wallet/{address}/balance", web::get().to(handlers::get_wallet_balance)),
    );
}
