use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use log::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use pow_ledger::api;
use pow_ledger::blockchain::{self, Blockchain, MemoryStorage, SledStorage, Storage};
use pow_ledger::config::{load_config, Config};

// Open the configured sled database, falling back to volatile storage
fn open_storage(config: &Config) -> Arc<dyn Storage> {
    let data_dir = &config.storage.path;

    if let Err(e) = std::fs::create_dir_all(data_dir) {
        warn!("Failed to create data directory {}: {}", data_dir, e);
    }

    match SledStorage::open(data_dir) {
        Ok(storage) => {
            info!("Using storage at {}", data_dir);
            Arc::new(storage)
        }
        Err(err) => {
            warn!("Failed to open storage at {}: {}", data_dir, err);
            warn!("Creating in-memory ledger instead");
            Arc::new(MemoryStorage::new())
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::post_transaction,
        api::handlers::get_transactions,
        api::handlers::get_pending_transactions,
        api::handlers::get_transaction_by_hash,
        api::handlers::mine,
        api::handlers::get_blockchain,
        api::handlers::get_block_by_index,
        api::handlers::replace_blockchain,
        api::handlers::validate_chain,
        api::handlers::get_wallet_transactions,
        api::handlers::get_wallet_balance,
        api::handlers::create_wallet,
        api::handlers::sign_transaction
    ),
    components(
        schemas(
            blockchain::Block,
            blockchain::BlockView,
            blockchain::Transaction,
            blockchain::Address,
            blockchain::DigitalSignature,
            api::schema::TransactionRequest,
            api::schema::SignRequest,
            api::schema::SignResponse,
            api::schema::MineRequest,
            api::schema::ReplaceChainRequest,
            api::schema::WalletResponse,
            api::schema::ValidationResponse
        )
    ),
    tags(
        (name = "ledger", description = "Proof-of-work ledger API")
    ),
    info(
        title = "Ledger API",
        version = "0.1.0",
        description = "A single-node proof-of-work ledger",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
struct ApiDoc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = load_config("config.toml").context("failed to load configuration")?;

    let ledger = Blockchain::new(open_storage(&config), &config.ledger);
    ledger.open().await.context("failed to open ledger")?;
    info!(
        "Ledger ready (difficulty {}, mining reward {})",
        ledger.difficulty(),
        ledger.mining_reward()
    );

    let ledger = web::Data::new(ledger);
    let bind = (config.server.host.clone(), config.server.port);

    info!("Starting HTTP server at http://{}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        let openapi = ApiDoc::openapi();

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(ledger.clone())
            .configure(api::configure_routes)
            .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi))
    })
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}
