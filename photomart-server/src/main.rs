//! Photomart Payments Server
//!
//! Verifies Razorpay payments for photo purchases and hands buyers signed
//! download links for the originals.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ConfigLoader, get_database_url};
use photomart_core::gateway::RazorpayClient;
use photomart_core::identity::FirebaseTokenVerifier;
use photomart_core::ledger::PgLedger;
use photomart_core::pipeline::PaymentPipeline;
use photomart_core::storage::GcsUrlSigner;
use server::{build_router, run_server};
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Photomart - payment verification and order fulfillment for a photo marketplace
#[derive(Parser, Debug)]
#[command(name = "photomart-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./photomart.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "PHOTOMART_LOG_JSON", default_value = "false")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing
    init_tracing(args.log_json);

    tracing::info!("Starting photomart-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = ConfigLoader::new(&args.config, args.listen);
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    let listen_addr = loaded_config.server.listen;

    // Get database URL from environment
    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    // Run migrations if requested
    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    // Wire the collaborators once; handlers only ever see the pipeline.
    let signer = GcsUrlSigner::new(
        loaded_config.storage.bucket.clone(),
        &loaded_config.service_account,
    )
    .map_err(|e| {
        tracing::error!("Failed to load the URL signing key: {}", e);
        e
    })?;
    let pipeline = PaymentPipeline::new(
        Arc::new(FirebaseTokenVerifier::new(&loaded_config.firebase)),
        Arc::new(RazorpayClient::new(&loaded_config.razorpay)),
        Arc::new(signer),
        Arc::new(PgLedger::new(db_pool.clone())),
        loaded_config.razorpay,
        loaded_config.storage.signed_url_ttl,
    );
    tracing::info!(
        project_id = %loaded_config.firebase.project_id,
        bucket = %loaded_config.storage.bucket,
        "Payment pipeline ready"
    );

    // Build the router
    let router = build_router(AppState::new(pipeline));

    // Run the server
    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    // Close database connections gracefully
    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
