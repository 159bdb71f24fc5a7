//! rastro-server - Package tracker backend
//!
//! Serves the account/package HTTP API and runs the background status
//! refresh service that polls the Correios tracking API for every
//! undelivered package.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use rastro_common::config::ServerConfig;
use rastro_server::api::auth::JwtKeys;
use rastro_server::services::ocr_client::GeminiOcrClient;
use rastro_server::services::{CorreiosClient, RefreshConfig, StatusRefreshService};
use rastro_server::AppState;

#[derive(Debug, Parser)]
#[command(name = "rastro-server", about = "Package tracker backend")]
struct Args {
    /// SQLite database path (overrides env/config file)
    #[arg(long)]
    database: Option<String>,

    /// HTTP listen address (overrides env/config file)
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting rastro-server v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let config = ServerConfig::resolve(args.database.as_deref(), args.bind.as_deref())
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    info!("Database: {}", config.database_path.display());
    let pool = rastro_common::db::init_database(&config.database_path).await?;

    // Carrier client and refresh service; the service owns its collaborators
    // explicitly and skips ticks while a cycle is still running
    let correios = CorreiosClient::new(config.correios_api_key.clone())
        .map_err(|e| anyhow::anyhow!("Failed to create Correios client: {}", e))?;
    let refresher = Arc::new(StatusRefreshService::new(
        RefreshConfig {
            interval_secs: config.refresh_interval_secs,
            enabled: config.refresh_enabled,
        },
        pool.clone(),
        Arc::new(correios),
    ));
    refresher.run();

    let ocr = match &config.gemini_api_key {
        Some(key) => {
            let client = GeminiOcrClient::new(key.clone())
                .map_err(|e| anyhow::anyhow!("Failed to create OCR client: {}", e))?;
            Some(Arc::new(client))
        }
        None => {
            info!("No Gemini API key configured; OCR assist disabled");
            None
        }
    };

    let state = AppState::new(pool.clone(), JwtKeys::new(&config.jwt_secret), ocr);
    let app = rastro_server::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!("Listening on http://{}", config.bind_address);
    info!("Health check: http://{}/health", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Explicit teardown: flush and close the pool before exit
    pool.close().await;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    } else {
        info!("Shutdown signal received");
    }
}
