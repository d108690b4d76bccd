//! Tally API Server
//!
//! Main entry point for the wallet ledger service.

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tally_api::{AppState, create_router};
use tally_db::connect;
use tally_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load()?;

    let db = connect(&config.database).await?;
    info!(
        max_connections = config.database.max_connections,
        "Connected to database"
    );
    info!(
        lock_timeout_ms = config.ledger.lock_timeout_ms,
        statement_timeout_ms = config.ledger.statement_timeout_ms,
        max_retries = config.ledger.max_retries,
        default_strategy = %config.settlement.default_strategy,
        "Ledger configured"
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(db, &config)?;
    let app = create_router(state);

    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
