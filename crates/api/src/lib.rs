//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST routes over the wallet repositories
//! - The tenant context extractor
//! - Error responses mapped from the wallet error taxonomy

pub mod error;
pub mod middleware;
pub mod routes;

use axum::Router;
use sea_orm::DatabaseConnection;
use tally_core::wallet::SettlementStrategy;
use tally_db::{
    AutoTopUpRepository, BalanceAlertRepository, CreditExpiryRepository, LedgerRepository,
    SettlementRepository, TransactionLogRepository, WalletRepository,
};
use tally_shared::{AppConfig, AppError};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Wallet lifecycle and balance reads.
    pub wallets: WalletRepository,
    /// Credit/debit primitive.
    pub ledger: LedgerRepository,
    /// Transaction log reads and reconciliation.
    pub transactions: TransactionLogRepository,
    /// Multi-wallet settlement.
    pub settlements: SettlementRepository,
    /// Auto top-up runs.
    pub auto_top_up: AutoTopUpRepository,
    /// Credit expiry runs.
    pub credit_expiry: CreditExpiryRepository,
    /// Low-balance alert checks.
    pub balance_alerts: BalanceAlertRepository,
}

impl AppState {
    /// Builds the repositories over one connection pool.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `settlement.default_strategy` is unknown.
    pub fn new(db: DatabaseConnection, config: &AppConfig) -> Result<Self, AppError> {
        let strategy: SettlementStrategy = config
            .settlement
            .default_strategy
            .parse()
            .map_err(|e| AppError::Config(format!("settlement.default_strategy: {e}")))?;
        let ledger_config = config.ledger.clone();

        Ok(Self {
            wallets: WalletRepository::new(db.clone(), ledger_config.clone()),
            ledger: LedgerRepository::new(db.clone(), ledger_config.clone()),
            transactions: TransactionLogRepository::new(db.clone(), ledger_config.clone()),
            settlements: SettlementRepository::new(db.clone(), ledger_config.clone(), strategy),
            auto_top_up: AutoTopUpRepository::new(db.clone(), ledger_config.clone()),
            credit_expiry: CreditExpiryRepository::new(db.clone(), ledger_config.clone()),
            balance_alerts: BalanceAlertRepository::new(db, ledger_config),
        })
    }
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
