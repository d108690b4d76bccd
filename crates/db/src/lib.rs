//! Database layer with `SeaORM` entities and repositories.
//!
//! This crate provides:
//! - `SeaORM` entity definitions for wallets, transactions and settlements
//! - Tenant-scoped transactions with row-level security and lock timeouts
//! - Repositories implementing the wallet ledger operations
//! - Database migrations

pub mod entities;
pub mod error;
pub mod migration;
pub mod repositories;
pub mod tenant;

pub use repositories::{
    Applied, AutoTopUpRepository, BalanceAlertRepository, CreditExpiryRepository,
    LedgerRepository, SettlementRepository, TransactionFilter, TransactionLogRepository,
    WalletBalance, WalletRepository,
};
pub use tenant::TenantTransaction;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use tally_shared::config::DatabaseConfig;

/// Establishes a connection pool to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .sqlx_logging(false);
    Database::connect(options).await
}
