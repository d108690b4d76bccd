//! Database migrations.
//!
//! Migrations are managed using sea-orm-migration.

pub use sea_orm_migration::prelude::*;

mod m20260301_000001_wallets;
mod m20260301_000002_wallet_rls;
mod m20260301_000003_expiry_and_alerts;

/// Migrator for running database migrations.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_wallets::Migration),
            Box::new(m20260301_000002_wallet_rls::Migration),
            Box::new(m20260301_000003_expiry_and_alerts::Migration),
        ]
    }
}
