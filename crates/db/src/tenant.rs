//! Tenant-scoped database transactions.
//!
//! Every repository call runs inside a `TenantTransaction`, which sets the
//! row-level-security context and the lock and statement timeouts with
//! `SET LOCAL`, so all three settings end with the transaction.
//!
//! # Usage
//!
//! ```ignore
//! use tally_db::tenant::TenantTransaction;
//!
//! let tx = TenantTransaction::begin(&db, tenant_id, &ledger_config).await?;
//! let wallets = Wallets::find().all(tx.conn()).await?;
//! tx.commit().await?;
//! ```

use sea_orm::{ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr, TransactionTrait};
use tally_shared::config::LedgerConfig;
use tally_shared::types::TenantId;

/// A database transaction bound to one tenant.
///
/// Dropping it without `commit` rolls back.
pub struct TenantTransaction {
    txn: DatabaseTransaction,
}

impl TenantTransaction {
    /// Begins a transaction and applies the tenant context and timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started or the settings
    /// cannot be applied.
    pub async fn begin(
        db: &DatabaseConnection,
        tenant_id: TenantId,
        config: &LedgerConfig,
    ) -> Result<Self, DbErr> {
        let txn = db.begin().await?;
        txn.execute_unprepared(&context_sql(tenant_id, config)).await?;
        Ok(Self { txn })
    }

    /// Returns the underlying transaction for executing queries.
    #[must_use]
    pub fn conn(&self) -> &DatabaseTransaction {
        &self.txn
    }

    /// Commits the transaction, persisting all changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails.
    pub async fn commit(self) -> Result<(), DbErr> {
        self.txn.commit().await
    }

    /// Rolls back the transaction, discarding all changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails.
    pub async fn rollback(self) -> Result<(), DbErr> {
        self.txn.rollback().await
    }
}

/// Builds the `SET LOCAL` statements applied at the start of every transaction.
///
/// Values are a typed UUID and integers, so they are formatted inline.
#[must_use]
pub fn context_sql(tenant_id: TenantId, config: &LedgerConfig) -> String {
    format!(
        "SET LOCAL app.current_tenant_id = '{tenant_id}'; \
         SET LOCAL lock_timeout = '{}ms'; \
         SET LOCAL statement_timeout = '{}ms'",
        config.lock_timeout_ms, config.statement_timeout_ms
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_context_sql_format() {
        let tenant = TenantId::from_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        let config = LedgerConfig {
            lock_timeout_ms: 250,
            statement_timeout_ms: 1_000,
            ..LedgerConfig::default()
        };
        assert_eq!(
            context_sql(tenant, &config),
            "SET LOCAL app.current_tenant_id = '550e8400-e29b-41d4-a716-446655440000'; \
             SET LOCAL lock_timeout = '250ms'; \
             SET LOCAL statement_timeout = '1000ms'"
        );
    }
}
