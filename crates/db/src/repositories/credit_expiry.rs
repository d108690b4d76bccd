//! Credit expiry run for one tenant.
//!
//! Each expired credit is handled in its own transaction under the wallet
//! row lock: the wallet history is replayed into credit lots, the unspent
//! remainder of the credit is debited, and a `wallet_credit_expiries` row
//! marks the credit as processed so later runs skip it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Query;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    JoinType, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
};
use tally_core::wallet::{
    expiry_operation, CreditExpiryOutcome, CreditExpiryReport, CreditLots, WalletError,
    WalletTransaction,
};
use tally_shared::config::LedgerConfig;
use tally_shared::types::{TenantId, WalletTransactionId};
use tracing::{debug, info, warn};

use super::ledger::{apply_locked, lock_wallet, log_committed};
use crate::entities::{
    sea_orm_active_enums::{RecordStatus, WalletTransactionStatus, WalletTransactionType},
    wallet_credit_expiries, wallet_transactions, wallets,
};
use crate::error::DbResultExt;
use crate::tenant::TenantTransaction;

/// Debits the unspent remainder of expired credits.
#[derive(Debug, Clone)]
pub struct CreditExpiryRepository {
    db: DatabaseConnection,
    config: LedgerConfig,
}

impl CreditExpiryRepository {
    /// Creates a new credit expiry repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, config: LedgerConfig) -> Self {
        Self { db, config }
    }

    /// Processes every credit of the tenant that expired at or before `as_of`
    /// and has not been processed yet. Per-credit failures are reported, not
    /// returned, and retried by the next run.
    ///
    /// # Errors
    ///
    /// Returns an error only if the candidate query fails.
    pub async fn run(
        &self,
        tenant_id: TenantId,
        as_of: DateTime<Utc>,
    ) -> Result<CreditExpiryReport, WalletError> {
        let credits = self.expired_credits(tenant_id, as_of).await?;
        let mut report = CreditExpiryReport::default();

        for credit in &credits {
            let outcome = match self.expire(tenant_id, credit).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(
                        tenant_id = %tenant_id,
                        wallet_id = %credit.wallet_id,
                        credit_transaction_id = %credit.id,
                        error = %e,
                        "Credit expiry failed"
                    );
                    CreditExpiryOutcome::failed(credit, &e)
                }
            };
            report.push(outcome);
        }

        info!(
            tenant_id = %tenant_id,
            as_of = %as_of,
            evaluated = report.evaluated,
            expired = report.expired,
            consumed = report.consumed,
            skipped = report.skipped,
            failed = report.failed,
            amount_expired = %report.amount_expired,
            "Credit expiry run finished"
        );
        Ok(report)
    }

    async fn expired_credits(
        &self,
        tenant_id: TenantId,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<WalletTransaction>, WalletError> {
        let processed = Query::select()
            .column(wallet_credit_expiries::Column::TransactionId)
            .from(wallet_credit_expiries::Entity)
            .and_where(wallet_credit_expiries::Column::TenantId.eq(tenant_id.into_inner()))
            .to_owned();

        let tx = TenantTransaction::begin(&self.db, tenant_id, &self.config)
            .await
            .map_db()?;
        let rows = wallet_transactions::Entity::find()
            .join(JoinType::InnerJoin, wallet_transactions::Relation::Wallets.def())
            .filter(wallet_transactions::Column::TenantId.eq(tenant_id.into_inner()))
            .filter(wallet_transactions::Column::TransactionType.eq(WalletTransactionType::Credit))
            .filter(
                wallet_transactions::Column::TransactionStatus.eq(WalletTransactionStatus::Completed),
            )
            .filter(wallet_transactions::Column::ExpiresAt.lte(as_of))
            .filter(wallet_transactions::Column::Id.not_in_subquery(processed))
            .filter(wallets::Column::Status.eq(RecordStatus::Published))
            .order_by_asc(wallet_transactions::Column::ExpiresAt)
            .order_by_asc(wallet_transactions::Column::Id)
            .all(tx.conn())
            .await
            .map_db()?;
        tx.commit().await.map_db()?;

        debug!(tenant_id = %tenant_id, candidates = rows.len(), "Expired credits selected");
        rows.into_iter().map(wallet_transactions::Model::into_domain).collect()
    }

    /// Expires one credit under the wallet row lock.
    async fn expire(
        &self,
        tenant_id: TenantId,
        credit: &WalletTransaction,
    ) -> Result<CreditExpiryOutcome, WalletError> {
        let tx = TenantTransaction::begin(&self.db, tenant_id, &self.config)
            .await
            .map_db()?;
        let locked = lock_wallet(tx.conn(), tenant_id, credit.wallet_id).await?;

        if is_processed(tx.conn(), credit.id).await? {
            debug!(credit_transaction_id = %credit.id, "Credit already expired by another run");
            tx.rollback().await.map_db()?;
            return Ok(CreditExpiryOutcome::Skipped {
                wallet_id: credit.wallet_id,
                credit_transaction_id: credit.id,
            });
        }

        let history = wallet_history(tx.conn(), locked.tenant_id, locked.id).await?;
        let remaining = CreditLots::from_history(&history)
            .remaining(credit.id)
            .min(locked.balance);

        let debit = if remaining > Decimal::ZERO {
            let op = expiry_operation(credit, remaining);
            Some(apply_locked(tx.conn(), locked, &op).await?.transaction)
        } else {
            None
        };

        let marker = wallet_credit_expiries::ActiveModel {
            transaction_id: Set(credit.id.into_inner()),
            tenant_id: Set(tenant_id.into_inner()),
            wallet_id: Set(credit.wallet_id.into_inner()),
            expired_amount: Set(debit.as_ref().map_or(Decimal::ZERO, |t| t.amount)),
            debit_transaction_id: Set(debit.as_ref().map(|t| t.id.into_inner())),
            created_at: Set(Utc::now().into()),
        };
        marker.insert(tx.conn()).await.map_db()?;
        tx.commit().await.map_db()?;

        let Some(transaction) = debit else {
            debug!(credit_transaction_id = %credit.id, "Expired credit was fully spent");
            return Ok(CreditExpiryOutcome::Consumed {
                wallet_id: credit.wallet_id,
                credit_transaction_id: credit.id,
            });
        };
        log_committed(tenant_id, &transaction);
        Ok(CreditExpiryOutcome::Expired {
            wallet_id: credit.wallet_id,
            credit_transaction_id: credit.id,
            amount: transaction.amount,
            transaction_id: transaction.id,
        })
    }
}

async fn is_processed(
    conn: &DatabaseTransaction,
    credit_id: WalletTransactionId,
) -> Result<bool, WalletError> {
    let marker = wallet_credit_expiries::Entity::find_by_id(credit_id.into_inner())
        .one(conn)
        .await
        .map_db()?;
    Ok(marker.is_some())
}

/// Loads a wallet's ledger in commit order.
async fn wallet_history(
    conn: &DatabaseTransaction,
    tenant_id: uuid::Uuid,
    wallet_id: uuid::Uuid,
) -> Result<Vec<WalletTransaction>, WalletError> {
    wallet_transactions::Entity::find()
        .filter(wallet_transactions::Column::TenantId.eq(tenant_id))
        .filter(wallet_transactions::Column::WalletId.eq(wallet_id))
        .order_by_asc(wallet_transactions::Column::CreatedAt)
        .order_by_asc(wallet_transactions::Column::Id)
        .all(conn)
        .await
        .map_db()?
        .into_iter()
        .map(wallet_transactions::Model::into_domain)
        .collect()
}
