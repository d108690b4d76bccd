//! Auto top-up run for one tenant.

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use tally_core::wallet::{
    needs_top_up, top_up_key, AutoTopUpOutcome, AutoTopUpReport, LedgerOperation, ReferenceType,
    Wallet, WalletError,
};
use tally_shared::config::LedgerConfig;
use tally_shared::types::TenantId;
use tracing::{debug, info, warn};

use super::ledger::{apply_locked, lock_wallet, log_committed};
use crate::entities::{
    sea_orm_active_enums::{RecordStatus, WalletStatus},
    wallets,
};
use crate::error::DbResultExt;
use crate::tenant::TenantTransaction;

/// Credits wallets that fell below their auto top-up threshold.
#[derive(Debug, Clone)]
pub struct AutoTopUpRepository {
    db: DatabaseConnection,
    config: LedgerConfig,
}

impl AutoTopUpRepository {
    /// Creates a new auto top-up repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, config: LedgerConfig) -> Self {
        Self { db, config }
    }

    /// Evaluates every opted-in wallet of the tenant and credits those below
    /// threshold. Per-wallet failures are reported, not returned.
    ///
    /// # Errors
    ///
    /// Returns an error only if the candidate query fails.
    pub async fn run(&self, tenant_id: TenantId) -> Result<AutoTopUpReport, WalletError> {
        let candidates = self.candidates(tenant_id).await?;
        let mut report = AutoTopUpReport::default();

        for wallet in candidates.iter().filter(|w| needs_top_up(w)) {
            let outcome = match self.top_up(tenant_id, wallet).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(
                        tenant_id = %tenant_id,
                        wallet_id = %wallet.id,
                        error = %e,
                        "Auto top-up failed"
                    );
                    AutoTopUpOutcome::failed(wallet.id, &e)
                }
            };
            report.push(outcome);
        }

        info!(
            tenant_id = %tenant_id,
            evaluated = report.evaluated,
            credited = report.credited,
            skipped = report.skipped,
            failed = report.failed,
            "Auto top-up run finished"
        );
        Ok(report)
    }

    async fn candidates(&self, tenant_id: TenantId) -> Result<Vec<Wallet>, WalletError> {
        let tx = TenantTransaction::begin(&self.db, tenant_id, &self.config)
            .await
            .map_db()?;
        let rows = wallets::Entity::find()
            .filter(wallets::Column::TenantId.eq(tenant_id.into_inner()))
            .filter(wallets::Column::Status.eq(RecordStatus::Published))
            .filter(wallets::Column::WalletStatus.eq(WalletStatus::Active))
            .filter(wallets::Column::AutoTopUpEnabled.eq(true))
            .order_by_asc(wallets::Column::CreatedAt)
            .all(tx.conn())
            .await
            .map_db()?;
        tx.commit().await.map_db()?;
        rows.into_iter().map(wallets::Model::into_domain).collect()
    }

    /// Credits one wallet if it is unchanged since it was observed.
    async fn top_up(
        &self,
        tenant_id: TenantId,
        observed: &Wallet,
    ) -> Result<AutoTopUpOutcome, WalletError> {
        let tx = TenantTransaction::begin(&self.db, tenant_id, &self.config)
            .await
            .map_db()?;
        let locked = lock_wallet(tx.conn(), tenant_id, observed.id).await?;
        let current = locked.clone().into_domain()?;

        if current.updated_at != observed.updated_at || !needs_top_up(&current) {
            debug!(wallet_id = %observed.id, "Wallet changed since selection, skipping top-up");
            tx.rollback().await.map_db()?;
            return Ok(AutoTopUpOutcome::Skipped {
                wallet_id: observed.id,
            });
        }

        let op = LedgerOperation::credit(
            observed.id,
            current.auto_top_up.top_up_amount,
            ReferenceType::AutoTopUp,
            observed.id.to_string(),
        )
        .with_description("Automatic top-up")
        .with_idempotency_key(top_up_key(observed.id, observed.updated_at));

        let applied = apply_locked(tx.conn(), locked, &op).await?;
        tx.commit().await.map_db()?;

        if applied.replayed {
            return Ok(AutoTopUpOutcome::Skipped {
                wallet_id: observed.id,
            });
        }
        log_committed(tenant_id, &applied.transaction);
        Ok(AutoTopUpOutcome::Credited {
            wallet_id: observed.id,
            transaction_id: applied.transaction.id,
        })
    }
}
