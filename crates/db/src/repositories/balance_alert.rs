//! Low-balance alert check for one tenant.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tally_core::wallet::{
    alert_transition, AlertState, BalanceAlertOutcome, BalanceAlertReport, Wallet, WalletError,
};
use tally_shared::config::LedgerConfig;
use tally_shared::types::{TenantId, WalletId};
use tracing::{debug, info, warn};

use super::ledger::lock_wallet;
use crate::entities::{
    sea_orm_active_enums::{RecordStatus, WalletStatus},
    wallets,
};
use crate::error::DbResultExt;
use crate::tenant::TenantTransaction;

/// Records alert state transitions for wallets with alerts enabled.
#[derive(Debug, Clone)]
pub struct BalanceAlertRepository {
    db: DatabaseConnection,
    config: LedgerConfig,
}

impl BalanceAlertRepository {
    /// Creates a new balance alert repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, config: LedgerConfig) -> Self {
        Self { db, config }
    }

    /// Checks every active wallet of the tenant that has alerts enabled.
    ///
    /// # Errors
    ///
    /// Returns an error only if the candidate query fails.
    pub async fn run(&self, tenant_id: TenantId) -> Result<BalanceAlertReport, WalletError> {
        let candidates = self.candidates(tenant_id).await?;
        let mut report = BalanceAlertReport::default();

        for wallet in &candidates {
            if alert_transition(wallet).is_none() {
                report.unchanged();
                continue;
            }
            match self.check(tenant_id, wallet.id).await {
                Ok(Some(outcome)) => report.push(outcome),
                Ok(None) => report.unchanged(),
                Err(e) => {
                    warn!(
                        tenant_id = %tenant_id,
                        wallet_id = %wallet.id,
                        error = %e,
                        "Balance alert check failed"
                    );
                    report.push(BalanceAlertOutcome::failed(wallet.id, &e));
                }
            }
        }

        info!(
            tenant_id = %tenant_id,
            checked = report.checked,
            triggered = report.triggered,
            recovered = report.recovered,
            failed = report.failed,
            "Balance alert check finished"
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
            .filter(wallets::Column::AlertEnabled.eq(true))
            .order_by_asc(wallets::Column::CreatedAt)
            .all(tx.conn())
            .await
            .map_db()?;
        tx.commit().await.map_db()?;
        rows.into_iter().map(wallets::Model::into_domain).collect()
    }

    /// Re-evaluates one wallet under its row lock and stores the new state.
    ///
    /// Only `alert_state` is written; `updated_at` stays put so the alert
    /// check does not disturb auto top-up keys.
    async fn check(
        &self,
        tenant_id: TenantId,
        wallet_id: WalletId,
    ) -> Result<Option<BalanceAlertOutcome>, WalletError> {
        let tx = TenantTransaction::begin(&self.db, tenant_id, &self.config)
            .await
            .map_db()?;
        let locked = lock_wallet(tx.conn(), tenant_id, wallet_id).await?;
        let current = locked.clone().into_domain()?;

        let Some(next) = alert_transition(&current) else {
            debug!(wallet_id = %wallet_id, "Alert state unchanged under lock");
            tx.rollback().await.map_db()?;
            return Ok(None);
        };

        let mut active: wallets::ActiveModel = locked.into();
        active.alert_state = Set(next.into());
        active.update(tx.conn()).await.map_db()?;
        tx.commit().await.map_db()?;

        let threshold = current.balance_alert.threshold;
        let outcome = match next {
            AlertState::InAlarm => {
                warn!(
                    tenant_id = %tenant_id,
                    wallet_id = %wallet_id,
                    balance = %current.balance,
                    threshold = %threshold,
                    "Wallet balance at or below alert threshold"
                );
                BalanceAlertOutcome::Triggered {
                    wallet_id,
                    balance: current.balance,
                    threshold,
                }
            }
            AlertState::Ok => {
                info!(
                    tenant_id = %tenant_id,
                    wallet_id = %wallet_id,
                    balance = %current.balance,
                    threshold = %threshold,
                    "Wallet balance recovered above alert threshold"
                );
                BalanceAlertOutcome::Recovered {
                    wallet_id,
                    balance: current.balance,
                }
            }
        };
        Ok(Some(outcome))
    }
}
