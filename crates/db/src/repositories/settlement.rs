//! Multi-wallet settlement saga.
//!
//! A settlement drains a customer's wallets in strategy order until the
//! invoice is covered. Each wallet debit commits on its own; a failure on
//! one wallet is recorded and the saga moves on. A summary row in
//! `wallet_settlements` is written as `pending` before the first debit and
//! completed with the totals afterwards.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tally_core::wallet::{
    order_wallets, wallet_debit_key, LedgerOperation, ReferenceType, SettlementOutcome,
    SettlementRequest, SettlementStatus, SettlementStrategy, SettlementTally, Wallet, WalletError,
};
use tally_shared::config::LedgerConfig;
use tally_shared::types::{CurrencyCode, SettlementId, TenantId, UserId};
use tracing::{debug, info, warn};

use super::ledger::LedgerRepository;
use crate::entities::{
    sea_orm_active_enums::{self, RecordStatus},
    wallet_settlements, wallets,
};
use crate::error::{classify, is_unique_violation, DbResultExt};
use crate::tenant::TenantTransaction;

/// Repository running settlements.
#[derive(Debug, Clone)]
pub struct SettlementRepository {
    db: DatabaseConnection,
    config: LedgerConfig,
    ledger: LedgerRepository,
    default_strategy: SettlementStrategy,
}

impl SettlementRepository {
    /// Creates a new settlement repository.
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        config: LedgerConfig,
        default_strategy: SettlementStrategy,
    ) -> Self {
        let ledger = LedgerRepository::new(db.clone(), config.clone());
        Self {
            db,
            config,
            ledger,
            default_strategy,
        }
    }

    /// Settles an invoice against the customer's wallets.
    ///
    /// Per-wallet failures are part of the outcome, not errors.
    ///
    /// # Errors
    ///
    /// - `Validation` for a non-positive amount or malformed currency
    /// - `Conflict` if a settlement with the same idempotency key is still pending
    /// - `Transient`/`Database` if the summary record cannot be written
    pub async fn settle(
        &self,
        tenant_id: TenantId,
        request: SettlementRequest,
        actor: Option<UserId>,
    ) -> Result<SettlementOutcome, WalletError> {
        let currency = request.validate()?;
        let strategy = request.strategy.unwrap_or(self.default_strategy);

        if let Some(key) = request.idempotency_key.as_deref() {
            if let Some(existing) = self.find_by_key(tenant_id, key).await? {
                return replay(existing);
            }
        }

        let settlement_id = SettlementId::new();
        if let Err(e) = self
            .insert_pending(tenant_id, settlement_id, &request, currency, strategy, actor)
            .await
        {
            return match (e, request.idempotency_key.as_deref()) {
                (Lost::Duplicate, Some(key)) => match self.find_by_key(tenant_id, key).await? {
                    Some(existing) => replay(existing),
                    None => Err(WalletError::Conflict(format!(
                        "settlement with idempotency key {key} is being created concurrently"
                    ))),
                },
                (Lost::Duplicate, None) => Err(WalletError::Conflict(format!(
                    "settlement {settlement_id} already exists"
                ))),
                (Lost::Other(err), _) => Err(err),
            };
        }

        let wallets = self.customer_wallets(tenant_id, &request).await?;
        let ordered = order_wallets(wallets, currency, strategy, request.max_wallets);
        debug!(
            tenant_id = %tenant_id,
            settlement_id = %settlement_id,
            strategy = %strategy,
            eligible = ordered.len(),
            "Settlement wallets ordered"
        );

        let mut tally = SettlementTally::new(request.amount_due);
        for wallet in &ordered {
            if tally.is_settled() {
                break;
            }
            self.debit_wallet(tenant_id, settlement_id, &request, wallet, actor, &mut tally)
                .await;
        }

        let (collected, remaining, results) = tally.finish();
        let outcome = SettlementOutcome {
            settlement_id,
            invoice_id: request.invoice_id,
            customer_id: request.customer_id,
            currency,
            strategy,
            amount_due: request.amount_due,
            amount_collected: collected,
            remaining_due: remaining,
            status: SettlementStatus::Completed,
            wallet_results: results,
        };
        self.complete(tenant_id, &outcome).await?;

        info!(
            tenant_id = %tenant_id,
            settlement_id = %settlement_id,
            invoice_id = %outcome.invoice_id,
            amount_due = %outcome.amount_due,
            amount_collected = %outcome.amount_collected,
            remaining_due = %outcome.remaining_due,
            wallets_attempted = outcome.wallet_results.len(),
            "Settlement completed"
        );
        Ok(outcome)
    }

    /// Fetches a settlement summary.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the settlement does not exist for the tenant.
    pub async fn get(
        &self,
        tenant_id: TenantId,
        settlement_id: SettlementId,
    ) -> Result<SettlementOutcome, WalletError> {
        let tx = TenantTransaction::begin(&self.db, tenant_id, &self.config)
            .await
            .map_db()?;
        let row = wallet_settlements::Entity::find_by_id(settlement_id.into_inner())
            .filter(wallet_settlements::Column::TenantId.eq(tenant_id.into_inner()))
            .one(tx.conn())
            .await
            .map_db()?
            .ok_or_else(|| WalletError::not_found("settlement", settlement_id))?;
        tx.commit().await.map_db()?;
        row.into_outcome()
    }

    /// Debits one wallet and records the result. Never fails the saga.
    ///
    /// If the balance shrank since the wallets were listed, the debit is
    /// retried once with the balance observed under lock.
    async fn debit_wallet(
        &self,
        tenant_id: TenantId,
        settlement_id: SettlementId,
        request: &SettlementRequest,
        wallet: &Wallet,
        actor: Option<UserId>,
        tally: &mut SettlementTally,
    ) {
        let mut amount = tally.next_amount(wallet.balance);
        let mut retried = false;
        loop {
            let op = LedgerOperation::debit(
                wallet.id,
                amount,
                ReferenceType::InvoicePayment,
                request.invoice_id.clone(),
            )
            .with_description(format!("Payment for invoice {}", request.invoice_id))
            .with_metadata(serde_json::json!({ "settlement_id": settlement_id }))
            .with_idempotency_key(wallet_debit_key(settlement_id, wallet.id))
            .with_actor(actor);

            match self.ledger.debit_with_retry(tenant_id, op).await {
                Ok(applied) => {
                    tally.record_debit(wallet.id, applied.transaction.amount, applied.transaction.id);
                    return;
                }
                Err(WalletError::InsufficientBalance { balance, .. })
                    if !retried && balance > Decimal::ZERO =>
                {
                    debug!(
                        settlement_id = %settlement_id,
                        wallet_id = %wallet.id,
                        balance = %balance,
                        "Wallet balance moved, retrying with current balance"
                    );
                    amount = tally.next_amount(balance);
                    retried = true;
                }
                Err(e) => {
                    warn!(
                        tenant_id = %tenant_id,
                        settlement_id = %settlement_id,
                        wallet_id = %wallet.id,
                        attempted = %amount,
                        error = %e,
                        "Settlement debit failed"
                    );
                    tally.record_failure(wallet.id, amount, &e);
                    return;
                }
            }
        }
    }

    async fn find_by_key(
        &self,
        tenant_id: TenantId,
        key: &str,
    ) -> Result<Option<wallet_settlements::Model>, WalletError> {
        let tx = TenantTransaction::begin(&self.db, tenant_id, &self.config)
            .await
            .map_db()?;
        let row = wallet_settlements::Entity::find()
            .filter(wallet_settlements::Column::TenantId.eq(tenant_id.into_inner()))
            .filter(wallet_settlements::Column::IdempotencyKey.eq(key))
            .one(tx.conn())
            .await
            .map_db()?;
        tx.commit().await.map_db()?;
        Ok(row)
    }

    async fn insert_pending(
        &self,
        tenant_id: TenantId,
        settlement_id: SettlementId,
        request: &SettlementRequest,
        currency: CurrencyCode,
        strategy: SettlementStrategy,
        actor: Option<UserId>,
    ) -> Result<(), Lost> {
        let tx = TenantTransaction::begin(&self.db, tenant_id, &self.config)
            .await
            .map_err(Lost::from)?;
        let now = Utc::now().into();
        let row = wallet_settlements::ActiveModel {
            id: Set(settlement_id.into_inner()),
            tenant_id: Set(tenant_id.into_inner()),
            customer_id: Set(request.customer_id.into_inner()),
            invoice_id: Set(request.invoice_id.clone()),
            currency: Set(currency.as_str().to_string()),
            strategy: Set(strategy.as_str().to_string()),
            amount_due: Set(request.amount_due),
            amount_collected: Set(Decimal::ZERO),
            remaining_due: Set(request.amount_due),
            settlement_status: Set(sea_orm_active_enums::SettlementStatus::Pending),
            wallet_results: Set(serde_json::json!([])),
            idempotency_key: Set(request.idempotency_key.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            created_by: Set(actor.map(UserId::into_inner)),
        };
        row.insert(tx.conn()).await.map_err(Lost::from)?;
        tx.commit().await.map_err(Lost::from)?;
        Ok(())
    }

    async fn customer_wallets(
        &self,
        tenant_id: TenantId,
        request: &SettlementRequest,
    ) -> Result<Vec<Wallet>, WalletError> {
        let tx = TenantTransaction::begin(&self.db, tenant_id, &self.config)
            .await
            .map_db()?;
        let rows = wallets::Entity::find()
            .filter(wallets::Column::TenantId.eq(tenant_id.into_inner()))
            .filter(wallets::Column::CustomerId.eq(request.customer_id.into_inner()))
            .filter(wallets::Column::Status.eq(RecordStatus::Published))
            .filter(wallets::Column::WalletStatus.eq(sea_orm_active_enums::WalletStatus::Active))
            .order_by_asc(wallets::Column::CreatedAt)
            .all(tx.conn())
            .await
            .map_db()?;
        tx.commit().await.map_db()?;
        rows.into_iter().map(wallets::Model::into_domain).collect()
    }

    async fn complete(
        &self,
        tenant_id: TenantId,
        outcome: &SettlementOutcome,
    ) -> Result<(), WalletError> {
        let results = serde_json::to_value(&outcome.wallet_results)
            .map_err(|e| WalletError::Internal(format!("encode wallet results: {e}")))?;

        let tx = TenantTransaction::begin(&self.db, tenant_id, &self.config)
            .await
            .map_db()?;
        let row = wallet_settlements::Entity::find_by_id(outcome.settlement_id.into_inner())
            .filter(wallet_settlements::Column::TenantId.eq(tenant_id.into_inner()))
            .one(tx.conn())
            .await
            .map_db()?
            .ok_or_else(|| WalletError::not_found("settlement", outcome.settlement_id))?;

        let mut active: wallet_settlements::ActiveModel = row.into();
        active.amount_collected = Set(outcome.amount_collected);
        active.remaining_due = Set(outcome.remaining_due);
        active.settlement_status = Set(sea_orm_active_enums::SettlementStatus::Completed);
        active.wallet_results = Set(results);
        active.updated_at = Set(Utc::now().into());
        active.update(tx.conn()).await.map_db()?;
        tx.commit().await.map_db()?;
        Ok(())
    }
}

/// Why the pending record could not be inserted.
enum Lost {
    Duplicate,
    Other(WalletError),
}

impl From<sea_orm::DbErr> for Lost {
    fn from(err: sea_orm::DbErr) -> Self {
        if is_unique_violation(&err) {
            Self::Duplicate
        } else {
            Self::Other(classify(err))
        }
    }
}

fn replay(existing: wallet_settlements::Model) -> Result<SettlementOutcome, WalletError> {
    if existing.settlement_status == sea_orm_active_enums::SettlementStatus::Pending {
        return Err(WalletError::Conflict(format!(
            "settlement {} is still pending and needs reconciliation",
            existing.id
        )));
    }
    debug!(settlement_id = %existing.id, "Settlement replayed");
    existing.into_outcome()
}
