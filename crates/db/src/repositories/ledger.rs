//! Ledger repository: the atomic credit/debit primitive.
//!
//! Every balance mutation goes through [`apply_locked`] while the caller holds
//! the wallet row lock, so concurrent operations on one wallet linearise on
//! lock order and the wallet balance always equals the sum of its completed
//! transactions.

use std::time::Duration;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QuerySelect, Set,
};
use tally_core::wallet::{
    check_replay, ensure_can_transact, validate_operation, BalanceChange, LedgerOperation,
    TransactionStatus, TransactionType, Wallet, WalletError, WalletTransaction,
};
use tally_shared::config::LedgerConfig;
use tally_shared::types::{TenantId, WalletId, WalletTransactionId};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::entities::{
    sea_orm_active_enums::{RecordStatus, WalletTransactionStatus},
    wallet_transactions, wallets,
};
use crate::error::DbResultExt;
use crate::tenant::TenantTransaction;

/// Upper bound for a single backoff sleep.
const RETRY_MAX_DELAY: Duration = Duration::from_secs(1);

/// Result of a committed ledger operation.
#[derive(Debug, Clone)]
pub struct Applied {
    /// Wallet state after the operation.
    pub wallet: Wallet,
    /// Transaction row written, or the one replayed.
    pub transaction: WalletTransaction,
    /// True when an earlier transaction with the same idempotency key was returned.
    pub replayed: bool,
}

/// Repository executing credits and debits.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    db: DatabaseConnection,
    config: LedgerConfig,
}

impl LedgerRepository {
    /// Creates a new ledger repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, config: LedgerConfig) -> Self {
        Self { db, config }
    }

    /// Applies one credit or debit atomically.
    ///
    /// # Errors
    ///
    /// - `Validation` for a bad amount, reference or key
    /// - `NotFound` if the wallet does not exist for the tenant
    /// - `Conflict` for a closed wallet or a reused idempotency key
    /// - `InsufficientBalance` if a debit exceeds the balance
    /// - `Transient` on lock timeout, serialization failure or lost connection
    pub async fn apply(
        &self,
        tenant_id: TenantId,
        op: LedgerOperation,
    ) -> Result<Applied, WalletError> {
        validate_operation(&op)?;

        let tx = TenantTransaction::begin(&self.db, tenant_id, &self.config)
            .await
            .map_db()?;
        let wallet = lock_wallet(tx.conn(), tenant_id, op.wallet_id).await?;
        let applied = apply_locked(tx.conn(), wallet, &op).await?;
        tx.commit().await.map_db()?;

        if !applied.replayed {
            log_committed(tenant_id, &applied.transaction);
        }
        Ok(applied)
    }

    /// Credits a wallet.
    ///
    /// # Errors
    ///
    /// `Validation` if `op` is not a credit, otherwise as [`Self::apply`].
    pub async fn credit(
        &self,
        tenant_id: TenantId,
        op: LedgerOperation,
    ) -> Result<Applied, WalletError> {
        expect_type(&op, TransactionType::Credit)?;
        self.apply(tenant_id, op).await
    }

    /// Debits a wallet.
    ///
    /// # Errors
    ///
    /// `Validation` if `op` is not a debit, otherwise as [`Self::apply`].
    pub async fn debit(
        &self,
        tenant_id: TenantId,
        op: LedgerOperation,
    ) -> Result<Applied, WalletError> {
        expect_type(&op, TransactionType::Debit)?;
        self.apply(tenant_id, op).await
    }

    /// Applies an operation, retrying the whole transaction on transient errors.
    ///
    /// Business errors are returned on the first attempt. An operation without
    /// an idempotency key gets a generated one before the first attempt, so a
    /// commit whose acknowledgement was lost is replayed rather than applied
    /// twice.
    ///
    /// # Errors
    ///
    /// As [`Self::apply`]; `Transient` only once retries are exhausted.
    pub async fn apply_with_retry(
        &self,
        tenant_id: TenantId,
        op: LedgerOperation,
    ) -> Result<Applied, WalletError> {
        let op = with_retry_key(op);
        let retry_strategy = ExponentialBackoff::from_millis(2)
            .factor(self.config.retry_base_delay_ms)
            .max_delay(RETRY_MAX_DELAY)
            .take(self.config.max_retries)
            .map(jitter);

        Retry::start(retry_strategy, || async {
            let result = self.apply(tenant_id, op.clone()).await;
            match &result {
                Err(e) if e.is_retryable() => {
                    warn!(
                        tenant_id = %tenant_id,
                        wallet_id = %op.wallet_id,
                        error = %e,
                        "Transient ledger failure - will retry"
                    );
                    Err(result)
                }
                _ => Ok(result),
            }
        })
        .await
        .unwrap_or_else(|e| e)
    }

    /// Credits a wallet with retry on transient errors.
    ///
    /// # Errors
    ///
    /// As [`Self::apply_with_retry`].
    pub async fn credit_with_retry(
        &self,
        tenant_id: TenantId,
        op: LedgerOperation,
    ) -> Result<Applied, WalletError> {
        expect_type(&op, TransactionType::Credit)?;
        self.apply_with_retry(tenant_id, op).await
    }

    /// Debits a wallet with retry on transient errors.
    ///
    /// # Errors
    ///
    /// As [`Self::apply_with_retry`].
    pub async fn debit_with_retry(
        &self,
        tenant_id: TenantId,
        op: LedgerOperation,
    ) -> Result<Applied, WalletError> {
        expect_type(&op, TransactionType::Debit)?;
        self.apply_with_retry(tenant_id, op).await
    }
}

fn expect_type(op: &LedgerOperation, expected: TransactionType) -> Result<(), WalletError> {
    if op.transaction_type == expected {
        Ok(())
    } else {
        Err(WalletError::Validation(format!(
            "expected a {expected} operation, got {}",
            op.transaction_type
        )))
    }
}

/// Gives a keyless operation a fresh `retry:` key shared by all its attempts.
fn with_retry_key(op: LedgerOperation) -> LedgerOperation {
    if op.idempotency_key.is_some() {
        return op;
    }
    let key = format!("retry:{}", Uuid::now_v7());
    op.with_idempotency_key(key)
}

pub(crate) fn log_committed(tenant_id: TenantId, tx: &WalletTransaction) {
    info!(
        tenant_id = %tenant_id,
        wallet_id = %tx.wallet_id,
        transaction_id = %tx.id,
        transaction_type = %tx.transaction_type,
        amount = %tx.amount,
        balance_before = %tx.balance_before,
        balance_after = %tx.balance_after,
        reference_type = %tx.reference_type,
        "Ledger operation committed"
    );
}

/// Locks a published wallet row with `SELECT ... FOR UPDATE`.
///
/// # Errors
///
/// `NotFound` if no published wallet exists for the tenant; `Transient` if
/// the lock wait times out.
pub(crate) async fn lock_wallet(
    conn: &DatabaseTransaction,
    tenant_id: TenantId,
    wallet_id: WalletId,
) -> Result<wallets::Model, WalletError> {
    let wallet = wallets::Entity::find_by_id(wallet_id.into_inner())
        .filter(wallets::Column::TenantId.eq(tenant_id.into_inner()))
        .filter(wallets::Column::Status.eq(RecordStatus::Published))
        .lock_exclusive()
        .one(conn)
        .await
        .map_db()?
        .ok_or_else(|| WalletError::wallet_not_found(wallet_id))?;

    debug!(tenant_id = %tenant_id, wallet_id = %wallet_id, "Wallet row locked");
    Ok(wallet)
}

/// Takes a `FOR SHARE` lock on a published wallet row.
///
/// Writers lock the row exclusively before touching the log, so while the
/// share lock is held the balance and the log cannot move apart.
pub(crate) async fn share_wallet(
    conn: &DatabaseTransaction,
    tenant_id: TenantId,
    wallet_id: WalletId,
) -> Result<wallets::Model, WalletError> {
    wallets::Entity::find_by_id(wallet_id.into_inner())
        .filter(wallets::Column::TenantId.eq(tenant_id.into_inner()))
        .filter(wallets::Column::Status.eq(RecordStatus::Published))
        .lock_shared()
        .one(conn)
        .await
        .map_db()?
        .ok_or_else(|| WalletError::wallet_not_found(wallet_id))
}

async fn find_by_idempotency_key(
    conn: &DatabaseTransaction,
    wallet: &wallets::Model,
    key: &str,
) -> Result<Option<wallet_transactions::Model>, WalletError> {
    wallet_transactions::Entity::find()
        .filter(wallet_transactions::Column::TenantId.eq(wallet.tenant_id))
        .filter(wallet_transactions::Column::WalletId.eq(wallet.id))
        .filter(wallet_transactions::Column::IdempotencyKey.eq(key))
        .one(conn)
        .await
        .map_db()
}

/// Applies `op` to a wallet whose row lock is held by `conn`.
///
/// Replays are detected before the status check, so repeating an operation
/// that preceded termination still returns its original result.
///
/// # Errors
///
/// `Conflict` for a closed wallet or a mismatched replay,
/// `InsufficientBalance` for an overdraft, and classified database errors.
pub(crate) async fn apply_locked(
    conn: &DatabaseTransaction,
    wallet: wallets::Model,
    op: &LedgerOperation,
) -> Result<Applied, WalletError> {
    if let Some(key) = op.idempotency_key.as_deref() {
        if let Some(existing) = find_by_idempotency_key(conn, &wallet, key).await? {
            let transaction = existing.into_domain()?;
            check_replay(&transaction, op)?;
            debug!(
                wallet_id = %op.wallet_id,
                transaction_id = %transaction.id,
                "Idempotent replay"
            );
            return Ok(Applied {
                wallet: wallet.into_domain()?,
                transaction,
                replayed: true,
            });
        }
    }

    ensure_can_transact(op.wallet_id, wallet.wallet_status.into())?;

    let change = match BalanceChange::compute(
        op.wallet_id,
        wallet.balance,
        op.transaction_type,
        op.amount,
    ) {
        Ok(change) => change,
        Err(e) => {
            warn!(
                wallet_id = %op.wallet_id,
                transaction_type = %op.transaction_type,
                amount = %op.amount,
                balance = %wallet.balance,
                error = %e,
                "Ledger operation rejected"
            );
            return Err(e);
        }
    };

    let now = Utc::now().into();
    let actor = op.actor.map(|a| a.into_inner());
    let tenant_id = wallet.tenant_id;
    let currency = wallet.currency.clone();

    let mut active: wallets::ActiveModel = wallet.into();
    active.balance = Set(change.balance_after);
    active.updated_at = Set(now);
    active.updated_by = Set(actor);
    let wallet = active.update(conn).await.map_db()?;

    let row = wallet_transactions::ActiveModel {
        id: Set(WalletTransactionId::new().into_inner()),
        tenant_id: Set(tenant_id),
        wallet_id: Set(op.wallet_id.into_inner()),
        transaction_type: Set(op.transaction_type.into()),
        amount: Set(change.amount),
        currency: Set(currency),
        balance_before: Set(change.balance_before),
        balance_after: Set(change.balance_after),
        transaction_status: Set(WalletTransactionStatus::from(TransactionStatus::Completed)),
        reference_type: Set(op.reference_type.as_str().to_string()),
        reference_id: Set(op.reference_id.clone()),
        description: Set(op.description.clone()),
        metadata: Set(op
            .metadata
            .clone()
            .unwrap_or_else(|| serde_json::json!({}))),
        idempotency_key: Set(op.idempotency_key.clone()),
        expires_at: Set(op.expires_at.map(Into::into)),
        status: Set(RecordStatus::Published),
        created_at: Set(now),
        updated_at: Set(now),
        created_by: Set(actor),
        updated_by: Set(actor),
    };
    let transaction = row.insert(conn).await.map_db()?;

    Ok(Applied {
        wallet: wallet.into_domain()?,
        transaction: transaction.into_domain()?,
        replayed: false,
    })
}
