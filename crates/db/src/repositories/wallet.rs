//! Wallet repository: creation, configuration, termination and balance reads.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Serialize;
use tally_core::wallet::{
    ensure_can_delete, plan_termination, validate_create, validate_update, CreateWalletInput,
    LedgerOperation, ReferenceType, TerminationResult, UpdateWalletInput, Wallet, WalletError,
    WalletStatus,
};
use tally_shared::config::LedgerConfig;
use tally_shared::types::{CurrencyCode, CustomerId, TenantId, UserId, WalletId};
use tracing::info;

use super::ledger::{apply_locked, lock_wallet, log_committed};
use crate::entities::{
    sea_orm_active_enums::{self, RecordStatus},
    wallets,
};
use crate::error::{is_unique_violation, DbResultExt};
use crate::tenant::TenantTransaction;

/// Persisted balance of a wallet.
#[derive(Debug, Clone, Serialize)]
pub struct WalletBalance {
    /// Wallet queried.
    pub wallet_id: WalletId,
    /// Wallet currency.
    pub currency: CurrencyCode,
    /// Stored balance.
    pub balance: Decimal,
    /// Whether the wallet still accepts operations.
    pub wallet_status: WalletStatus,
}

/// Repository for wallet lifecycle operations.
#[derive(Debug, Clone)]
pub struct WalletRepository {
    db: DatabaseConnection,
    config: LedgerConfig,
}

impl WalletRepository {
    /// Creates a new wallet repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, config: LedgerConfig) -> Self {
        Self { db, config }
    }

    /// Creates an active wallet with zero balance, then applies the initial
    /// credit in the same transaction when one is given.
    ///
    /// # Errors
    ///
    /// - `Validation` for invalid input
    /// - `Conflict` if the customer already has an active wallet of this
    ///   currency and type
    pub async fn create(
        &self,
        tenant_id: TenantId,
        input: CreateWalletInput,
        actor: Option<UserId>,
    ) -> Result<Wallet, WalletError> {
        let new = validate_create(input)?;
        let wallet_id = WalletId::new();
        let now = Utc::now().into();
        let actor_id = actor.map(UserId::into_inner);

        let tx = TenantTransaction::begin(&self.db, tenant_id, &self.config)
            .await
            .map_db()?;

        let row = wallets::ActiveModel {
            id: Set(wallet_id.into_inner()),
            tenant_id: Set(tenant_id.into_inner()),
            customer_id: Set(new.customer_id.into_inner()),
            name: Set(new.name),
            description: Set(new.description),
            currency: Set(new.currency.as_str().to_string()),
            wallet_type: Set(new.wallet_type.into()),
            wallet_status: Set(sea_orm_active_enums::WalletStatus::Active),
            balance: Set(Decimal::ZERO),
            auto_top_up_enabled: Set(new.auto_top_up.enabled),
            auto_top_up_threshold: Set(new.auto_top_up.threshold),
            auto_top_up_amount: Set(new.auto_top_up.top_up_amount),
            alert_enabled: Set(new.balance_alert.enabled),
            alert_threshold: Set(new.balance_alert.threshold),
            alert_state: Set(sea_orm_active_enums::WalletAlertState::Ok),
            metadata: Set(new.metadata),
            status: Set(RecordStatus::Published),
            created_at: Set(now),
            updated_at: Set(now),
            created_by: Set(actor_id),
            updated_by: Set(actor_id),
        };

        let inserted = match row.insert(tx.conn()).await {
            Ok(model) => model,
            Err(e) if is_unique_violation(&e) => {
                return Err(WalletError::Conflict(format!(
                    "customer {} already has an active {} {} wallet",
                    new.customer_id, new.wallet_type, new.currency
                )));
            }
            Err(e) => return Err(crate::error::classify(e)),
        };

        let (wallet, initial) = match new.initial_credit {
            Some(amount) => {
                let op = LedgerOperation::credit(
                    wallet_id,
                    amount,
                    ReferenceType::Topup,
                    wallet_id.to_string(),
                )
                .with_description("Initial credit")
                .with_idempotency_key(format!("initial_credit:{wallet_id}"))
                .with_actor(actor);
                let locked = lock_wallet(tx.conn(), tenant_id, wallet_id).await?;
                let applied = apply_locked(tx.conn(), locked, &op).await?;
                (applied.wallet, Some(applied.transaction))
            }
            None => (inserted.into_domain()?, None),
        };

        tx.commit().await.map_db()?;

        info!(
            tenant_id = %tenant_id,
            wallet_id = %wallet.id,
            customer_id = %wallet.customer_id,
            currency = %wallet.currency,
            wallet_type = %wallet.wallet_type,
            "Wallet created"
        );
        if let Some(transaction) = &initial {
            log_committed(tenant_id, transaction);
        }
        Ok(wallet)
    }

    /// Fetches a wallet.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the wallet does not exist for the tenant.
    pub async fn get(&self, tenant_id: TenantId, wallet_id: WalletId) -> Result<Wallet, WalletError> {
        let tx = TenantTransaction::begin(&self.db, tenant_id, &self.config)
            .await
            .map_db()?;
        let model = find_wallet(tx.conn(), tenant_id, wallet_id).await?;
        tx.commit().await.map_db()?;
        model.into_domain()
    }

    /// Lists a customer's wallets, oldest first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_by_customer(
        &self,
        tenant_id: TenantId,
        customer_id: CustomerId,
        wallet_status: Option<WalletStatus>,
    ) -> Result<Vec<Wallet>, WalletError> {
        let tx = TenantTransaction::begin(&self.db, tenant_id, &self.config)
            .await
            .map_db()?;

        let mut query = wallets::Entity::find()
            .filter(wallets::Column::TenantId.eq(tenant_id.into_inner()))
            .filter(wallets::Column::CustomerId.eq(customer_id.into_inner()))
            .filter(wallets::Column::Status.eq(RecordStatus::Published));
        if let Some(status) = wallet_status {
            query = query.filter(
                wallets::Column::WalletStatus.eq(sea_orm_active_enums::WalletStatus::from(status)),
            );
        }

        let models = query
            .order_by_asc(wallets::Column::CreatedAt)
            .order_by_asc(wallets::Column::Id)
            .all(tx.conn())
            .await
            .map_db()?;
        tx.commit().await.map_db()?;

        models.into_iter().map(wallets::Model::into_domain).collect()
    }

    /// Updates configuration fields. Never touches the balance and takes no
    /// row lock.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the wallet does not exist
    /// - `Conflict` if the wallet is closed
    /// - `Validation` for invalid fields or an empty update
    pub async fn update(
        &self,
        tenant_id: TenantId,
        wallet_id: WalletId,
        input: UpdateWalletInput,
        actor: Option<UserId>,
    ) -> Result<Wallet, WalletError> {
        let tx = TenantTransaction::begin(&self.db, tenant_id, &self.config)
            .await
            .map_db()?;
        let model = find_wallet(tx.conn(), tenant_id, wallet_id).await?;
        validate_update(wallet_id, model.wallet_status.into(), &input)?;

        let mut active: wallets::ActiveModel = model.into();
        if let Some(name) = input.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        if let Some(config) = input.auto_top_up {
            active.auto_top_up_enabled = Set(config.enabled);
            active.auto_top_up_threshold = Set(config.threshold);
            active.auto_top_up_amount = Set(config.top_up_amount);
        }
        if let Some(config) = input.balance_alert {
            active.alert_enabled = Set(config.enabled);
            active.alert_threshold = Set(config.threshold);
            active.alert_state = Set(sea_orm_active_enums::WalletAlertState::Ok);
        }
        if let Some(metadata) = input.metadata {
            active.metadata = Set(metadata);
        }
        active.updated_at = Set(Utc::now().into());
        active.updated_by = Set(actor.map(UserId::into_inner));

        let updated = active.update(tx.conn()).await.map_db()?;
        tx.commit().await.map_db()?;

        info!(tenant_id = %tenant_id, wallet_id = %wallet_id, "Wallet updated");
        updated.into_domain()
    }

    /// Terminates a wallet: zeroes a positive balance with a final
    /// `termination` debit and closes it, in one transaction.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the wallet does not exist
    /// - `Conflict` if the wallet is already closed
    /// - `Transient` if the row lock cannot be acquired in time
    pub async fn terminate(
        &self,
        tenant_id: TenantId,
        wallet_id: WalletId,
        actor: Option<UserId>,
    ) -> Result<TerminationResult, WalletError> {
        let tx = TenantTransaction::begin(&self.db, tenant_id, &self.config)
            .await
            .map_db()?;
        let mut locked = lock_wallet(tx.conn(), tenant_id, wallet_id).await?;

        let final_debit = match plan_termination(wallet_id, locked.wallet_status.into(), locked.balance)? {
            Some(amount) => {
                let op = LedgerOperation::debit(
                    wallet_id,
                    amount,
                    ReferenceType::Termination,
                    wallet_id.to_string(),
                )
                .with_description("Wallet termination")
                .with_idempotency_key(format!("termination:{wallet_id}"))
                .with_actor(actor);
                let applied = apply_locked(tx.conn(), locked, &op).await?;
                locked = find_wallet(tx.conn(), tenant_id, wallet_id).await?;
                Some(applied.transaction)
            }
            None => None,
        };

        let mut active: wallets::ActiveModel = locked.into();
        active.wallet_status = Set(sea_orm_active_enums::WalletStatus::Closed);
        active.updated_at = Set(Utc::now().into());
        active.updated_by = Set(actor.map(UserId::into_inner));
        let closed = active.update(tx.conn()).await.map_db()?;
        tx.commit().await.map_db()?;

        if let Some(transaction) = &final_debit {
            log_committed(tenant_id, transaction);
        }
        info!(tenant_id = %tenant_id, wallet_id = %wallet_id, "Wallet terminated");

        Ok(TerminationResult {
            wallet: closed.into_domain()?,
            final_debit,
        })
    }

    /// Soft-deletes a closed wallet with zero balance.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the wallet does not exist
    /// - `Conflict` unless the wallet is closed and empty
    pub async fn soft_delete(
        &self,
        tenant_id: TenantId,
        wallet_id: WalletId,
        actor: Option<UserId>,
    ) -> Result<(), WalletError> {
        let tx = TenantTransaction::begin(&self.db, tenant_id, &self.config)
            .await
            .map_db()?;
        let locked = lock_wallet(tx.conn(), tenant_id, wallet_id).await?;
        ensure_can_delete(wallet_id, locked.wallet_status.into(), locked.balance)?;

        let mut active: wallets::ActiveModel = locked.into();
        active.status = Set(RecordStatus::Deleted);
        active.updated_at = Set(Utc::now().into());
        active.updated_by = Set(actor.map(UserId::into_inner));
        active.update(tx.conn()).await.map_db()?;
        tx.commit().await.map_db()?;

        info!(tenant_id = %tenant_id, wallet_id = %wallet_id, "Wallet deleted");
        Ok(())
    }

    /// Returns the persisted balance; the transaction log is not re-summed.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the wallet does not exist for the tenant.
    pub async fn get_balance(
        &self,
        tenant_id: TenantId,
        wallet_id: WalletId,
    ) -> Result<WalletBalance, WalletError> {
        let wallet = self.get(tenant_id, wallet_id).await?;
        Ok(WalletBalance {
            wallet_id: wallet.id,
            currency: wallet.currency,
            balance: wallet.balance,
            wallet_status: wallet.wallet_status,
        })
    }
}

/// Reads a published wallet without locking it.
pub(crate) async fn find_wallet<C: ConnectionTrait>(
    conn: &C,
    tenant_id: TenantId,
    wallet_id: WalletId,
) -> Result<wallets::Model, WalletError> {
    wallets::Entity::find_by_id(wallet_id.into_inner())
        .filter(wallets::Column::TenantId.eq(tenant_id.into_inner()))
        .filter(wallets::Column::Status.eq(RecordStatus::Published))
        .one(conn)
        .await
        .map_db()?
        .ok_or_else(|| WalletError::wallet_not_found(wallet_id))
}
