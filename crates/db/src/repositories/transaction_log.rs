//! Transaction log reads and balance reconciliation.

use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use serde::Deserialize;
use tally_core::wallet::{
    ReferenceType, Reconciliation, TransactionType, WalletError, WalletTransaction,
};
use tally_shared::config::LedgerConfig;
use tally_shared::types::{PageRequest, PageResponse, TenantId, WalletId, WalletTransactionId};
use tracing::{debug, warn};

use super::ledger::share_wallet;
use super::wallet::find_wallet;
use crate::entities::{
    sea_orm_active_enums::{WalletTransactionStatus, WalletTransactionType},
    wallet_transactions,
};
use crate::error::DbResultExt;
use crate::tenant::TenantTransaction;

/// Optional filters for listing transactions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionFilter {
    /// Only credits or only debits.
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    /// Only rows with this reference type.
    pub reference_type: Option<ReferenceType>,
    /// Only rows with this reference id.
    pub reference_id: Option<String>,
}

/// Read-only access to the append-only transaction log.
#[derive(Debug, Clone)]
pub struct TransactionLogRepository {
    db: DatabaseConnection,
    config: LedgerConfig,
}

impl TransactionLogRepository {
    /// Creates a new transaction log repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, config: LedgerConfig) -> Self {
        Self { db, config }
    }

    /// Lists a wallet's transactions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the wallet does not exist for the tenant.
    pub async fn list(
        &self,
        tenant_id: TenantId,
        wallet_id: WalletId,
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> Result<PageResponse<WalletTransaction>, WalletError> {
        let page = page.normalized();
        let tx = TenantTransaction::begin(&self.db, tenant_id, &self.config)
            .await
            .map_db()?;
        find_wallet(tx.conn(), tenant_id, wallet_id).await?;

        let mut query = wallet_transactions::Entity::find()
            .filter(wallet_transactions::Column::TenantId.eq(tenant_id.into_inner()))
            .filter(wallet_transactions::Column::WalletId.eq(wallet_id.into_inner()));
        if let Some(kind) = filter.transaction_type {
            query = query.filter(
                wallet_transactions::Column::TransactionType.eq(WalletTransactionType::from(kind)),
            );
        }
        if let Some(reference_type) = filter.reference_type {
            query = query.filter(wallet_transactions::Column::ReferenceType.eq(reference_type.as_str()));
        }
        if let Some(reference_id) = &filter.reference_id {
            query = query.filter(wallet_transactions::Column::ReferenceId.eq(reference_id.as_str()));
        }

        let total = query.clone().count(tx.conn()).await.map_db()?;
        let rows = query
            .order_by_desc(wallet_transactions::Column::CreatedAt)
            .order_by_desc(wallet_transactions::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(tx.conn())
            .await
            .map_db()?;
        tx.commit().await.map_db()?;

        debug!(
            tenant_id = %tenant_id,
            wallet_id = %wallet_id,
            total,
            returned = rows.len(),
            "Listed wallet transactions"
        );

        let data = rows
            .into_iter()
            .map(wallet_transactions::Model::into_domain)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PageResponse::new(data, page.page, page.per_page, total))
    }

    /// Fetches one transaction.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the transaction does not exist for the tenant.
    pub async fn get(
        &self,
        tenant_id: TenantId,
        transaction_id: WalletTransactionId,
    ) -> Result<WalletTransaction, WalletError> {
        let tx = TenantTransaction::begin(&self.db, tenant_id, &self.config)
            .await
            .map_db()?;
        let row = wallet_transactions::Entity::find_by_id(transaction_id.into_inner())
            .filter(wallet_transactions::Column::TenantId.eq(tenant_id.into_inner()))
            .one(tx.conn())
            .await
            .map_db()?
            .ok_or_else(|| WalletError::not_found("transaction", transaction_id))?;
        tx.commit().await.map_db()?;
        row.into_domain()
    }

    /// Recomputes a wallet's balance from its completed transactions and
    /// compares it with the stored balance. Read-only.
    ///
    /// The wallet row is share-locked before the log is summed, so an
    /// operation committing in between cannot show up as drift.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the wallet does not exist for the tenant.
    pub async fn reconcile(
        &self,
        tenant_id: TenantId,
        wallet_id: WalletId,
    ) -> Result<Reconciliation, WalletError> {
        let tx = TenantTransaction::begin(&self.db, tenant_id, &self.config)
            .await
            .map_db()?;
        let wallet = share_wallet(tx.conn(), tenant_id, wallet_id).await?;

        let entries: Vec<(WalletTransactionType, rust_decimal::Decimal)> =
            wallet_transactions::Entity::find()
                .select_only()
                .column(wallet_transactions::Column::TransactionType)
                .column(wallet_transactions::Column::Amount)
                .filter(wallet_transactions::Column::TenantId.eq(tenant_id.into_inner()))
                .filter(wallet_transactions::Column::WalletId.eq(wallet_id.into_inner()))
                .filter(
                    wallet_transactions::Column::TransactionStatus
                        .eq(WalletTransactionStatus::Completed),
                )
                .into_tuple()
                .all(tx.conn())
                .await
                .map_db()?;
        tx.commit().await.map_db()?;

        let reconciliation = Reconciliation::compute(
            wallet_id,
            wallet.balance,
            entries.into_iter().map(|(kind, amount)| (kind.into(), amount)),
        );
        if !reconciliation.is_consistent {
            warn!(
                tenant_id = %tenant_id,
                wallet_id = %wallet_id,
                persisted = %reconciliation.persisted,
                computed = %reconciliation.computed,
                drift = %reconciliation.drift,
                "Wallet balance drift detected"
            );
        }
        Ok(reconciliation)
    }
}
