//! `SeaORM` Entity for wallet_transactions table.
//!
//! Rows are append-only; a database trigger rejects UPDATE and DELETE.

use chrono::Utc;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use tally_core::wallet::{self as domain, WalletError};
use tally_shared::types::CurrencyCode;

use super::sea_orm_active_enums::{RecordStatus, WalletTransactionStatus, WalletTransactionType};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "wallet_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub wallet_id: Uuid,
    pub transaction_type: WalletTransactionType,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub amount: Decimal,
    pub currency: String,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub balance_before: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub balance_after: Decimal,
    pub transaction_status: WalletTransactionStatus,
    pub reference_type: String,
    pub reference_id: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: Json,
    pub idempotency_key: Option<String>,
    pub expires_at: Option<DateTimeWithTimeZone>,
    pub status: RecordStatus,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::wallets::Entity",
        from = "Column::WalletId",
        to = "super::wallets::Column::Id"
    )]
    Wallets,
}

impl Related<super::wallets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Wallets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Converts the row into the domain transaction.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if a stored currency or reference type is unknown.
    pub fn into_domain(self) -> Result<domain::WalletTransaction, WalletError> {
        let corrupt = |what: &str, e: &dyn std::fmt::Display| {
            WalletError::Internal(format!("transaction {}: {what}: {e}", self.id))
        };
        let currency = self
            .currency
            .parse::<CurrencyCode>()
            .map_err(|e| corrupt("currency", &e))?;
        let reference_type = self
            .reference_type
            .parse::<domain::ReferenceType>()
            .map_err(|e| corrupt("reference_type", &e))?;
        Ok(domain::WalletTransaction {
            id: self.id.into(),
            tenant_id: self.tenant_id.into(),
            wallet_id: self.wallet_id.into(),
            transaction_type: self.transaction_type.into(),
            amount: self.amount,
            currency,
            balance_before: self.balance_before,
            balance_after: self.balance_after,
            transaction_status: self.transaction_status.into(),
            reference_type,
            reference_id: self.reference_id,
            description: self.description,
            metadata: self.metadata,
            idempotency_key: self.idempotency_key,
            expires_at: self.expires_at.map(|at| at.with_timezone(&Utc)),
            created_at: self.created_at.with_timezone(&Utc),
            created_by: self.created_by.map(Into::into),
        })
    }
}
