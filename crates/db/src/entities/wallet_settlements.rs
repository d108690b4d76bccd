//! `SeaORM` Entity for wallet_settlements table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use tally_core::wallet::{SettlementOutcome, SettlementStrategy, WalletError, WalletSettlementResult};
use tally_shared::types::CurrencyCode;

use super::sea_orm_active_enums::SettlementStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "wallet_settlements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub invoice_id: String,
    pub currency: String,
    pub strategy: String,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub amount_due: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub amount_collected: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub remaining_due: Decimal,
    pub settlement_status: SettlementStatus,
    #[sea_orm(column_type = "JsonBinary")]
    pub wallet_results: Json,
    pub idempotency_key: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub created_by: Option<Uuid>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Converts the summary row into the settlement result.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if a stored column cannot be decoded.
    pub fn into_outcome(self) -> Result<SettlementOutcome, WalletError> {
        let id = self.id;
        let corrupt = move |what: &str, e: String| {
            WalletError::Internal(format!("settlement {id}: {what}: {e}"))
        };
        let currency = self
            .currency
            .parse::<CurrencyCode>()
            .map_err(|e| corrupt("currency", e.to_string()))?;
        let strategy = self
            .strategy
            .parse::<SettlementStrategy>()
            .map_err(|e| corrupt("strategy", e.to_string()))?;
        let wallet_results: Vec<WalletSettlementResult> =
            serde_json::from_value(self.wallet_results)
                .map_err(|e| corrupt("wallet_results", e.to_string()))?;

        Ok(SettlementOutcome {
            settlement_id: self.id.into(),
            invoice_id: self.invoice_id,
            customer_id: self.customer_id.into(),
            currency,
            strategy,
            amount_due: self.amount_due,
            amount_collected: self.amount_collected,
            remaining_due: self.remaining_due,
            status: self.settlement_status.into(),
            wallet_results,
        })
    }
}
