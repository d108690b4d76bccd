//! `SeaORM` Entity for wallets table.

use chrono::Utc;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use tally_core::wallet::{self as domain, WalletError};
use tally_shared::types::CurrencyCode;

use super::sea_orm_active_enums::{RecordStatus, WalletAlertState, WalletStatus, WalletType};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "wallets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub currency: String,
    pub wallet_type: WalletType,
    pub wallet_status: WalletStatus,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub balance: Decimal,
    pub auto_top_up_enabled: bool,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub auto_top_up_threshold: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub auto_top_up_amount: Decimal,
    pub alert_enabled: bool,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub alert_threshold: Decimal,
    pub alert_state: WalletAlertState,
    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: Json,
    pub status: RecordStatus,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::wallet_transactions::Entity")]
    WalletTransactions,
}

impl Related<super::wallet_transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WalletTransactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Converts the row into the domain wallet.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the stored currency is malformed.
    pub fn into_domain(self) -> Result<domain::Wallet, WalletError> {
        let currency = self
            .currency
            .parse::<CurrencyCode>()
            .map_err(|e| WalletError::Internal(format!("wallet {}: {e}", self.id)))?;
        Ok(domain::Wallet {
            id: self.id.into(),
            tenant_id: self.tenant_id.into(),
            customer_id: self.customer_id.into(),
            name: self.name,
            description: self.description,
            currency,
            wallet_type: self.wallet_type.into(),
            wallet_status: self.wallet_status.into(),
            balance: self.balance,
            auto_top_up: domain::AutoTopUpConfig {
                enabled: self.auto_top_up_enabled,
                threshold: self.auto_top_up_threshold,
                top_up_amount: self.auto_top_up_amount,
            },
            balance_alert: domain::BalanceAlertConfig {
                enabled: self.alert_enabled,
                threshold: self.alert_threshold,
            },
            alert_state: self.alert_state.into(),
            metadata: self.metadata,
            created_at: self.created_at.with_timezone(&Utc),
            updated_at: self.updated_at.with_timezone(&Utc),
            created_by: self.created_by.map(Into::into),
            updated_by: self.updated_by.map(Into::into),
        })
    }
}
