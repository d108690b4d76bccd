//! `SeaORM` active enums mirroring the Postgres enum types.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use tally_core::wallet as domain;

/// `wallet_status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "wallet_status")]
pub enum WalletStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "closed")]
    Closed,
}

/// `wallet_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "wallet_type")]
pub enum WalletType {
    #[sea_orm(string_value = "prepaid")]
    Prepaid,
    #[sea_orm(string_value = "promotional")]
    Promotional,
}

/// `wallet_transaction_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "wallet_transaction_type")]
pub enum WalletTransactionType {
    #[sea_orm(string_value = "credit")]
    Credit,
    #[sea_orm(string_value = "debit")]
    Debit,
}

/// `wallet_transaction_status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "wallet_transaction_status")]
pub enum WalletTransactionStatus {
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// `record_status` column; `deleted` marks a soft delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "record_status")]
pub enum RecordStatus {
    #[sea_orm(string_value = "published")]
    Published,
    #[sea_orm(string_value = "deleted")]
    Deleted,
}

/// `settlement_status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "settlement_status")]
pub enum SettlementStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "completed")]
    Completed,
}

/// `wallet_alert_state` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "wallet_alert_state")]
pub enum WalletAlertState {
    #[sea_orm(string_value = "ok")]
    Ok,
    #[sea_orm(string_value = "in_alarm")]
    InAlarm,
}

/// Implements `From` in both directions between a column enum and its domain twin.
macro_rules! domain_conversions {
    ($db:ident => $dom:ident { $($variant:ident),+ }) => {
        impl From<$db> for domain::$dom {
            fn from(value: $db) -> Self {
                match value {
                    $($db::$variant => Self::$variant,)+
                }
            }
        }

        impl From<domain::$dom> for $db {
            fn from(value: domain::$dom) -> Self {
                match value {
                    $(domain::$dom::$variant => Self::$variant,)+
                }
            }
        }
    };
}

domain_conversions!(WalletStatus => WalletStatus { Active, Closed });
domain_conversions!(WalletType => WalletType { Prepaid, Promotional });
domain_conversions!(WalletTransactionType => TransactionType { Credit, Debit });
domain_conversions!(WalletTransactionStatus => TransactionStatus { Completed, Failed });
domain_conversions!(SettlementStatus => SettlementStatus { Pending, Completed });
domain_conversions!(WalletAlertState => AlertState { Ok, InAlarm });
