//! Prepaid wallet ledger.
//!
//! This module holds every rule of the wallet ledger that does not need a
//! database:
//! - Domain types for wallets, transactions and requests
//! - The error taxonomy shared by all layers
//! - Balance math and validation of the ledger executor
//! - Lifecycle rules (create, update, terminate, delete)
//! - Settlement ordering and tallying
//! - Auto top-up evaluation
//! - Credit expiry and low-balance alerts
//! - Reconciliation of balances against the log

pub mod auto_top_up;
pub mod balance_alert;
pub mod error;
pub mod expiry;
pub mod ledger;
pub mod lifecycle;
pub mod reconciliation;
pub mod settlement;
pub mod types;

#[cfg(test)]
mod ledger_props;
#[cfg(test)]
mod settlement_props;

pub use auto_top_up::{needs_top_up, top_up_key, AutoTopUpOutcome, AutoTopUpReport};
pub use balance_alert::{
    alert_transition, validate_balance_alert, BalanceAlertOutcome, BalanceAlertReport,
};
pub use error::WalletError;
pub use expiry::{
    expiry_key, expiry_operation, CreditExpiryOutcome, CreditExpiryReport, CreditLots,
};
pub use ledger::{check_replay, ensure_can_transact, validate_operation, BalanceChange};
pub use lifecycle::{
    ensure_can_delete, plan_termination, validate_create, validate_update, NewWallet,
};
pub use reconciliation::Reconciliation;
pub use settlement::{
    order_wallets, wallet_debit_key, SettlementOutcome, SettlementRequest, SettlementStatus,
    SettlementStrategy, SettlementTally, WalletResultStatus, WalletSettlementResult,
};
pub use types::{
    AlertState, AutoTopUpConfig, BalanceAlertConfig, CreateWalletInput, LedgerOperation,
    ReferenceType, TerminationResult, TransactionStatus, TransactionType, UpdateWalletInput,
    Wallet, WalletStatus, WalletTransaction, WalletType,
};
