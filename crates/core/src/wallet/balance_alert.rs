//! Low-balance alerts.
//!
//! A wallet with alerts enabled is `in_alarm` once its balance is at or below
//! the threshold and goes back to `ok` when it climbs above it. The check only
//! reports transitions, so a wallet that stays low alerts once.

use rust_decimal::Decimal;
use serde::Serialize;
use tally_shared::types::WalletId;

use super::error::WalletError;
use super::ledger::validate_limit;
use super::types::{AlertState, BalanceAlertConfig, Wallet};

/// Validates alert settings.
///
/// # Errors
///
/// Returns `Validation` if the threshold is negative, too large or too precise.
pub fn validate_balance_alert(config: &BalanceAlertConfig) -> Result<(), WalletError> {
    validate_limit("alert threshold", config.threshold)
}

/// Returns the state the wallet should move to, or `None` if it stays put.
///
/// Closed wallets and wallets with alerts disabled never transition.
#[must_use]
pub fn alert_transition(wallet: &Wallet) -> Option<AlertState> {
    let config = &wallet.balance_alert;
    if !wallet.is_active() || !config.enabled {
        return None;
    }
    let below = wallet.balance <= config.threshold;
    match (wallet.alert_state, below) {
        (AlertState::Ok, true) => Some(AlertState::InAlarm),
        (AlertState::InAlarm, false) => Some(AlertState::Ok),
        _ => None,
    }
}

/// What the alert check did for one wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BalanceAlertOutcome {
    /// Balance dropped to the threshold.
    Triggered {
        /// Wallet that entered the alarm state.
        wallet_id: WalletId,
        /// Balance seen under lock.
        balance: Decimal,
        /// Configured threshold.
        threshold: Decimal,
    },
    /// Balance climbed back above the threshold.
    Recovered {
        /// Wallet that left the alarm state.
        wallet_id: WalletId,
        /// Balance seen under lock.
        balance: Decimal,
    },
    /// The state could not be recorded.
    Failed {
        /// Wallet that failed.
        wallet_id: WalletId,
        /// Error code of the failure.
        error_code: String,
        /// Error message of the failure.
        error_message: String,
    },
}

impl BalanceAlertOutcome {
    /// Builds a `Failed` outcome from an error.
    #[must_use]
    pub fn failed(wallet_id: WalletId, error: &WalletError) -> Self {
        Self::Failed {
            wallet_id,
            error_code: error.error_code().to_string(),
            error_message: error.to_string(),
        }
    }
}

/// Summary of one alert check.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BalanceAlertReport {
    /// Wallets with alerts enabled that were looked at.
    pub checked: usize,
    /// Wallets that entered the alarm state.
    pub triggered: usize,
    /// Wallets that recovered.
    pub recovered: usize,
    /// Wallets whose state could not be recorded.
    pub failed: usize,
    /// Transitions and failures; unchanged wallets are only counted.
    pub outcomes: Vec<BalanceAlertOutcome>,
}

impl BalanceAlertReport {
    /// Counts a wallet whose state did not change.
    pub fn unchanged(&mut self) {
        self.checked += 1;
    }

    /// Adds an outcome and updates the counters.
    pub fn push(&mut self, outcome: BalanceAlertOutcome) {
        self.checked += 1;
        match outcome {
            BalanceAlertOutcome::Triggered { .. } => self.triggered += 1,
            BalanceAlertOutcome::Recovered { .. } => self.recovered += 1,
            BalanceAlertOutcome::Failed { .. } => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }
}
