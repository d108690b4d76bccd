//! Auto top-up evaluation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tally_shared::types::{WalletId, WalletTransactionId};

use super::error::WalletError;
use super::types::Wallet;

/// Returns true if the wallet is active, opted in, and below its threshold.
#[must_use]
pub fn needs_top_up(wallet: &Wallet) -> bool {
    let config = &wallet.auto_top_up;
    wallet.is_active() && config.enabled && wallet.balance < config.threshold
}

/// Idempotency key for a top-up of the wallet version observed at `updated_at`.
///
/// Two runs that see the same wallet version produce the same key, so only one
/// of them can credit it.
#[must_use]
pub fn top_up_key(wallet_id: WalletId, updated_at: DateTime<Utc>) -> String {
    format!("auto_top_up:{wallet_id}:{}", updated_at.timestamp_micros())
}

/// What happened to one candidate wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AutoTopUpOutcome {
    /// Credit committed.
    Credited {
        /// Wallet that was credited.
        wallet_id: WalletId,
        /// Ledger row written.
        transaction_id: WalletTransactionId,
    },
    /// Wallet changed after it was selected and no longer qualifies.
    Skipped {
        /// Wallet that was skipped.
        wallet_id: WalletId,
    },
    /// Credit failed.
    Failed {
        /// Wallet that failed.
        wallet_id: WalletId,
        /// Error code of the failure.
        error_code: String,
        /// Error message of the failure.
        error_message: String,
    },
}

impl AutoTopUpOutcome {
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

/// Summary of one auto top-up run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AutoTopUpReport {
    /// Candidate wallets evaluated.
    pub evaluated: usize,
    /// Wallets credited.
    pub credited: usize,
    /// Wallets skipped because they moved.
    pub skipped: usize,
    /// Wallets whose credit failed.
    pub failed: usize,
    /// Per-wallet outcomes.
    pub outcomes: Vec<AutoTopUpOutcome>,
}

impl AutoTopUpReport {
    /// Adds an outcome and updates the counters.
    pub fn push(&mut self, outcome: AutoTopUpOutcome) {
        self.evaluated += 1;
        match outcome {
            AutoTopUpOutcome::Credited { .. } => self.credited += 1,
            AutoTopUpOutcome::Skipped { .. } => self.skipped += 1,
            AutoTopUpOutcome::Failed { .. } => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }
}
