//! Credit expiry.
//!
//! Ledger rows never change, so the unspent part of a credit is derived by
//! replaying the wallet's history into credit lots:
//! - every completed credit opens a lot
//! - a debit draws from open lots, soonest expiry first, lots without an
//!   expiry last, older lots first on ties
//! - an expiry debit draws from the lot it expires
//!
//! The open lots always add up to the wallet balance.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tally_shared::types::{WalletId, WalletTransactionId};

use super::error::WalletError;
use super::types::{
    LedgerOperation, ReferenceType, TransactionStatus, TransactionType, WalletTransaction,
};

/// Idempotency key of the debit that expires `credit_id`.
#[must_use]
pub fn expiry_key(credit_id: WalletTransactionId) -> String {
    format!("expiry:{credit_id}")
}

/// Builds the debit removing `amount` left over from an expired credit.
#[must_use]
pub fn expiry_operation(credit: &WalletTransaction, amount: Decimal) -> LedgerOperation {
    LedgerOperation::debit(
        credit.wallet_id,
        amount,
        ReferenceType::CreditExpiry,
        credit.id.to_string(),
    )
    .with_description("Expired credit")
    .with_metadata(serde_json::json!({
        "expired_transaction_id": credit.id,
        "expires_at": credit.expires_at,
    }))
    .with_idempotency_key(expiry_key(credit.id))
}

#[derive(Debug, Clone)]
struct Lot {
    credit_id: WalletTransactionId,
    expires_at: Option<DateTime<Utc>>,
    remaining: Decimal,
}

/// Open credit lots of one wallet.
#[derive(Debug, Clone, Default)]
pub struct CreditLots {
    lots: Vec<Lot>,
}

impl CreditLots {
    /// Replays a wallet's history, oldest first.
    #[must_use]
    pub fn from_history<'a>(history: impl IntoIterator<Item = &'a WalletTransaction>) -> Self {
        let mut lots = Self::default();
        for tx in history {
            lots.apply(tx);
        }
        lots
    }

    /// Applies one ledger row. Failed rows moved no money and are ignored.
    pub fn apply(&mut self, tx: &WalletTransaction) {
        if tx.transaction_status != TransactionStatus::Completed {
            return;
        }
        match tx.transaction_type {
            TransactionType::Credit => self.lots.push(Lot {
                credit_id: tx.id,
                expires_at: tx.expires_at,
                remaining: tx.amount,
            }),
            TransactionType::Debit => {
                let mut left = tx.amount;
                if tx.reference_type == ReferenceType::CreditExpiry {
                    if let Some(lot) = self
                        .lots
                        .iter_mut()
                        .find(|lot| lot.credit_id.to_string() == tx.reference_id)
                    {
                        let take = left.min(lot.remaining);
                        lot.remaining -= take;
                        left -= take;
                    }
                }
                self.draw(left);
            }
        }
    }

    fn draw(&mut self, mut amount: Decimal) {
        // Stable sort keeps insertion order on equal expiries.
        let mut order: Vec<usize> = (0..self.lots.len()).collect();
        order.sort_by_key(|&i| {
            let expires_at = self.lots[i].expires_at;
            (expires_at.is_none(), expires_at)
        });
        for i in order {
            if amount <= Decimal::ZERO {
                break;
            }
            let lot = &mut self.lots[i];
            let take = amount.min(lot.remaining);
            lot.remaining -= take;
            amount -= take;
        }
    }

    /// Unspent part of `credit_id`; zero for an unknown credit.
    #[must_use]
    pub fn remaining(&self, credit_id: WalletTransactionId) -> Decimal {
        self.lots
            .iter()
            .find(|lot| lot.credit_id == credit_id)
            .map_or(Decimal::ZERO, |lot| lot.remaining)
    }

    /// Sum of all open lots.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.lots.iter().map(|lot| lot.remaining).sum()
    }
}

/// What happened to one expired credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CreditExpiryOutcome {
    /// The unspent remainder was debited.
    Expired {
        /// Wallet that was debited.
        wallet_id: WalletId,
        /// Credit that expired.
        credit_transaction_id: WalletTransactionId,
        /// Amount removed.
        amount: Decimal,
        /// Expiry debit written.
        transaction_id: WalletTransactionId,
    },
    /// The credit was fully spent before it expired; nothing was debited.
    Consumed {
        /// Wallet holding the credit.
        wallet_id: WalletId,
        /// Credit that expired.
        credit_transaction_id: WalletTransactionId,
    },
    /// Another run processed the credit first.
    Skipped {
        /// Wallet holding the credit.
        wallet_id: WalletId,
        /// Credit that expired.
        credit_transaction_id: WalletTransactionId,
    },
    /// Processing failed; the credit is retried by the next run.
    Failed {
        /// Wallet holding the credit.
        wallet_id: WalletId,
        /// Credit that expired.
        credit_transaction_id: WalletTransactionId,
        /// Error code of the failure.
        error_code: String,
        /// Error message of the failure.
        error_message: String,
    },
}

impl CreditExpiryOutcome {
    /// Builds a `Failed` outcome from an error.
    #[must_use]
    pub fn failed(credit: &WalletTransaction, error: &WalletError) -> Self {
        Self::Failed {
            wallet_id: credit.wallet_id,
            credit_transaction_id: credit.id,
            error_code: error.error_code().to_string(),
            error_message: error.to_string(),
        }
    }
}

/// Summary of one credit expiry run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreditExpiryReport {
    /// Expired credits evaluated.
    pub evaluated: usize,
    /// Credits whose remainder was debited.
    pub expired: usize,
    /// Credits already fully spent.
    pub consumed: usize,
    /// Credits handled by a concurrent run.
    pub skipped: usize,
    /// Credits that failed.
    pub failed: usize,
    /// Total amount removed.
    pub amount_expired: Decimal,
    /// Per-credit outcomes.
    pub outcomes: Vec<CreditExpiryOutcome>,
}

impl CreditExpiryReport {
    /// Adds an outcome and updates the counters.
    pub fn push(&mut self, outcome: CreditExpiryOutcome) {
        self.evaluated += 1;
        match &outcome {
            CreditExpiryOutcome::Expired { amount, .. } => {
                self.expired += 1;
                self.amount_expired += *amount;
            }
            CreditExpiryOutcome::Consumed { .. } => self.consumed += 1,
            CreditExpiryOutcome::Skipped { .. } => self.skipped += 1,
            CreditExpiryOutcome::Failed { .. } => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }
}
