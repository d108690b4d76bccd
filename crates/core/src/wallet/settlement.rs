//! Multi-wallet settlement planning.
//!
//! Settlement is a saga: each wallet debit commits on its own, and the
//! running tally below accumulates their outcomes into the summary record.
//! Wallet order is deterministic for a given set of wallets and strategy.

use std::cmp::Ordering;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{CurrencyCode, CustomerId, SettlementId, WalletId, WalletTransactionId};

use super::error::WalletError;
use super::ledger::{validate_amount, MAX_KEY_LEN};
use super::types::{Wallet, WalletType};

/// Order in which eligible wallets are drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStrategy {
    /// Oldest wallet first (`created_at` ascending).
    #[default]
    OldestFirst,
    /// Promotional wallets first, smallest balance first within each type.
    PromotionalFirst,
    /// Prepaid wallets first, smallest balance first within each type.
    PrepaidFirst,
    /// Smallest balance first, to leave as few partially used wallets as possible.
    BalanceOptimized,
}

impl SettlementStrategy {
    /// Returns the configuration name of this strategy.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OldestFirst => "oldest_first",
            Self::PromotionalFirst => "promotional_first",
            Self::PrepaidFirst => "prepaid_first",
            Self::BalanceOptimized => "balance_optimized",
        }
    }

    fn compare(self, a: &Wallet, b: &Wallet) -> Ordering {
        let primary = match self {
            Self::OldestFirst => Ordering::Equal,
            Self::PromotionalFirst => type_rank(a.wallet_type, WalletType::Promotional)
                .cmp(&type_rank(b.wallet_type, WalletType::Promotional))
                .then(a.balance.cmp(&b.balance)),
            Self::PrepaidFirst => type_rank(a.wallet_type, WalletType::Prepaid)
                .cmp(&type_rank(b.wallet_type, WalletType::Prepaid))
                .then(a.balance.cmp(&b.balance)),
            Self::BalanceOptimized => a.balance.cmp(&b.balance),
        };
        primary
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    }
}

fn type_rank(wallet_type: WalletType, preferred: WalletType) -> u8 {
    u8::from(wallet_type != preferred)
}

impl std::fmt::Display for SettlementStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SettlementStrategy {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "oldest_first" => Ok(Self::OldestFirst),
            "promotional_first" => Ok(Self::PromotionalFirst),
            "prepaid_first" => Ok(Self::PrepaidFirst),
            "balance_optimized" => Ok(Self::BalanceOptimized),
            other => Err(WalletError::Validation(format!(
                "unknown settlement strategy '{other}'"
            ))),
        }
    }
}

/// Lifecycle of a settlement summary record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    /// Record written, debits may be in flight.
    Pending,
    /// All debits attempted and totals recorded.
    Completed,
}

impl SettlementStatus {
    /// Returns the persisted name of this status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

/// Request to cover an invoice from a customer's wallets.
#[derive(Debug, Clone, Deserialize)]
pub struct SettlementRequest {
    /// Customer whose wallets are drained.
    pub customer_id: CustomerId,
    /// Invoice being paid; used as the debit reference id.
    pub invoice_id: String,
    /// Amount to collect.
    pub amount_due: Decimal,
    /// Raw currency code of the invoice.
    pub currency: String,
    /// Overrides the configured ordering.
    #[serde(default)]
    pub strategy: Option<SettlementStrategy>,
    /// Maximum number of wallets to debit; 0 means no limit.
    #[serde(default)]
    pub max_wallets: usize,
    /// Dedup key, unique per tenant.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl SettlementRequest {
    /// Validates the request and returns the normalized currency.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a non-positive amount, an empty invoice id,
    /// a malformed currency or a bad idempotency key.
    pub fn validate(&self) -> Result<CurrencyCode, WalletError> {
        validate_amount(self.amount_due)
            .map_err(|_| WalletError::Validation(format!(
                "amount_due must be positive, got {}",
                self.amount_due
            )))?;
        if self.invoice_id.trim().is_empty() {
            return Err(WalletError::Validation("invoice_id is required".into()));
        }
        if self.invoice_id.len() > MAX_KEY_LEN {
            return Err(WalletError::Validation(format!(
                "invoice_id must be at most {MAX_KEY_LEN} characters"
            )));
        }
        if let Some(key) = &self.idempotency_key {
            if key.trim().is_empty() || key.len() > MAX_KEY_LEN {
                return Err(WalletError::Validation(format!(
                    "idempotency_key must be 1 to {MAX_KEY_LEN} characters"
                )));
            }
        }
        self.currency
            .parse()
            .map_err(|e: tally_shared::types::InvalidCurrency| WalletError::Validation(e.to_string()))
    }
}

/// Returns true if a wallet can contribute to a settlement in `currency`.
#[must_use]
pub fn is_eligible(wallet: &Wallet, currency: CurrencyCode) -> bool {
    wallet.is_active() && wallet.currency == currency && wallet.balance > Decimal::ZERO
}

/// Filters eligible wallets, orders them by `strategy` and applies the wallet cap.
#[must_use]
pub fn order_wallets(
    wallets: Vec<Wallet>,
    currency: CurrencyCode,
    strategy: SettlementStrategy,
    max_wallets: usize,
) -> Vec<Wallet> {
    let mut eligible: Vec<Wallet> = wallets
        .into_iter()
        .filter(|w| is_eligible(w, currency))
        .collect();
    eligible.sort_by(|a, b| strategy.compare(a, b));
    if max_wallets > 0 {
        eligible.truncate(max_wallets);
    }
    eligible
}

/// Idempotency key of the debit a settlement issues against one wallet.
#[must_use]
pub fn wallet_debit_key(settlement_id: SettlementId, wallet_id: WalletId) -> String {
    format!("settlement:{settlement_id}:{wallet_id}")
}

/// Outcome of one wallet's debit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletResultStatus {
    /// Debit committed.
    Debited,
    /// Debit rejected; nothing written for this wallet.
    Failed,
}

/// Per-wallet entry in a settlement result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSettlementResult {
    /// Wallet that was attempted.
    pub wallet_id: WalletId,
    /// Amount the settlement tried to take.
    pub attempted_amount: Decimal,
    /// Amount actually taken (zero on failure).
    pub debited_amount: Decimal,
    /// Debited or failed.
    pub status: WalletResultStatus,
    /// Ledger row written by the debit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<WalletTransactionId>,
    /// Error code of a failed debit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Error message of a failed debit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Running totals of a settlement in progress.
#[derive(Debug, Clone)]
pub struct SettlementTally {
    amount_due: Decimal,
    collected: Decimal,
    results: Vec<WalletSettlementResult>,
}

impl SettlementTally {
    /// Starts a tally for `amount_due`.
    #[must_use]
    pub const fn new(amount_due: Decimal) -> Self {
        Self {
            amount_due,
            collected: Decimal::ZERO,
            results: Vec::new(),
        }
    }

    /// Amount still to collect.
    #[must_use]
    pub fn remaining(&self) -> Decimal {
        self.amount_due - self.collected
    }

    /// Returns true once the full amount has been collected.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.remaining() <= Decimal::ZERO
    }

    /// Amount to request from a wallet holding `balance`: `min(remaining, balance)`.
    #[must_use]
    pub fn next_amount(&self, balance: Decimal) -> Decimal {
        self.remaining().min(balance)
    }

    /// Records a committed debit.
    pub fn record_debit(
        &mut self,
        wallet_id: WalletId,
        amount: Decimal,
        transaction_id: WalletTransactionId,
    ) {
        self.collected += amount;
        self.results.push(WalletSettlementResult {
            wallet_id,
            attempted_amount: amount,
            debited_amount: amount,
            status: WalletResultStatus::Debited,
            transaction_id: Some(transaction_id),
            error_code: None,
            error_message: None,
        });
    }

    /// Records a rejected debit; the tally is unchanged.
    pub fn record_failure(&mut self, wallet_id: WalletId, attempted: Decimal, error: &WalletError) {
        self.results.push(WalletSettlementResult {
            wallet_id,
            attempted_amount: attempted,
            debited_amount: Decimal::ZERO,
            status: WalletResultStatus::Failed,
            transaction_id: None,
            error_code: Some(error.error_code().to_string()),
            error_message: Some(error.to_string()),
        });
    }

    /// Per-wallet results in attempt order.
    #[must_use]
    pub fn results(&self) -> &[WalletSettlementResult] {
        &self.results
    }

    /// Consumes the tally into `(collected, remaining, results)`.
    #[must_use]
    pub fn finish(self) -> (Decimal, Decimal, Vec<WalletSettlementResult>) {
        let remaining = self.remaining();
        (self.collected, remaining, self.results)
    }
}

/// Result returned to the invoice service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementOutcome {
    /// Summary record id.
    pub settlement_id: SettlementId,
    /// Invoice that was paid.
    pub invoice_id: String,
    /// Customer whose wallets were drained.
    pub customer_id: CustomerId,
    /// Invoice currency.
    pub currency: CurrencyCode,
    /// Ordering that was applied.
    pub strategy: SettlementStrategy,
    /// Requested amount.
    pub amount_due: Decimal,
    /// Sum of committed debits.
    pub amount_collected: Decimal,
    /// `amount_due - amount_collected`.
    pub remaining_due: Decimal,
    /// Pending while debits run, completed afterwards.
    pub status: SettlementStatus,
    /// Per-wallet results in attempt order.
    pub wallet_results: Vec<WalletSettlementResult>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::types::{AlertState, AutoTopUpConfig, BalanceAlertConfig, WalletStatus};
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use std::str::FromStr;
    use tally_shared::types::TenantId;

    fn usd() -> CurrencyCode {
        CurrencyCode::from_str("USD").unwrap()
    }

    fn wallet(age_rank: i64, wallet_type: WalletType, balance: Decimal) -> Wallet {
        let created_at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(age_rank);
        Wallet {
            id: WalletId::new(),
            tenant_id: TenantId::new(),
            customer_id: CustomerId::new(),
            name: format!("w{age_rank}"),
            description: None,
            currency: usd(),
            wallet_type,
            wallet_status: WalletStatus::Active,
            balance,
            auto_top_up: AutoTopUpConfig::default(),
            balance_alert: BalanceAlertConfig::default(),
            alert_state: AlertState::Ok,
            metadata: serde_json::json!({}),
            created_at,
            updated_at: created_at,
            created_by: None,
            updated_by: None,
        }
    }

    fn names(wallets: &[Wallet]) -> Vec<&str> {
        wallets.iter().map(|w| w.name.as_str()).collect()
    }

    #[test]
    fn test_scenario_c_plan() {
        let w1 = wallet(1, WalletType::Prepaid, dec!(50));
        let w2 = wallet(2, WalletType::Prepaid, dec!(100));
        let ordered = order_wallets(vec![w2, w1], usd(), SettlementStrategy::OldestFirst, 0);
        assert_eq!(names(&ordered), ["w1", "w2"]);

        let mut tally = SettlementTally::new(dec!(120));
        for w in &ordered {
            let amount = tally.next_amount(w.balance);
            tally.record_debit(w.id, amount, WalletTransactionId::new());
        }
        let (collected, remaining, results) = tally.finish();
        assert_eq!(collected, dec!(120));
        assert_eq!(remaining, dec!(0));
        assert_eq!(results[0].debited_amount, dec!(50));
        assert_eq!(results[1].debited_amount, dec!(70));
    }

    #[test]
    fn test_strategies() {
        let wallets = vec![
            wallet(1, WalletType::Prepaid, dec!(80)),
            wallet(2, WalletType::Promotional, dec!(30)),
            wallet(3, WalletType::Prepaid, dec!(10)),
            wallet(4, WalletType::Promotional, dec!(5)),
        ];
        let order = |s| names(&order_wallets(wallets.clone(), usd(), s, 0))
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();

        assert_eq!(order(SettlementStrategy::OldestFirst), ["w1", "w2", "w3", "w4"]);
        assert_eq!(order(SettlementStrategy::PromotionalFirst), ["w4", "w2", "w3", "w1"]);
        assert_eq!(order(SettlementStrategy::PrepaidFirst), ["w3", "w1", "w4", "w2"]);
        assert_eq!(order(SettlementStrategy::BalanceOptimized), ["w4", "w3", "w2", "w1"]);
    }

    #[test]
    fn test_ties_break_on_creation() {
        let wallets = vec![
            wallet(2, WalletType::Prepaid, dec!(10)),
            wallet(1, WalletType::Prepaid, dec!(10)),
        ];
        let ordered = order_wallets(wallets, usd(), SettlementStrategy::BalanceOptimized, 0);
        assert_eq!(names(&ordered), ["w1", "w2"]);
    }

    #[test]
    fn test_ineligible_wallets_filtered_and_capped() {
        let mut closed = wallet(1, WalletType::Prepaid, dec!(10));
        closed.wallet_status = WalletStatus::Closed;
        let empty = wallet(2, WalletType::Prepaid, dec!(0));
        let mut euro = wallet(3, WalletType::Prepaid, dec!(10));
        euro.currency = CurrencyCode::from_str("EUR").unwrap();
        let a = wallet(4, WalletType::Prepaid, dec!(10));
        let b = wallet(5, WalletType::Prepaid, dec!(10));

        let ordered = order_wallets(
            vec![closed, empty, euro, a, b],
            usd(),
            SettlementStrategy::OldestFirst,
            1,
        );
        assert_eq!(names(&ordered), ["w4"]);
    }

    #[test]
    fn test_failure_keeps_remaining() {
        let mut tally = SettlementTally::new(dec!(40));
        let wallet_id = WalletId::new();
        tally.record_failure(
            wallet_id,
            dec!(40),
            &WalletError::InsufficientBalance {
                wallet_id,
                balance: dec!(10),
                requested: dec!(40),
            },
        );
        assert_eq!(tally.remaining(), dec!(40));
        assert!(!tally.is_settled());
        let result = &tally.results()[0];
        assert_eq!(result.status, WalletResultStatus::Failed);
        assert_eq!(result.error_code.as_deref(), Some("INSUFFICIENT_BALANCE"));
    }

    #[test]
    fn test_request_validation() {
        let mut request = SettlementRequest {
            customer_id: CustomerId::new(),
            invoice_id: "inv_1".into(),
            amount_due: dec!(120),
            currency: "usd".into(),
            strategy: None,
            max_wallets: 0,
            idempotency_key: None,
        };
        assert_eq!(request.validate().unwrap(), usd());

        request.amount_due = dec!(0);
        assert!(matches!(request.validate(), Err(WalletError::Validation(_))));

        request.amount_due = dec!(10);
        request.currency = "dollars".into();
        assert!(matches!(request.validate(), Err(WalletError::Validation(_))));
    }

    #[test]
    fn test_strategy_parse_and_key_format() {
        assert_eq!(
            SettlementStrategy::from_str("prepaid_first").unwrap(),
            SettlementStrategy::PrepaidFirst
        );
        assert!(SettlementStrategy::from_str("largest_first").is_err());
        assert_eq!(SettlementStrategy::default(), SettlementStrategy::OldestFirst);

        let settlement_id = SettlementId::new();
        let wallet_id = WalletId::new();
        assert_eq!(
            wallet_debit_key(settlement_id, wallet_id),
            format!("settlement:{settlement_id}:{wallet_id}")
        );
    }
}
