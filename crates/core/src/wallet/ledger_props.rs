//! Property-based tests for the ledger executor math.
//!
//! - Balance equals credits minus debits after any accepted sequence
//! - A rejected debit leaves the balance untouched
//! - Exactly `floor(B / A)` of N equal debits can succeed
//! - Open credit lots always add up to the balance

use proptest::prelude::*;
use rust_decimal::Decimal;
use tally_shared::types::WalletId;

use chrono::{Duration, TimeZone, Utc};
use tally_shared::types::{CurrencyCode, TenantId, WalletTransactionId};

use super::error::WalletError;
use super::expiry::CreditLots;
use super::ledger::BalanceChange;
use super::reconciliation::Reconciliation;
use super::types::{ReferenceType, TransactionStatus, TransactionType, WalletTransaction};

/// Strategy to generate positive decimal amounts (0.01 to 10,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate one operation.
fn operation() -> impl Strategy<Value = (TransactionType, Decimal)> {
    (
        prop_oneof![Just(TransactionType::Credit), Just(TransactionType::Debit)],
        positive_amount(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_balance_matches_accepted_log(ops in prop::collection::vec(operation(), 0..60)) {
        let wallet_id = WalletId::new();
        let mut balance = Decimal::ZERO;
        let mut log = Vec::new();

        for (kind, amount) in ops {
            match BalanceChange::compute(wallet_id, balance, kind, amount) {
                Ok(change) => {
                    prop_assert_eq!(change.balance_before, balance);
                    prop_assert!(change.balance_after >= Decimal::ZERO);
                    balance = change.balance_after;
                    log.push((kind, amount));
                }
                Err(WalletError::InsufficientBalance { balance: seen, requested, .. }) => {
                    prop_assert_eq!(kind, TransactionType::Debit);
                    prop_assert_eq!(seen, balance);
                    prop_assert!(requested > balance);
                }
                Err(other) => prop_assert!(false, "unexpected error {other}"),
            }
        }

        let reconciliation = Reconciliation::compute(wallet_id, balance, log);
        prop_assert!(reconciliation.is_consistent);
    }

    #[test]
    fn prop_exactly_k_debits_succeed(
        amount in positive_amount(),
        n in 1usize..40,
        k_budget in 0usize..40,
    ) {
        let wallet_id = WalletId::new();
        let initial = amount * Decimal::from(k_budget);
        let mut balance = initial;
        let mut succeeded = 0usize;

        for _ in 0..n {
            if let Ok(change) = BalanceChange::compute(wallet_id, balance, TransactionType::Debit, amount) {
                balance = change.balance_after;
                succeeded += 1;
            }
        }

        let expected = n.min(k_budget);
        prop_assert_eq!(succeeded, expected);
        prop_assert_eq!(balance, initial - amount * Decimal::from(expected));
    }

    #[test]
    fn prop_credit_lots_sum_to_balance(
        ops in prop::collection::vec((operation(), prop::option::of(0i64..30)), 0..60),
    ) {
        let wallet_id = WalletId::new();
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let usd: CurrencyCode = "USD".parse().unwrap();
        let mut balance = Decimal::ZERO;
        let mut lots = CreditLots::default();
        let mut credits = Vec::new();

        for ((kind, amount), expiry_day) in ops {
            let Ok(change) = BalanceChange::compute(wallet_id, balance, kind, amount) else {
                continue;
            };
            let tx = WalletTransaction {
                id: WalletTransactionId::new(),
                tenant_id: TenantId::new(),
                wallet_id,
                transaction_type: kind,
                amount,
                currency: usd,
                balance_before: change.balance_before,
                balance_after: change.balance_after,
                transaction_status: TransactionStatus::Completed,
                reference_type: ReferenceType::Manual,
                reference_id: "p".into(),
                description: None,
                metadata: serde_json::json!({}),
                idempotency_key: None,
                expires_at: match kind {
                    TransactionType::Credit => expiry_day.map(|d| base + Duration::days(d)),
                    TransactionType::Debit => None,
                },
                created_at: base,
                created_by: None,
            };
            if kind == TransactionType::Credit {
                credits.push(tx.id);
            }
            lots.apply(&tx);
            balance = change.balance_after;
            prop_assert_eq!(lots.total(), balance);
        }

        for id in credits {
            prop_assert!(lots.remaining(id) >= Decimal::ZERO);
            prop_assert!(lots.remaining(id) <= balance);
        }
    }
}
