//! Property-based tests for settlement planning.

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use tally_shared::types::{CurrencyCode, CustomerId, TenantId, WalletId, WalletTransactionId};

use super::settlement::{order_wallets, SettlementStrategy, SettlementTally};
use super::types::{
    AlertState, AutoTopUpConfig, BalanceAlertConfig, Wallet, WalletStatus, WalletType,
};

fn strategy() -> impl Strategy<Value = SettlementStrategy> {
    prop_oneof![
        Just(SettlementStrategy::OldestFirst),
        Just(SettlementStrategy::PromotionalFirst),
        Just(SettlementStrategy::PrepaidFirst),
        Just(SettlementStrategy::BalanceOptimized),
    ]
}

fn wallets() -> impl Strategy<Value = Vec<Wallet>> {
    prop::collection::vec(
        (0i64..100_000i64, any::<bool>(), 0i64..1_000i64),
        0..12,
    )
    .prop_map(|specs| {
        let usd: CurrencyCode = "USD".parse().unwrap();
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        specs
            .into_iter()
            .map(|(cents, promotional, minute)| {
                let created_at = base + Duration::minutes(minute);
                Wallet {
                    id: WalletId::new(),
                    tenant_id: TenantId::new(),
                    customer_id: CustomerId::new(),
                    name: String::new(),
                    description: None,
                    currency: usd,
                    wallet_type: if promotional { WalletType::Promotional } else { WalletType::Prepaid },
                    wallet_status: WalletStatus::Active,
                    balance: Decimal::new(cents, 2),
                    auto_top_up: AutoTopUpConfig::default(),
                    balance_alert: BalanceAlertConfig::default(),
                    alert_state: AlertState::Ok,
                    metadata: serde_json::json!({}),
                    created_at,
                    updated_at: created_at,
                    created_by: None,
                    updated_by: None,
                }
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_tally_conserves_amount(
        wallets in wallets(),
        due_cents in 1i64..500_000i64,
        strategy in strategy(),
    ) {
        let usd: CurrencyCode = "USD".parse().unwrap();
        let amount_due = Decimal::new(due_cents, 2);
        let available: Decimal = wallets.iter().map(|w| w.balance).sum();
        let ordered = order_wallets(wallets, usd, strategy, 0);

        let mut tally = SettlementTally::new(amount_due);
        for wallet in &ordered {
            if tally.is_settled() {
                break;
            }
            let amount = tally.next_amount(wallet.balance);
            prop_assert!(amount > Decimal::ZERO);
            prop_assert!(amount <= wallet.balance);
            tally.record_debit(wallet.id, amount, WalletTransactionId::new());
        }

        let (collected, remaining, _) = tally.finish();
        prop_assert_eq!(collected + remaining, amount_due);
        prop_assert_eq!(collected, amount_due.min(available));
        prop_assert!(remaining >= Decimal::ZERO);
    }

    #[test]
    fn prop_order_is_independent_of_input_order(
        wallets in wallets(),
        strategy in strategy(),
    ) {
        let usd: CurrencyCode = "USD".parse().unwrap();
        let forward: Vec<WalletId> = order_wallets(wallets.clone(), usd, strategy, 0)
            .iter()
            .map(|w| w.id)
            .collect();
        let mut reversed_input = wallets;
        reversed_input.reverse();
        let backward: Vec<WalletId> = order_wallets(reversed_input, usd, strategy, 0)
            .iter()
            .map(|w| w.id)
            .collect();
        prop_assert_eq!(forward, backward);
    }
}
