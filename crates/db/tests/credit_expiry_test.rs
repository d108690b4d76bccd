//! Integration tests for the credit expiry run.

mod common;

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use tally_core::wallet::{expiry_key, CreditExpiryOutcome, LedgerOperation, ReferenceType};
use tally_db::TransactionFilter;
use tally_shared::types::{PageRequest, TenantId};

#[tokio::test]
async fn test_run_expires_unspent_remainder() {
    let Some(t) = common::setup().await else { return };
    let tenant = TenantId::new();
    let wallet = common::usd_wallet(&t, tenant, Some(dec!(100))).await;
    let expires_at = Utc::now() + Duration::hours(1);

    let promo = t
        .ledger
        .credit(
            tenant,
            LedgerOperation::credit(wallet.id, dec!(50), ReferenceType::Manual, "promo-1")
                .with_expiry(expires_at),
        )
        .await
        .expect("promo credit");
    assert!(promo.transaction.expires_at.is_some());

    // spends the expiring credit first
    t.ledger
        .debit(
            tenant,
            LedgerOperation::debit(wallet.id, dec!(30), ReferenceType::Usage, "usage-1"),
        )
        .await
        .expect("debit");

    // not expired yet
    let report = t.credit_expiry.run(tenant, Utc::now()).await.expect("early run");
    assert_eq!(report.evaluated, 0);

    let as_of = expires_at + Duration::hours(1);
    let report = t.credit_expiry.run(tenant, as_of).await.expect("run");
    assert_eq!((report.evaluated, report.expired, report.failed), (1, 1, 0));
    assert_eq!(report.amount_expired, dec!(20));
    assert!(matches!(
        report.outcomes[0],
        CreditExpiryOutcome::Expired { credit_transaction_id, amount, .. }
            if credit_transaction_id == promo.transaction.id && amount == dec!(20)
    ));

    let balance = t.wallets.get_balance(tenant, wallet.id).await.expect("balance");
    assert_eq!(balance.balance, dec!(100));

    let filter = TransactionFilter {
        reference_type: Some(ReferenceType::CreditExpiry),
        ..TransactionFilter::default()
    };
    let page = t
        .log
        .list(tenant, wallet.id, &filter, PageRequest::default())
        .await
        .expect("list");
    assert_eq!(page.meta.total, 1);
    let expiry = &page.data[0];
    assert_eq!(expiry.amount, dec!(20));
    assert_eq!(expiry.reference_id, promo.transaction.id.to_string());
    assert_eq!(
        expiry.idempotency_key.as_deref(),
        Some(expiry_key(promo.transaction.id).as_str())
    );

    // processed credits are not picked up again
    let report = t.credit_expiry.run(tenant, as_of).await.expect("second run");
    assert_eq!(report.evaluated, 0);

    let reconciliation = t.log.reconcile(tenant, wallet.id).await.expect("reconcile");
    assert!(reconciliation.is_consistent);
}

#[tokio::test]
async fn test_fully_spent_credit_is_consumed() {
    let Some(t) = common::setup().await else { return };
    let tenant = TenantId::new();
    let wallet = common::usd_wallet(&t, tenant, None).await;
    let expires_at = Utc::now() - Duration::minutes(5);

    t.ledger
        .credit(
            tenant,
            LedgerOperation::credit(wallet.id, dec!(30), ReferenceType::Manual, "promo-1")
                .with_expiry(expires_at),
        )
        .await
        .expect("credit");
    t.ledger
        .debit(
            tenant,
            LedgerOperation::debit(wallet.id, dec!(30), ReferenceType::Usage, "usage-1"),
        )
        .await
        .expect("debit");

    let report = t.credit_expiry.run(tenant, Utc::now()).await.expect("run");
    assert_eq!((report.evaluated, report.consumed, report.expired), (1, 1, 0));
    assert_eq!(report.amount_expired, dec!(0));

    let page = t
        .log
        .list(tenant, wallet.id, &TransactionFilter::default(), PageRequest::default())
        .await
        .expect("list");
    assert_eq!(page.meta.total, 2);

    let report = t.credit_expiry.run(tenant, Utc::now()).await.expect("second run");
    assert_eq!(report.evaluated, 0);
}

#[tokio::test]
async fn test_non_expiring_credit_outlives_expiring_one() {
    let Some(t) = common::setup().await else { return };
    let tenant = TenantId::new();
    let wallet = common::usd_wallet(&t, tenant, None).await;
    let soon = Utc::now() - Duration::minutes(1);

    t.ledger
        .credit(
            tenant,
            LedgerOperation::credit(wallet.id, dec!(40), ReferenceType::Topup, "topup-1"),
        )
        .await
        .expect("topup");
    t.ledger
        .credit(
            tenant,
            LedgerOperation::credit(wallet.id, dec!(25), ReferenceType::Manual, "promo-1")
                .with_expiry(soon),
        )
        .await
        .expect("promo");
    t.ledger
        .debit(
            tenant,
            LedgerOperation::debit(wallet.id, dec!(10), ReferenceType::Usage, "usage-1"),
        )
        .await
        .expect("debit");

    let report = t.credit_expiry.run(tenant, Utc::now()).await.expect("run");
    assert_eq!(report.amount_expired, dec!(15));

    let balance = t.wallets.get_balance(tenant, wallet.id).await.expect("balance");
    assert_eq!(balance.balance, dec!(40));
}

#[tokio::test]
async fn test_run_is_tenant_scoped() {
    let Some(t) = common::setup().await else { return };
    let tenant = TenantId::new();
    let other = TenantId::new();
    let wallet = common::usd_wallet(&t, tenant, None).await;

    t.ledger
        .credit(
            tenant,
            LedgerOperation::credit(wallet.id, dec!(10), ReferenceType::Manual, "promo-1")
                .with_expiry(Utc::now() - Duration::minutes(1)),
        )
        .await
        .expect("credit");

    let report = t.credit_expiry.run(other, Utc::now()).await.expect("other run");
    assert_eq!(report.evaluated, 0);

    let balance = t.wallets.get_balance(tenant, wallet.id).await.expect("balance");
    assert_eq!(balance.balance, dec!(10));
}
