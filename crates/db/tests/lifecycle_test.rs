//! Integration tests for wallet creation, update, termination and deletion.

mod common;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tally_core::wallet::{
    AutoTopUpConfig, CreateWalletInput, LedgerOperation, ReferenceType, UpdateWalletInput,
    WalletError, WalletStatus, WalletType,
};
use tally_shared::types::{CustomerId, TenantId};

#[tokio::test]
async fn test_create_defaults() {
    let Some(t) = common::setup().await else { return };
    let tenant = TenantId::new();
    let wallet = common::usd_wallet(&t, tenant, None).await;

    assert_eq!(wallet.currency.as_str(), "USD");
    assert_eq!(wallet.name, "Prepaid Wallet - USD");
    assert_eq!(wallet.wallet_status, WalletStatus::Active);
    assert_eq!(wallet.balance, Decimal::ZERO);
    assert_eq!(wallet.tenant_id, tenant);
}

#[tokio::test]
async fn test_duplicate_active_wallet_conflicts() {
    let Some(t) = common::setup().await else { return };
    let tenant = TenantId::new();
    let customer = CustomerId::new();
    common::wallet_for(&t, tenant, customer, WalletType::Prepaid, None).await;

    let err = t
        .wallets
        .create(
            tenant,
            CreateWalletInput {
                customer_id: Some(customer),
                currency: "USD".into(),
                ..CreateWalletInput::default()
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::Conflict(_)));

    // a promotional wallet in the same currency is allowed
    common::wallet_for(&t, tenant, customer, WalletType::Promotional, None).await;
    let wallets = t
        .wallets
        .list_by_customer(tenant, customer, None)
        .await
        .expect("list");
    assert_eq!(wallets.len(), 2);
}

#[tokio::test]
async fn test_create_rejects_bad_input() {
    let Some(t) = common::setup().await else { return };
    let err = t
        .wallets
        .create(
            TenantId::new(),
            CreateWalletInput {
                customer_id: Some(CustomerId::new()),
                currency: "US".into(),
                ..CreateWalletInput::default()
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::Validation(_)));
}

#[tokio::test]
async fn test_update_changes_config_only() {
    let Some(t) = common::setup().await else { return };
    let tenant = TenantId::new();
    let wallet = common::usd_wallet(&t, tenant, Some(dec!(5))).await;

    let updated = t
        .wallets
        .update(
            tenant,
            wallet.id,
            UpdateWalletInput {
                name: Some("Ops budget".into()),
                auto_top_up: Some(AutoTopUpConfig {
                    enabled: true,
                    threshold: dec!(10),
                    top_up_amount: dec!(50),
                }),
                ..UpdateWalletInput::default()
            },
            None,
        )
        .await
        .expect("update");
    assert_eq!(updated.name, "Ops budget");
    assert!(updated.auto_top_up.enabled);
    assert_eq!(updated.balance, dec!(5));
}

#[tokio::test]
async fn test_terminate_zeroes_and_closes() {
    let Some(t) = common::setup().await else { return };
    let tenant = TenantId::new();
    let wallet = common::usd_wallet(&t, tenant, Some(dec!(42.5))).await;

    let result = t.wallets.terminate(tenant, wallet.id, None).await.expect("terminate");
    assert_eq!(result.wallet.wallet_status, WalletStatus::Closed);
    assert_eq!(result.wallet.balance, Decimal::ZERO);
    let final_debit = result.final_debit.expect("final debit");
    assert_eq!(final_debit.amount, dec!(42.5));
    assert_eq!(final_debit.reference_type, ReferenceType::Termination);

    let credit = LedgerOperation::credit(wallet.id, dec!(1), ReferenceType::Topup, "late");
    assert!(matches!(
        t.ledger.credit(tenant, credit).await,
        Err(WalletError::Conflict(_))
    ));
    assert!(matches!(
        t.wallets.terminate(tenant, wallet.id, None).await,
        Err(WalletError::Conflict(_))
    ));
    let update = UpdateWalletInput {
        name: Some("again".into()),
        ..UpdateWalletInput::default()
    };
    assert!(matches!(
        t.wallets.update(tenant, wallet.id, update, None).await,
        Err(WalletError::Conflict(_))
    ));

    let reconciliation = t.log.reconcile(tenant, wallet.id).await.expect("reconcile");
    assert!(reconciliation.is_consistent);
}

#[tokio::test]
async fn test_terminate_empty_wallet_writes_no_debit() {
    let Some(t) = common::setup().await else { return };
    let tenant = TenantId::new();
    let wallet = common::usd_wallet(&t, tenant, None).await;

    let result = t.wallets.terminate(tenant, wallet.id, None).await.expect("terminate");
    assert!(result.final_debit.is_none());
    assert_eq!(result.wallet.wallet_status, WalletStatus::Closed);
}

#[tokio::test]
async fn test_delete_requires_termination() {
    let Some(t) = common::setup().await else { return };
    let tenant = TenantId::new();
    let wallet = common::usd_wallet(&t, tenant, Some(dec!(1))).await;

    assert!(matches!(
        t.wallets.soft_delete(tenant, wallet.id, None).await,
        Err(WalletError::Conflict(_))
    ));
    t.wallets.terminate(tenant, wallet.id, None).await.expect("terminate");
    t.wallets.soft_delete(tenant, wallet.id, None).await.expect("delete");
    assert!(matches!(
        t.wallets.get(tenant, wallet.id).await,
        Err(WalletError::NotFound { .. })
    ));
}
