//! Integration tests for database-level ledger guarantees.
//!
//! The schema enforces these even if application logic fails:
//! - `wallet_transactions` rows cannot be updated or deleted
//! - balances cannot go negative
//! - transaction amounts must be positive

mod common;

use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use tally_core::wallet::{LedgerOperation, ReferenceType, WalletError};
use tally_db::entities::{wallet_transactions, wallets};
use tally_db::error::classify;
use tally_db::TenantTransaction;
use tally_shared::types::TenantId;

#[tokio::test]
async fn test_trigger_rejects_transaction_update() {
    let Some(t) = common::setup().await else { return };
    let tenant = TenantId::new();
    let wallet = common::usd_wallet(&t, tenant, None).await;
    let applied = t
        .ledger
        .credit(
            tenant,
            LedgerOperation::credit(wallet.id, dec!(10), ReferenceType::Topup, "t-1"),
        )
        .await
        .expect("credit");

    let tx = TenantTransaction::begin(&t.db, tenant, &t.config)
        .await
        .expect("begin");
    let row = wallet_transactions::Entity::find_by_id(applied.transaction.id.into_inner())
        .one(tx.conn())
        .await
        .expect("query")
        .expect("row");
    let mut active: wallet_transactions::ActiveModel = row.into();
    active.description = Set(Some("rewritten".into()));
    let result = active.update(tx.conn()).await;
    assert!(result.is_err(), "ledger rows must be immutable");
}

#[tokio::test]
async fn test_trigger_rejects_transaction_delete() {
    let Some(t) = common::setup().await else { return };
    let tenant = TenantId::new();
    let wallet = common::usd_wallet(&t, tenant, Some(dec!(3))).await;
    let page = t
        .log
        .list(tenant, wallet.id, &Default::default(), Default::default())
        .await
        .expect("list");

    let tx = TenantTransaction::begin(&t.db, tenant, &t.config)
        .await
        .expect("begin");
    let result = wallet_transactions::Entity::delete_by_id(page.data[0].id.into_inner())
        .exec(tx.conn())
        .await;
    assert!(result.is_err(), "ledger rows must not be deleted");
}

#[tokio::test]
async fn test_check_rejects_negative_balance() {
    let Some(t) = common::setup().await else { return };
    let tenant = TenantId::new();
    let wallet = common::usd_wallet(&t, tenant, None).await;

    let tx = TenantTransaction::begin(&t.db, tenant, &t.config)
        .await
        .expect("begin");
    let row = wallets::Entity::find_by_id(wallet.id.into_inner())
        .one(tx.conn())
        .await
        .expect("query")
        .expect("row");
    let mut active: wallets::ActiveModel = row.into();
    active.balance = Set(dec!(-1));
    let err = active.update(tx.conn()).await.expect_err("check violation");
    assert!(matches!(classify(err), WalletError::Conflict(_)));
}

#[tokio::test]
async fn test_tenant_context_hides_other_tenants() {
    let Some(t) = common::setup().await else { return };
    let owner = TenantId::new();
    let wallet = common::usd_wallet(&t, owner, Some(dec!(5))).await;

    let stranger = TenantId::new();
    assert!(matches!(
        t.wallets.get(stranger, wallet.id).await,
        Err(WalletError::NotFound { .. })
    ));
    assert!(matches!(
        t.log.reconcile(stranger, wallet.id).await,
        Err(WalletError::NotFound { .. })
    ));
    let owned = t.wallets.get(owner, wallet.id).await.expect("owner sees wallet");
    assert_eq!(owned.balance, dec!(5));
}
