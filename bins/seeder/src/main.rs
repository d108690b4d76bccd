//! Database seeder for Tally development and testing.
//!
//! Seeds a demo tenant with two customers, their prepaid and promotional
//! wallets, and a few top-ups and usage debits. Re-running is safe: existing
//! wallets are reused and every ledger operation carries an idempotency key.
//!
//! Usage: cargo run --bin seeder

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::str::FromStr;
use tally_core::wallet::{
    AutoTopUpConfig, CreateWalletInput, LedgerOperation, ReferenceType, Wallet, WalletError,
    WalletStatus, WalletType,
};
use tally_db::{LedgerRepository, WalletRepository};
use tally_shared::AppConfig;
use tally_shared::types::{CustomerId, TenantId};

/// Demo tenant ID (consistent for all seeds)
const DEMO_TENANT_ID: &str = "00000000-0000-0000-0000-000000000001";
/// Customer with a prepaid wallet and auto top-up
const CUSTOMER_A_ID: &str = "00000000-0000-0000-0000-00000000000a";
/// Customer with prepaid and promotional wallets
const CUSTOMER_B_ID: &str = "00000000-0000-0000-0000-00000000000b";

struct Seeder {
    tenant: TenantId,
    wallets: WalletRepository,
    ledger: LedgerRepository,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;

    println!("Connecting to database...");
    let db = tally_db::connect(&config.database).await?;

    let seeder = Seeder {
        tenant: TenantId::from_str(DEMO_TENANT_ID)?,
        wallets: WalletRepository::new(db.clone(), config.ledger.clone()),
        ledger: LedgerRepository::new(db, config.ledger.clone()),
    };

    println!("Seeding customer A wallets...");
    let customer_a = CustomerId::from_str(CUSTOMER_A_ID)?;
    let a_prepaid = seeder
        .wallet(
            customer_a,
            WalletType::Prepaid,
            Some(AutoTopUpConfig {
                enabled: true,
                threshold: dec!(20),
                top_up_amount: dec!(100),
            }),
        )
        .await?;
    seeder.top_up(&a_prepaid, dec!(250), "seed-a-topup-1").await?;
    seeder.usage(&a_prepaid, dec!(42.5), "seed-a-usage-1").await?;

    println!("Seeding customer B wallets...");
    let customer_b = CustomerId::from_str(CUSTOMER_B_ID)?;
    let b_prepaid = seeder.wallet(customer_b, WalletType::Prepaid, None).await?;
    let b_promo = seeder.wallet(customer_b, WalletType::Promotional, None).await?;
    seeder.top_up(&b_prepaid, dec!(50), "seed-b-topup-1").await?;
    seeder.top_up(&b_promo, dec!(100), "seed-b-promo-1").await?;

    println!("Seeding complete!");
    println!("  tenant:   {DEMO_TENANT_ID}");
    for wallet in [&a_prepaid, &b_prepaid, &b_promo] {
        println!("  wallet:   {} ({}, {})", wallet.id, wallet.name, wallet.customer_id);
    }
    Ok(())
}

impl Seeder {
    /// Returns the customer's active wallet of `wallet_type`, creating it if missing.
    async fn wallet(
        &self,
        customer: CustomerId,
        wallet_type: WalletType,
        auto_top_up: Option<AutoTopUpConfig>,
    ) -> Result<Wallet, WalletError> {
        let existing = self
            .wallets
            .list_by_customer(self.tenant, customer, Some(WalletStatus::Active))
            .await?;
        if let Some(wallet) = existing.into_iter().find(|w| w.wallet_type == wallet_type) {
            return Ok(wallet);
        }

        self.wallets
            .create(
                self.tenant,
                CreateWalletInput {
                    customer_id: Some(customer),
                    currency: "USD".into(),
                    wallet_type,
                    auto_top_up,
                    metadata: Some(serde_json::json!({ "source": "seeder" })),
                    ..CreateWalletInput::default()
                },
                None,
            )
            .await
    }

    async fn top_up(&self, wallet: &Wallet, amount: Decimal, key: &str) -> Result<(), WalletError> {
        let op = LedgerOperation::credit(wallet.id, amount, ReferenceType::Topup, key)
            .with_description("Seed top-up")
            .with_idempotency_key(key);
        self.ledger.credit(self.tenant, op).await.map(|_| ())
    }

    async fn usage(&self, wallet: &Wallet, amount: Decimal, key: &str) -> Result<(), WalletError> {
        let op = LedgerOperation::debit(wallet.id, amount, ReferenceType::Usage, key)
            .with_description("Seed usage")
            .with_idempotency_key(key);
        self.ledger.debit(self.tenant, op).await.map(|_| ())
    }
}
