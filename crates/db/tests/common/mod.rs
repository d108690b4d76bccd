//! Shared setup for database-backed tests.
//!
//! Uses `DATABASE_URL` (or `TALLY__DATABASE__URL`) when set, otherwise starts
//! a throwaway Postgres with testcontainers. Tests print a message and return
//! early when neither is available.

#![allow(dead_code)]

use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, EntityTrait,
    QuerySelect, Statement,
};
use sea_orm_migration::MigratorTrait;
use tally_core::wallet::{CreateWalletInput, SettlementStrategy, Wallet, WalletType};
use tally_db::entities::wallets;
use tally_db::migration::Migrator;
use tally_db::{
    AutoTopUpRepository, BalanceAlertRepository, CreditExpiryRepository, LedgerRepository,
    SettlementRepository, TenantTransaction, TransactionLogRepository, WalletRepository,
};
use tally_shared::config::LedgerConfig;
use tally_shared::types::{CustomerId, TenantId, WalletId};
use testcontainers_modules::postgres::Postgres;
use testcontainers_modules::testcontainers::runners::AsyncRunner;
use testcontainers_modules::testcontainers::ContainerAsync;
use tokio::sync::OnceCell;

struct Shared {
    url: String,
    _container: Option<ContainerAsync<Postgres>>,
}

static SHARED: OnceCell<Option<Shared>> = OnceCell::const_new();

async fn start() -> Option<Shared> {
    let configured = std::env::var("DATABASE_URL")
        .or_else(|_| std::env::var("TALLY__DATABASE__URL"))
        .ok();

    let shared = match configured {
        Some(url) => Shared {
            url,
            _container: None,
        },
        None => {
            let container = match Postgres::default().start().await {
                Ok(container) => container,
                Err(e) => {
                    eprintln!("Skipping test - no DATABASE_URL and container failed: {e}");
                    return None;
                }
            };
            let host = container.get_host().await.ok()?;
            let port = container.get_host_port_ipv4(5432).await.ok()?;
            Shared {
                url: format!("postgres://postgres:postgres@{host}:{port}/postgres"),
                _container: Some(container),
            }
        }
    };

    let db = Database::connect(&shared.url).await.ok()?;
    if let Err(e) = Migrator::up(&db, None).await {
        eprintln!("Skipping test - migrations failed: {e}");
        return None;
    }
    Some(shared)
}

/// Connection and repositories for one test.
pub struct TestDb {
    pub db: DatabaseConnection,
    pub config: LedgerConfig,
    pub wallets: WalletRepository,
    pub ledger: LedgerRepository,
    pub log: TransactionLogRepository,
    pub settlements: SettlementRepository,
    pub auto_top_up: AutoTopUpRepository,
    pub credit_expiry: CreditExpiryRepository,
    pub balance_alerts: BalanceAlertRepository,
}

/// Connects to the test database, or returns `None` to skip.
pub async fn setup() -> Option<TestDb> {
    let Some(shared) = SHARED.get_or_init(start).await else {
        eprintln!("Skipping test - database not available");
        return None;
    };

    let mut options = ConnectOptions::new(shared.url.clone());
    options.max_connections(40).sqlx_logging(false);
    let db = match Database::connect(options).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Skipping test - database not available: {e}");
            return None;
        }
    };

    let config = LedgerConfig {
        lock_timeout_ms: 10_000,
        statement_timeout_ms: 30_000,
        ..LedgerConfig::default()
    };
    Some(TestDb {
        wallets: WalletRepository::new(db.clone(), config.clone()),
        ledger: LedgerRepository::new(db.clone(), config.clone()),
        log: TransactionLogRepository::new(db.clone(), config.clone()),
        settlements: SettlementRepository::new(
            db.clone(),
            config.clone(),
            SettlementStrategy::OldestFirst,
        ),
        auto_top_up: AutoTopUpRepository::new(db.clone(), config.clone()),
        credit_expiry: CreditExpiryRepository::new(db.clone(), config.clone()),
        balance_alerts: BalanceAlertRepository::new(db.clone(), config.clone()),
        db,
        config,
    })
}

/// Creates a USD wallet for a fresh customer.
pub async fn usd_wallet(t: &TestDb, tenant: TenantId, initial: Option<Decimal>) -> Wallet {
    wallet_for(t, tenant, CustomerId::new(), WalletType::Prepaid, initial).await
}

/// Creates a USD wallet of `wallet_type` for `customer`.
pub async fn wallet_for(
    t: &TestDb,
    tenant: TenantId,
    customer: CustomerId,
    wallet_type: WalletType,
    initial: Option<Decimal>,
) -> Wallet {
    t.wallets
        .create(
            tenant,
            CreateWalletInput {
                customer_id: Some(customer),
                currency: "usd".into(),
                wallet_type,
                initial_credit: initial,
                ..CreateWalletInput::default()
            },
            None,
        )
        .await
        .expect("create wallet")
}

/// A transaction holding a wallet row lock, and the backend serving it.
pub struct HeldLock {
    pub tx: TenantTransaction,
    pub pid: i32,
}

/// Locks a wallet row from the test so other operations queue behind it.
pub async fn hold_wallet_lock(t: &TestDb, tenant: TenantId, wallet_id: WalletId) -> HeldLock {
    let tx = TenantTransaction::begin(&t.db, tenant, &t.config)
        .await
        .expect("begin");
    wallets::Entity::find_by_id(wallet_id.into_inner())
        .lock_exclusive()
        .one(tx.conn())
        .await
        .expect("lock")
        .expect("wallet");
    let row = tx
        .conn()
        .query_one(Statement::from_string(
            DbBackend::Postgres,
            "SELECT pg_backend_pid() AS pid",
        ))
        .await
        .expect("pid query")
        .expect("pid row");
    let pid = row.try_get("", "pid").expect("pid");
    HeldLock { tx, pid }
}

/// Waits for a backend blocked by any of `blockers` that is not itself one
/// of them, and returns its pid.
pub async fn wait_for_waiter(t: &TestDb, blockers: &[i32]) -> i32 {
    let list = blockers
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    let sql = format!(
        "SELECT pid FROM pg_stat_activity \
         WHERE pg_blocking_pids(pid) && ARRAY[{list}]::int[] \
           AND NOT (pid = ANY(ARRAY[{list}]::int[])) \
         LIMIT 1"
    );
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let row = t
            .db
            .query_one(Statement::from_string(DbBackend::Postgres, sql.clone()))
            .await
            .expect("pg_stat_activity");
        if let Some(row) = row {
            return row.try_get("", "pid").expect("pid");
        }
        assert!(Instant::now() < deadline, "no backend queued behind {list}");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
