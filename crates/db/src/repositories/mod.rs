//! Repository abstractions for data access.
//!
//! Repositories hide the `SeaORM` implementation details from the rest of the
//! application. Every call takes the tenant explicitly and runs inside a
//! [`TenantTransaction`](crate::tenant::TenantTransaction).

pub mod auto_top_up;
pub mod balance_alert;
pub mod credit_expiry;
pub mod ledger;
pub mod settlement;
pub mod transaction_log;
pub mod wallet;

pub use auto_top_up::AutoTopUpRepository;
pub use balance_alert::BalanceAlertRepository;
pub use credit_expiry::CreditExpiryRepository;
pub use ledger::{Applied, LedgerRepository};
pub use settlement::SettlementRepository;
pub use transaction_log::{TransactionFilter, TransactionLogRepository};
pub use wallet::{WalletBalance, WalletRepository};
