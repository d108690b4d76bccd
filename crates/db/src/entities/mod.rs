//! `SeaORM` entity definitions for the wallet ledger tables.

pub mod sea_orm_active_enums;
pub mod wallet_credit_expiries;
pub mod wallet_settlements;
pub mod wallet_transactions;
pub mod wallets;

pub mod prelude {
    //! Entity aliases.
    pub use super::wallet_credit_expiries::Entity as WalletCreditExpiries;
    pub use super::wallet_settlements::Entity as WalletSettlements;
    pub use super::wallet_transactions::Entity as WalletTransactions;
    pub use super::wallets::Entity as Wallets;
}
