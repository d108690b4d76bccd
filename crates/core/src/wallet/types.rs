//! Wallet domain types.
//!
//! These types are storage-agnostic: `tally-db` converts its entity models
//! into them and back, and `tally-api` serializes them directly.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{CurrencyCode, CustomerId, TenantId, UserId, WalletId, WalletTransactionId};

use super::error::WalletError;

/// Implements `as_str`, `Display` and `FromStr` over a fixed set of snake_case names.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Returns the persisted name of this value.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = WalletError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    other => Err(WalletError::Validation(format!(
                        concat!("unknown ", stringify!($name), " '{}'"),
                        other
                    ))),
                }
            }
        }
    };
}

/// Operational status of a wallet. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletStatus {
    /// Accepts credits and debits.
    Active,
    /// Terminated; rejects every balance mutation.
    Closed,
}

string_enum!(WalletStatus { Active => "active", Closed => "closed" });

/// Kind of credit held by a wallet; drives settlement ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletType {
    /// Purchased credit.
    #[default]
    Prepaid,
    /// Granted credit (promotions, goodwill).
    Promotional,
}

string_enum!(WalletType { Prepaid => "prepaid", Promotional => "promotional" });

/// Direction of a ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Increases the balance.
    Credit,
    /// Decreases the balance.
    Debit,
}

string_enum!(TransactionType { Credit => "credit", Debit => "debit" });

impl TransactionType {
    /// Applies the direction to an absolute amount.
    #[must_use]
    pub fn signed(self, amount: Decimal) -> Decimal {
        match self {
            Self::Credit => amount,
            Self::Debit => -amount,
        }
    }
}

/// Outcome recorded on a transaction row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Applied to the balance.
    Completed,
    /// Recorded but not applied.
    Failed,
}

string_enum!(TransactionStatus { Completed => "completed", Failed => "failed" });

/// Why a balance changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    /// Customer purchased credit.
    Topup,
    /// Invoice settled from the wallet.
    InvoicePayment,
    /// Final debit written when a wallet is terminated.
    Termination,
    /// Metered usage charged directly.
    Usage,
    /// Money returned to the wallet.
    Refund,
    /// Credit written by the auto top-up run.
    AutoTopUp,
    /// Operator adjustment.
    Manual,
    /// Unspent remainder of a credit removed when it expired.
    CreditExpiry,
}

string_enum!(ReferenceType {
    Topup => "topup",
    InvoicePayment => "invoice_payment",
    Termination => "termination",
    Usage => "usage",
    Refund => "refund",
    AutoTopUp => "auto_top_up",
    Manual => "manual",
    CreditExpiry => "credit_expiry",
});

/// Whether a wallet is currently below its alert threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertState {
    /// Balance above the threshold, or alerts disabled.
    #[default]
    Ok,
    /// Balance at or below the threshold; the alert has fired.
    InAlarm,
}

string_enum!(AlertState { Ok => "ok", InAlarm => "in_alarm" });

/// Auto top-up settings stored on a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AutoTopUpConfig {
    /// Whether the scheduler may credit this wallet.
    pub enabled: bool,
    /// Balance below which a top-up is due.
    pub threshold: Decimal,
    /// Amount credited per top-up.
    pub top_up_amount: Decimal,
}

/// Low-balance alert settings stored on a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BalanceAlertConfig {
    /// Whether the alert check looks at this wallet.
    pub enabled: bool,
    /// Balance at or below which the alert fires.
    pub threshold: Decimal,
}

/// Point-in-time view of a wallet row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    /// Wallet id.
    pub id: WalletId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Owning customer.
    pub customer_id: CustomerId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Currency of the balance and every transaction.
    pub currency: CurrencyCode,
    /// Prepaid or promotional.
    pub wallet_type: WalletType,
    /// Active or closed.
    pub wallet_status: WalletStatus,
    /// Persisted balance, never negative.
    pub balance: Decimal,
    /// Auto top-up settings.
    pub auto_top_up: AutoTopUpConfig,
    /// Low-balance alert settings.
    pub balance_alert: BalanceAlertConfig,
    /// Last state recorded by the alert check.
    pub alert_state: AlertState,
    /// Arbitrary JSON object.
    pub metadata: serde_json::Value,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
    /// User that created the row.
    pub created_by: Option<UserId>,
    /// User that last modified the row.
    pub updated_by: Option<UserId>,
}

impl Wallet {
    /// Returns true if the wallet accepts credits and debits.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.wallet_status == WalletStatus::Active
    }
}

/// An immutable ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletTransaction {
    /// Transaction id.
    pub id: WalletTransactionId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Wallet the transaction belongs to.
    pub wallet_id: WalletId,
    /// Credit or debit.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// Absolute amount; direction comes from `transaction_type`.
    pub amount: Decimal,
    /// Currency of the balance and every transaction.
    pub currency: CurrencyCode,
    /// Balance read under the row lock.
    pub balance_before: Decimal,
    /// Balance written by this transaction.
    pub balance_after: Decimal,
    /// Completed or failed.
    pub transaction_status: TransactionStatus,
    /// Why the balance changed.
    pub reference_type: ReferenceType,
    /// Id of the external object (invoice, payment) behind the change.
    pub reference_id: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Arbitrary JSON object.
    pub metadata: serde_json::Value,
    /// Dedup key supplied by the caller.
    pub idempotency_key: Option<String>,
    /// When the unspent part of this credit expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// User that created the row.
    pub created_by: Option<UserId>,
}

/// A request to move money in or out of one wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerOperation {
    /// Wallet the transaction belongs to.
    pub wallet_id: WalletId,
    /// Credit or debit.
    pub transaction_type: TransactionType,
    /// Absolute amount, strictly positive.
    pub amount: Decimal,
    /// Why the balance changed.
    pub reference_type: ReferenceType,
    /// Id of the external object (invoice, payment) behind the change.
    pub reference_id: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Optional JSON object.
    pub metadata: Option<serde_json::Value>,
    /// Caller-supplied dedup key, unique per wallet.
    pub idempotency_key: Option<String>,
    /// Expiry of a credit; debits never carry one.
    pub expires_at: Option<DateTime<Utc>>,
    /// Acting user, recorded as created_by.
    pub actor: Option<UserId>,
}

impl LedgerOperation {
    /// Starts a credit of `amount`.
    #[must_use]
    pub fn credit(
        wallet_id: WalletId,
        amount: Decimal,
        reference_type: ReferenceType,
        reference_id: impl Into<String>,
    ) -> Self {
        Self::new(wallet_id, TransactionType::Credit, amount, reference_type, reference_id)
    }

    /// Starts a debit of `amount`.
    #[must_use]
    pub fn debit(
        wallet_id: WalletId,
        amount: Decimal,
        reference_type: ReferenceType,
        reference_id: impl Into<String>,
    ) -> Self {
        Self::new(wallet_id, TransactionType::Debit, amount, reference_type, reference_id)
    }

    fn new(
        wallet_id: WalletId,
        transaction_type: TransactionType,
        amount: Decimal,
        reference_type: ReferenceType,
        reference_id: impl Into<String>,
    ) -> Self {
        Self {
            wallet_id,
            transaction_type,
            amount,
            reference_type,
            reference_id: reference_id.into(),
            description: None,
            metadata: None,
            idempotency_key: None,
            expires_at: None,
            actor: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the metadata object.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Sets the idempotency key.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Makes the unspent part of a credit expire at `expires_at`.
    #[must_use]
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Sets the acting user.
    #[must_use]
    pub fn with_actor(mut self, actor: Option<UserId>) -> Self {
        self.actor = actor;
        self
    }
}

/// Input for creating a wallet.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateWalletInput {
    /// Owning customer; required.
    pub customer_id: Option<CustomerId>,
    /// Raw currency code; validated and upper-cased on create.
    pub currency: String,
    /// Prepaid or promotional.
    #[serde(default)]
    pub wallet_type: WalletType,
    /// Display name; defaults to "<Type> Wallet - <CUR>".
    pub name: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Auto top-up settings.
    pub auto_top_up: Option<AutoTopUpConfig>,
    /// Low-balance alert settings.
    pub balance_alert: Option<BalanceAlertConfig>,
    /// Optional JSON object.
    pub metadata: Option<serde_json::Value>,
    /// Credited as a `topup` right after the wallet row is inserted.
    pub initial_credit: Option<Decimal>,
}

/// Input for updating wallet configuration. Balance is never touched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateWalletInput {
    /// New display name.
    pub name: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Auto top-up settings.
    pub auto_top_up: Option<AutoTopUpConfig>,
    /// Low-balance alert settings; resets the alert state.
    pub balance_alert: Option<BalanceAlertConfig>,
    /// Optional JSON object.
    pub metadata: Option<serde_json::Value>,
}

impl UpdateWalletInput {
    /// Returns true if no field would change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.auto_top_up.is_none()
            && self.balance_alert.is_none()
            && self.metadata.is_none()
    }
}

/// Result of terminating a wallet.
#[derive(Debug, Clone, Serialize)]
pub struct TerminationResult {
    /// Wallet after termination.
    pub wallet: Wallet,
    /// Final debit that zeroed the balance, if the balance was positive.
    pub final_debit: Option<WalletTransaction>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    #[rstest]
    #[case("topup", ReferenceType::Topup)]
    #[case("invoice_payment", ReferenceType::InvoicePayment)]
    #[case("termination", ReferenceType::Termination)]
    #[case("AUTO_TOP_UP", ReferenceType::AutoTopUp)]
    #[case(" manual ", ReferenceType::Manual)]
    #[case("credit_expiry", ReferenceType::CreditExpiry)]
    fn test_reference_type_parse(#[case] raw: &str, #[case] expected: ReferenceType) {
        assert_eq!(ReferenceType::from_str(raw).unwrap(), expected);
    }

    #[test]
    fn test_unknown_value_is_validation_error() {
        let err = WalletType::from_str("gift").unwrap_err();
        assert!(matches!(err, WalletError::Validation(ref m) if m.contains("gift")));
    }

    #[test]
    fn test_serde_names_match_persisted_names() {
        for rt in [
            ReferenceType::Topup,
            ReferenceType::InvoicePayment,
            ReferenceType::AutoTopUp,
        ] {
            let json = serde_json::to_string(&rt).unwrap();
            assert_eq!(json, format!("\"{}\"", rt.as_str()));
        }
        assert_eq!(
            serde_json::to_string(&WalletStatus::Closed).unwrap(),
            "\"closed\""
        );
        assert_eq!(
            serde_json::to_string(&AlertState::InAlarm).unwrap(),
            format!("\"{}\"", AlertState::InAlarm.as_str())
        );
    }

    #[test]
    fn test_signed_amount() {
        assert_eq!(TransactionType::Credit.signed(dec!(10)), dec!(10));
        assert_eq!(TransactionType::Debit.signed(dec!(10)), dec!(-10));
    }

    #[test]
    fn test_operation_builder() {
        let wallet_id = WalletId::new();
        let op = LedgerOperation::debit(wallet_id, dec!(30), ReferenceType::InvoicePayment, "inv_1")
            .with_idempotency_key("key-1")
            .with_description("invoice");
        assert_eq!(op.transaction_type, TransactionType::Debit);
        assert_eq!(op.reference_id, "inv_1");
        assert_eq!(op.idempotency_key.as_deref(), Some("key-1"));
        assert!(op.actor.is_none());
    }

    #[test]
    fn test_update_input_is_empty() {
        assert!(UpdateWalletInput::default().is_empty());
        let update = UpdateWalletInput {
            name: Some("Renamed".into()),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
