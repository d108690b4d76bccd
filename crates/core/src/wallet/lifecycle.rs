//! Wallet lifecycle rules: create, update, terminate, delete.
//!
//! State machine: `Active -> Closed` via termination only. `Closed` is terminal.

use rust_decimal::Decimal;
use tally_shared::types::{CurrencyCode, CustomerId, WalletId};

use super::balance_alert::validate_balance_alert;
use super::error::WalletError;
use super::ledger::{validate_amount, validate_limit};
use super::types::{
    AutoTopUpConfig, BalanceAlertConfig, CreateWalletInput, UpdateWalletInput, WalletStatus,
    WalletType,
};

/// Longest accepted wallet name.
pub const MAX_NAME_LEN: usize = 255;

/// A create request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWallet {
    /// Owning customer.
    pub customer_id: CustomerId,
    /// Upper-cased currency.
    pub currency: CurrencyCode,
    /// Prepaid or promotional.
    pub wallet_type: WalletType,
    /// Name, defaulted from type and currency when not given.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Auto top-up settings (disabled by default).
    pub auto_top_up: AutoTopUpConfig,
    /// Low-balance alert settings (disabled by default).
    pub balance_alert: BalanceAlertConfig,
    /// JSON object, `{}` by default.
    pub metadata: serde_json::Value,
    /// Positive credit to apply after insert.
    pub initial_credit: Option<Decimal>,
}

/// Validates and normalizes a create request.
///
/// # Errors
///
/// Returns `Validation` for a missing customer, a malformed currency, an invalid
/// auto top-up or alert config, non-object metadata or a non-positive initial
/// credit.
pub fn validate_create(input: CreateWalletInput) -> Result<NewWallet, WalletError> {
    let customer_id = input
        .customer_id
        .ok_or_else(|| WalletError::Validation("customer_id is required".into()))?;

    let currency: CurrencyCode = input
        .currency
        .parse()
        .map_err(|e: tally_shared::types::InvalidCurrency| WalletError::Validation(e.to_string()))?;

    let auto_top_up = input.auto_top_up.unwrap_or_default();
    validate_auto_top_up(&auto_top_up)?;

    let balance_alert = input.balance_alert.unwrap_or_default();
    validate_balance_alert(&balance_alert)?;

    let metadata = input
        .metadata
        .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));
    validate_metadata(&metadata)?;

    if let Some(credit) = input.initial_credit {
        validate_amount(credit)?;
    }

    let name = match input.name {
        Some(name) => validate_name(&name)?,
        None => default_name(input.wallet_type, currency),
    };

    Ok(NewWallet {
        customer_id,
        currency,
        wallet_type: input.wallet_type,
        name,
        description: input.description,
        auto_top_up,
        balance_alert,
        metadata,
        initial_credit: input.initial_credit,
    })
}

/// Name given to a wallet created without one, e.g. `Prepaid Wallet - USD`.
#[must_use]
pub fn default_name(wallet_type: WalletType, currency: CurrencyCode) -> String {
    match wallet_type {
        WalletType::Prepaid => format!("Prepaid Wallet - {currency}"),
        WalletType::Promotional => format!("Promotional Wallet - {currency}"),
    }
}

fn validate_name(name: &str) -> Result<String, WalletError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(WalletError::Validation("name must not be blank".into()));
    }
    if trimmed.len() > MAX_NAME_LEN {
        return Err(WalletError::Validation(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Validates auto top-up settings.
///
/// # Errors
///
/// Returns `Validation` if the threshold is negative, too large or too
/// precise, or if the config is enabled with an amount that is not a valid
/// credit.
pub fn validate_auto_top_up(config: &AutoTopUpConfig) -> Result<(), WalletError> {
    validate_limit("auto top-up threshold", config.threshold)?;
    if config.enabled {
        validate_amount(config.top_up_amount).map_err(|e| match e {
            WalletError::Validation(reason) => {
                WalletError::Validation(format!("auto top-up amount: {reason}"))
            }
            other => other,
        })?;
    } else {
        validate_limit("auto top-up amount", config.top_up_amount)?;
    }
    Ok(())
}

/// Rejects metadata that is not a JSON object.
///
/// # Errors
///
/// Returns `Validation` for arrays, scalars and null.
pub fn validate_metadata(metadata: &serde_json::Value) -> Result<(), WalletError> {
    if metadata.is_object() {
        Ok(())
    } else {
        Err(WalletError::Validation("metadata must be a JSON object".into()))
    }
}

/// Validates a config update against the wallet's current status.
///
/// # Errors
///
/// Returns `Conflict` for a closed wallet and `Validation` for bad fields or an empty update.
pub fn validate_update(
    wallet_id: WalletId,
    status: WalletStatus,
    input: &UpdateWalletInput,
) -> Result<(), WalletError> {
    if status == WalletStatus::Closed {
        return Err(WalletError::Conflict(format!(
            "wallet {wallet_id} is closed and cannot be updated"
        )));
    }
    if input.is_empty() {
        return Err(WalletError::Validation("update contains no fields".into()));
    }
    if let Some(name) = &input.name {
        validate_name(name)?;
    }
    if let Some(config) = &input.auto_top_up {
        validate_auto_top_up(config)?;
    }
    if let Some(config) = &input.balance_alert {
        validate_balance_alert(config)?;
    }
    if let Some(metadata) = &input.metadata {
        validate_metadata(metadata)?;
    }
    Ok(())
}

/// Decides what termination must do for a wallet read under lock.
///
/// Returns the amount of the final compensating debit, or `None` when the
/// balance is already zero.
///
/// # Errors
///
/// Returns `Conflict` if the wallet is already closed.
pub fn plan_termination(
    wallet_id: WalletId,
    status: WalletStatus,
    balance: Decimal,
) -> Result<Option<Decimal>, WalletError> {
    if status == WalletStatus::Closed {
        return Err(WalletError::Conflict(format!(
            "wallet {wallet_id} is already closed"
        )));
    }
    Ok((balance > Decimal::ZERO).then_some(balance))
}

/// Checks that a wallet may be soft-deleted.
///
/// # Errors
///
/// Returns `Conflict` unless the wallet is closed with a zero balance.
pub fn ensure_can_delete(
    wallet_id: WalletId,
    status: WalletStatus,
    balance: Decimal,
) -> Result<(), WalletError> {
    if status != WalletStatus::Closed {
        return Err(WalletError::Conflict(format!(
            "wallet {wallet_id} must be terminated before deletion"
        )));
    }
    if !balance.is_zero() {
        return Err(WalletError::Conflict(format!(
            "wallet {wallet_id} still holds {balance}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::ledger::MAX_BALANCE;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn input() -> CreateWalletInput {
        CreateWalletInput {
            customer_id: Some(CustomerId::new()),
            currency: "usd".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_defaults() {
        let wallet = validate_create(input()).unwrap();
        assert_eq!(wallet.currency.as_str(), "USD");
        assert_eq!(wallet.wallet_type, WalletType::Prepaid);
        assert_eq!(wallet.name, "Prepaid Wallet - USD");
        assert_eq!(wallet.metadata, json!({}));
        assert!(!wallet.auto_top_up.enabled);
    }

    #[test]
    fn test_create_promotional_name() {
        let wallet = validate_create(CreateWalletInput {
            wallet_type: WalletType::Promotional,
            currency: "eur".into(),
            ..input()
        })
        .unwrap();
        assert_eq!(wallet.name, "Promotional Wallet - EUR");
    }

    #[test]
    fn test_create_requires_customer() {
        let err = validate_create(CreateWalletInput {
            customer_id: None,
            ..input()
        })
        .unwrap_err();
        assert!(matches!(err, WalletError::Validation(_)));
    }

    #[test]
    fn test_create_rejects_bad_currency() {
        for currency in ["", "US", "DOLLAR", "12$"] {
            let err = validate_create(CreateWalletInput {
                currency: currency.into(),
                ..input()
            })
            .unwrap_err();
            assert!(matches!(err, WalletError::Validation(_)), "{currency}");
        }
    }

    #[test]
    fn test_create_rejects_non_positive_initial_credit() {
        let err = validate_create(CreateWalletInput {
            initial_credit: Some(dec!(0)),
            ..input()
        })
        .unwrap_err();
        assert!(matches!(err, WalletError::Validation(_)));
    }

    #[test]
    fn test_auto_top_up_rules() {
        let enabled = |threshold, amount| AutoTopUpConfig {
            enabled: true,
            threshold,
            top_up_amount: amount,
        };
        assert!(validate_auto_top_up(&enabled(dec!(10), dec!(50))).is_ok());
        assert!(validate_auto_top_up(&enabled(dec!(0), dec!(50))).is_ok());
        assert!(validate_auto_top_up(&enabled(dec!(-1), dec!(50))).is_err());
        assert!(validate_auto_top_up(&enabled(dec!(10), dec!(0))).is_err());
        assert!(validate_auto_top_up(&AutoTopUpConfig::default()).is_ok());
    }

    #[test]
    fn test_auto_top_up_threshold_bounds() {
        let with = |enabled, threshold, amount| AutoTopUpConfig {
            enabled,
            threshold,
            top_up_amount: amount,
        };
        let too_large = MAX_BALANCE + dec!(1);
        assert!(validate_auto_top_up(&with(true, MAX_BALANCE, dec!(1))).is_ok());
        assert!(matches!(
            validate_auto_top_up(&with(true, too_large, dec!(1))),
            Err(WalletError::Validation(_))
        ));
        assert!(validate_auto_top_up(&with(true, dec!(0.123456789), dec!(1))).is_err());
        assert!(validate_auto_top_up(&with(true, dec!(10), dec!(0.123456789))).is_err());

        // Disabled configs are stored as-is, so they must still fit the column.
        assert!(validate_auto_top_up(&with(false, too_large, dec!(0))).is_err());
        assert!(validate_auto_top_up(&with(false, dec!(5), too_large)).is_err());
        assert!(validate_auto_top_up(&with(false, dec!(5), dec!(0))).is_ok());
    }

    #[test]
    fn test_update_closed_wallet_conflicts() {
        let update = UpdateWalletInput {
            name: Some("New".into()),
            ..Default::default()
        };
        let err = validate_update(WalletId::new(), WalletStatus::Closed, &update).unwrap_err();
        assert!(matches!(err, WalletError::Conflict(_)));
        assert!(validate_update(WalletId::new(), WalletStatus::Active, &update).is_ok());
    }

    #[test]
    fn test_update_rejects_empty_and_bad_metadata() {
        let id = WalletId::new();
        assert!(validate_update(id, WalletStatus::Active, &UpdateWalletInput::default()).is_err());
        let update = UpdateWalletInput {
            metadata: Some(json!("scalar")),
            ..Default::default()
        };
        assert!(validate_update(id, WalletStatus::Active, &update).is_err());
    }

    #[test]
    fn test_plan_termination() {
        let id = WalletId::new();
        assert_eq!(plan_termination(id, WalletStatus::Active, dec!(70)).unwrap(), Some(dec!(70)));
        assert_eq!(plan_termination(id, WalletStatus::Active, dec!(0)).unwrap(), None);
        assert!(matches!(
            plan_termination(id, WalletStatus::Closed, dec!(0)),
            Err(WalletError::Conflict(_))
        ));
    }

    #[test]
    fn test_delete_requires_closed_and_empty() {
        let id = WalletId::new();
        assert!(ensure_can_delete(id, WalletStatus::Active, dec!(0)).is_err());
        assert!(ensure_can_delete(id, WalletStatus::Closed, dec!(1)).is_err());
        assert!(ensure_can_delete(id, WalletStatus::Closed, dec!(0)).is_ok());
    }
}
