//! Pure rules of the ledger operation executor.
//!
//! The database layer locks the wallet row, then calls into this module to
//! validate the request and compute the new balance. Nothing here performs
//! I/O, so the same rules are exercised by property tests.

use rust_decimal::Decimal;
use tally_shared::types::money::fits_amount_scale;
use tally_shared::types::WalletId;

use super::error::WalletError;
use super::types::{LedgerOperation, TransactionType, WalletStatus, WalletTransaction};

/// Largest value a `NUMERIC(20, 8)` column holds.
pub const MAX_BALANCE: Decimal = Decimal::from_parts(0x630F_FFFF, 0x6BC7_5E2D, 0x5, false, 8);

/// Longest accepted idempotency key or reference id.
pub const MAX_KEY_LEN: usize = 255;

/// Balance transition produced by one ledger operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceChange {
    /// Balance read under the row lock.
    pub balance_before: Decimal,
    /// Balance to persist.
    pub balance_after: Decimal,
    /// Absolute amount moved.
    pub amount: Decimal,
}

impl BalanceChange {
    /// Computes the balance after applying `amount` in direction `transaction_type`.
    ///
    /// # Errors
    ///
    /// - `InsufficientBalance` if a debit would make the balance negative.
    /// - `Validation` if a credit would overflow the balance column.
    pub fn compute(
        wallet_id: WalletId,
        current: Decimal,
        transaction_type: TransactionType,
        amount: Decimal,
    ) -> Result<Self, WalletError> {
        let balance_after = current
            .checked_add(transaction_type.signed(amount))
            .filter(|after| *after <= MAX_BALANCE)
            .ok_or_else(|| {
                WalletError::Validation(format!(
                    "credit of {amount} would exceed the maximum wallet balance"
                ))
            })?;

        if balance_after < Decimal::ZERO {
            return Err(WalletError::InsufficientBalance {
                wallet_id,
                balance: current,
                requested: amount,
            });
        }

        Ok(Self {
            balance_before: current,
            balance_after,
            amount,
        })
    }
}

/// Validates an operation before any storage access.
///
/// # Errors
///
/// Returns `Validation` for a non-positive or over-precise amount, an empty or
/// over-long reference id or idempotency key, non-object metadata, or a debit
/// with an expiry.
pub fn validate_operation(op: &LedgerOperation) -> Result<(), WalletError> {
    validate_amount(op.amount)?;

    if op.reference_id.trim().is_empty() {
        return Err(WalletError::Validation("reference_id is required".into()));
    }
    if op.reference_id.len() > MAX_KEY_LEN {
        return Err(WalletError::Validation(format!(
            "reference_id must be at most {MAX_KEY_LEN} characters"
        )));
    }

    if let Some(key) = &op.idempotency_key {
        if key.trim().is_empty() || key.len() > MAX_KEY_LEN {
            return Err(WalletError::Validation(format!(
                "idempotency_key must be 1 to {MAX_KEY_LEN} characters"
            )));
        }
    }

    if let Some(metadata) = &op.metadata {
        if !metadata.is_object() {
            return Err(WalletError::Validation("metadata must be a JSON object".into()));
        }
    }

    if op.expires_at.is_some() && op.transaction_type == TransactionType::Debit {
        return Err(WalletError::Validation("only credits can expire".into()));
    }

    Ok(())
}

/// Validates a monetary amount supplied by a caller.
///
/// # Errors
///
/// Returns `Validation` unless `0 < amount <= MAX_BALANCE` with at most eight decimals.
pub fn validate_amount(amount: Decimal) -> Result<(), WalletError> {
    if amount <= Decimal::ZERO {
        return Err(WalletError::Validation(format!(
            "amount must be positive, got {amount}"
        )));
    }
    if amount > MAX_BALANCE {
        return Err(WalletError::Validation(format!("amount {amount} is too large")));
    }
    if !fits_amount_scale(amount) {
        return Err(WalletError::Validation(format!(
            "amount {amount} has more than 8 decimal places"
        )));
    }
    Ok(())
}

/// Validates a configured limit such as a threshold, where zero is allowed.
///
/// # Errors
///
/// Returns `Validation` unless `0 <= value <= MAX_BALANCE` with at most eight decimals.
pub fn validate_limit(field: &str, value: Decimal) -> Result<(), WalletError> {
    if value < Decimal::ZERO {
        return Err(WalletError::Validation(format!("{field} must not be negative")));
    }
    if value > MAX_BALANCE {
        return Err(WalletError::Validation(format!("{field} {value} is too large")));
    }
    if !fits_amount_scale(value) {
        return Err(WalletError::Validation(format!(
            "{field} {value} has more than 8 decimal places"
        )));
    }
    Ok(())
}

/// Rejects mutations on a wallet that is not active.
///
/// # Errors
///
/// Returns `Conflict` for a closed wallet.
pub fn ensure_can_transact(wallet_id: WalletId, status: WalletStatus) -> Result<(), WalletError> {
    match status {
        WalletStatus::Active => Ok(()),
        WalletStatus::Closed => Err(WalletError::Conflict(format!(
            "wallet {wallet_id} is closed"
        ))),
    }
}

/// Checks that a stored transaction found by idempotency key matches the new request.
///
/// A match means the request is a replay and the stored row is the answer.
///
/// # Errors
///
/// Returns `Conflict` if the key was used for a different type or amount.
pub fn check_replay(existing: &WalletTransaction, op: &LedgerOperation) -> Result<(), WalletError> {
    if existing.transaction_type == op.transaction_type && existing.amount == op.amount {
        Ok(())
    } else {
        Err(WalletError::Conflict(format!(
            "idempotency key already used for a {} of {}",
            existing.transaction_type, existing.amount
        )))
    }
}
