//! Wallet error taxonomy.
//!
//! Every wallet operation fails with one of these variants. Callers decide
//! on retries with [`WalletError::is_retryable`]: only `Transient` failures
//! may be re-run, and only as a whole operation.

use rust_decimal::Decimal;
use tally_shared::types::WalletId;
use thiserror::Error;

/// Errors that can occur during wallet operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    // ========== Rejected before any I/O ==========
    /// Input failed validation (non-positive amount, missing identifiers, bad currency).
    #[error("Validation error: {0}")]
    Validation(String),

    // ========== Lookup ==========
    /// The referenced entity does not exist for this tenant.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity (`wallet`, `transaction`, `settlement`).
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    // ========== Business rules ==========
    /// A debit would drive the balance below zero.
    #[error("Insufficient balance in wallet {wallet_id}: balance {balance}, requested {requested}")]
    InsufficientBalance {
        /// Wallet that was debited.
        wallet_id: WalletId,
        /// Balance observed under the row lock.
        balance: Decimal,
        /// Requested debit amount.
        requested: Decimal,
    },

    /// The wallet state does not allow the operation (closed, duplicate, key reuse).
    #[error("Conflict: {0}")]
    Conflict(String),

    // ========== Infrastructure ==========
    /// Lock timeout, serialization failure, deadlock or connection loss.
    #[error("Transient error, retry the operation: {0}")]
    Transient(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WalletError {
    /// Builds a `NotFound` for a wallet.
    #[must_use]
    pub fn wallet_not_found(wallet_id: WalletId) -> Self {
        Self::NotFound {
            entity: "wallet",
            id: wallet_id.to_string(),
        }
    }

    /// Builds a `NotFound` for any entity kind.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::Conflict(_) => "CONFLICT",
            Self::Transient(_) => "TRANSIENT_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Self::Validation(_) => 400,
            // 404 Not Found
            Self::NotFound { .. } => 404,
            // 409 Conflict
            Self::Conflict(_) => 409,
            // 422 Unprocessable - terminal business rule
            Self::InsufficientBalance { .. } => 422,
            // 503 Service Unavailable - safe to retry
            Self::Transient(_) => 503,
            // 500 Internal Server Error
            Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns true if the whole operation may be safely re-run.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
