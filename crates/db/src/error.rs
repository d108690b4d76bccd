//! Mapping of database failures onto the wallet error taxonomy.

use sea_orm::{DbErr, RuntimeErr};
use tally_core::wallet::WalletError;

/// `lock_not_available`: `lock_timeout` expired while waiting on a row lock.
pub const LOCK_NOT_AVAILABLE: &str = "55P03";
/// `serialization_failure`.
pub const SERIALIZATION_FAILURE: &str = "40001";
/// `deadlock_detected`.
pub const DEADLOCK_DETECTED: &str = "40P01";
/// `query_canceled`: `statement_timeout` expired.
pub const QUERY_CANCELED: &str = "57014";
/// `unique_violation`.
pub const UNIQUE_VIOLATION: &str = "23505";
/// `check_violation`.
pub const CHECK_VIOLATION: &str = "23514";

/// Returns the Postgres SQLSTATE carried by an error, if any.
#[must_use]
pub fn sqlstate(err: &DbErr) -> Option<String> {
    let runtime = match err {
        DbErr::Exec(e) | DbErr::Query(e) | DbErr::Conn(e) => e,
        _ => return None,
    };
    match runtime {
        RuntimeErr::SqlxError(e) => e
            .as_database_error()
            .and_then(|db| db.code())
            .map(|code| code.into_owned()),
        RuntimeErr::Internal(_) => None,
    }
}

/// Returns true if the error is a unique-constraint violation.
#[must_use]
pub fn is_unique_violation(err: &DbErr) -> bool {
    sqlstate(err).as_deref() == Some(UNIQUE_VIOLATION)
}

fn is_connection_failure(err: &DbErr) -> bool {
    match err {
        DbErr::ConnectionAcquire(_) => true,
        DbErr::Conn(RuntimeErr::SqlxError(e))
        | DbErr::Exec(RuntimeErr::SqlxError(e))
        | DbErr::Query(RuntimeErr::SqlxError(e)) => matches!(
            e,
            sqlx::Error::Io(_)
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::WorkerCrashed
        ),
        _ => false,
    }
}

/// Classifies a database error.
///
/// Lock timeouts, serialization failures, deadlocks, statement timeouts and
/// connection failures are `Transient`; constraint violations are `Conflict`;
/// everything else is `Database`.
#[must_use]
pub fn classify(err: DbErr) -> WalletError {
    if is_connection_failure(&err) {
        return WalletError::Transient(format!("connection failure: {err}"));
    }
    match sqlstate(&err).as_deref() {
        Some(LOCK_NOT_AVAILABLE) => WalletError::Transient("timed out waiting for wallet lock".into()),
        Some(SERIALIZATION_FAILURE) => WalletError::Transient("serialization failure".into()),
        Some(DEADLOCK_DETECTED) => WalletError::Transient("deadlock detected".into()),
        Some(QUERY_CANCELED) => WalletError::Transient("statement timed out".into()),
        Some(code) if code.starts_with("08") => {
            WalletError::Transient(format!("connection exception {code}"))
        }
        Some(UNIQUE_VIOLATION) => WalletError::Conflict(format!("duplicate record: {err}")),
        Some(CHECK_VIOLATION) => WalletError::Conflict(format!("constraint violated: {err}")),
        _ => WalletError::Database(err.to_string()),
    }
}

/// Converts `Result<T, DbErr>` into the wallet error taxonomy.
pub trait DbResultExt<T> {
    /// Maps the error with [`classify`].
    ///
    /// # Errors
    ///
    /// Returns the classified error.
    fn map_db(self) -> Result<T, WalletError>;
}

impl<T> DbResultExt<T> for Result<T, DbErr> {
    fn map_db(self) -> Result<T, WalletError> {
        self.map_err(classify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_sql_errors_are_database_errors() {
        let err = classify(DbErr::Custom("boom".into()));
        assert!(matches!(err, WalletError::Database(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_record_not_found_has_no_sqlstate() {
        assert_eq!(sqlstate(&DbErr::RecordNotFound("w".into())), None);
        assert!(!is_unique_violation(&DbErr::RecordNotFound("w".into())));
    }

    #[test]
    fn test_connection_acquire_is_transient() {
        let err = classify(DbErr::ConnectionAcquire(sea_orm::ConnAcquireErr::Timeout));
        assert!(err.is_retryable());
    }
}
