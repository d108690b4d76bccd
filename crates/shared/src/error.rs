//! Application-wide error types.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Boot-time errors.
///
/// Request-path failures use the wallet error taxonomy in `tally-core`; this
/// enum only covers what can go wrong before the server accepts traffic.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}
