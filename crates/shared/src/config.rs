//! Application configuration management.

use serde::Deserialize;

use crate::error::{AppError, AppResult};

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Ledger executor configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Multi-wallet settlement configuration.
    #[serde(default)]
    pub settlement: SettlementConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Ledger executor configuration.
///
/// Bounds how long a request may wait on a wallet row lock and how often a
/// transient failure is retried.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// `lock_timeout` applied to every ledger transaction, in milliseconds.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    /// `statement_timeout` applied to every ledger transaction, in milliseconds.
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,
    /// Maximum retries of a whole operation after a transient failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Base delay of the exponential retry backoff, in milliseconds.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
            statement_timeout_ms: default_statement_timeout_ms(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

fn default_lock_timeout_ms() -> u64 {
    5_000
}

fn default_statement_timeout_ms() -> u64 {
    15_000
}

fn default_max_retries() -> usize {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    50
}

/// Multi-wallet settlement configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SettlementConfig {
    /// Wallet ordering used when a caller does not pick one
    /// (`oldest_first`, `promotional_first`, `prepaid_first`, `balance_optimized`).
    #[serde(default = "default_strategy")]
    pub default_strategy: String,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            default_strategy: default_strategy(),
        }
    }
}

fn default_strategy() -> String {
    "oldest_first".to_string()
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// Sources, later ones winning: `config/default`, `config/{RUN_MODE}`,
    /// then `TALLY__`-prefixed environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or is invalid.
    pub fn load() -> AppResult<Self> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("TALLY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let loaded: Self = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Checks cross-field constraints that serde defaults cannot express.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` describing the first invalid field.
    pub fn validate(&self) -> AppResult<()> {
        if self.database.url.trim().is_empty() {
            return Err(AppError::Config("database.url must not be empty".into()));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(AppError::Config(
                "database.min_connections exceeds database.max_connections".into(),
            ));
        }
        if self.ledger.lock_timeout_ms == 0 {
            return Err(AppError::Config("ledger.lock_timeout_ms must be positive".into()));
        }
        if self.ledger.statement_timeout_ms < self.ledger.lock_timeout_ms {
            return Err(AppError::Config(
                "ledger.statement_timeout_ms must be at least ledger.lock_timeout_ms".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AppConfig {
        AppConfig {
            server: ServerConfig::default(),
            database: DatabaseConfig {
                url: "postgres://localhost/tally".into(),
                max_connections: 10,
                min_connections: 1,
            },
            ledger: LedgerConfig::default(),
            settlement: SettlementConfig::default(),
        }
    }

    #[test]
    fn test_defaults() {
        let ledger = LedgerConfig::default();
        assert_eq!(ledger.lock_timeout_ms, 5_000);
        assert_eq!(ledger.statement_timeout_ms, 15_000);
        assert_eq!(ledger.max_retries, 3);
        assert_eq!(SettlementConfig::default().default_strategy, "oldest_first");
        assert_eq!(ServerConfig::default().port, 8080);
    }

    #[test]
    fn test_validate_ok() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_pool() {
        let mut config = sample();
        config.database.min_connections = 20;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_short_statement_timeout() {
        let mut config = sample();
        config.ledger.statement_timeout_ms = 100;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_load_from_environment() {
        temp_env::with_vars(
            [
                ("TALLY__DATABASE__URL", Some("postgres://env/tally")),
                ("TALLY__LEDGER__LOCK_TIMEOUT_MS", Some("250")),
                ("TALLY__SETTLEMENT__DEFAULT_STRATEGY", Some("prepaid_first")),
                ("RUN_MODE", Some("test-does-not-exist")),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.database.url, "postgres://env/tally");
                assert_eq!(config.ledger.lock_timeout_ms, 250);
                assert_eq!(config.settlement.default_strategy, "prepaid_first");
            },
        );
    }
}
