//! Ledger configuration.

use std::time::Duration;

use crate::db::timeouts::DEFAULT_TRANSACTION_TIMEOUT;

/// Ledger service configuration
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Number of entries returned by `recent_transactions`
    pub recent_limit: i64,

    /// Upper bound on a single storage unit of work
    pub operation_timeout: Duration,

    /// Maximum accepted payout reference length (bytes)
    pub max_payout_reference_len: usize,
}

impl LedgerConfig {
    /// Create configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `LEDGER_RECENT_LIMIT`: Recent transaction window (default: 10)
    /// - `LEDGER_OPERATION_TIMEOUT_SECS`: Storage timeout in seconds (default: 10)
    /// - `LEDGER_MAX_PAYOUT_REFERENCE_LEN`: Payout reference limit (default: 128)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a loaded value fails validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            recent_limit: parse_env_or("LEDGER_RECENT_LIMIT", 10),
            operation_timeout: Duration::from_secs(parse_env_or(
                "LEDGER_OPERATION_TIMEOUT_SECS",
                10,
            )),
            max_payout_reference_len: parse_env_or("LEDGER_MAX_PAYOUT_REFERENCE_LEN", 128),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recent_limit <= 0 {
            return Err(ConfigError::Invalid {
                var: "LEDGER_RECENT_LIMIT".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.operation_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "LEDGER_OPERATION_TIMEOUT_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.max_payout_reference_len == 0 {
            return Err(ConfigError::Invalid {
                var: "LEDGER_MAX_PAYOUT_REFERENCE_LEN".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            recent_limit: 10,
            operation_timeout: DEFAULT_TRANSACTION_TIMEOUT,
            max_payout_reference_len: 128,
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse environment variable with default fallback
pub(crate) fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
