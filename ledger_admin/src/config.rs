//! Operator configuration management.
//!
//! Consolidates all environment variable reads and command line overrides
//! into one validated configuration.

use coin_ledger::db::DatabaseConfig;
use coin_ledger::ledger::{ConfigError, LedgerConfig};

/// Fallback operator id recorded on resolved redemptions
const DEFAULT_ADMIN_ID: &str = "ledger_admin";

/// Complete operator configuration
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// Database configuration
    pub database: DatabaseConfig,
    /// Ledger behaviour
    pub ledger: LedgerConfig,
    /// Identity recorded as `resolved_by` on approvals and rejections
    pub admin_id: String,
}

impl AdminConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `database_url_override` - Optional database URL (from `--db-url`)
    /// * `admin_override` - Optional operator id (from `--admin`)
    ///
    /// # Errors
    ///
    /// Returns error if `DATABASE_URL` is missing without an override, or if
    /// any value fails validation
    pub fn from_env(
        database_url_override: Option<String>,
        admin_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let database = match database_url_override {
            Some(database_url) => DatabaseConfig::from_env_with_url(database_url)?,
            None => DatabaseConfig::from_env()?,
        };

        let admin_id = admin_override
            .or_else(|| std::env::var("LEDGER_ADMIN_ID").ok())
            .unwrap_or_else(|| DEFAULT_ADMIN_ID.to_string());

        let config = Self {
            database,
            ledger: LedgerConfig::from_env()?,
            admin_id,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate()?;
        self.ledger.validate()?;

        if self.admin_id.trim().is_empty() {
            return Err(ConfigError::Invalid {
                var: "LEDGER_ADMIN_ID".to_string(),
                reason: "Must not be blank".to_string(),
            });
        }

        Ok(())
    }
}
