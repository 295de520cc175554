//! API configuration.
//!
//! ## Sources (later wins)
//! 1. Defaults (this file)
//! 2. `stockline.toml` in the working directory, if present
//! 3. Environment variables `STOCKLINE__*`, e.g. `STOCKLINE__BIND_ADDRESS`,
//!    `STOCKLINE__POLICY__PARTIAL_DELIVERY=explicit_close`

use std::path::PathBuf;

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::Deserialize;
use stockline_core::LedgerPolicy;
use stockline_db::DbConfig;

const CONFIG_FILE: &str = "stockline";
const ENV_PREFIX: &str = "STOCKLINE";
const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Socket address the HTTP server binds to.
    pub bind_address: String,

    /// SQLite database file. Defaults to the platform data directory.
    pub database_path: Option<PathBuf>,

    pub max_connections: u32,

    /// Partial delivery, negative counts and default pricing modes.
    #[serde(default)]
    pub policy: LedgerPolicy,
}

impl ApiConfig {
    /// Loads configuration from defaults, file and environment.
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("bind_address", DEFAULT_BIND_ADDRESS)?
            .set_default("max_connections", i64::from(DEFAULT_MAX_CONNECTIONS))?
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let api_config: ApiConfig = config.try_deserialize()?;

        if api_config.max_connections == 0 {
            return Err(ConfigError::InvalidValue("max_connections".to_string()));
        }

        Ok(api_config)
    }

    /// The database file, falling back to `<data dir>/stockline.db`.
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }

        let dirs = ProjectDirs::from("com", "stockline", "stockline").ok_or(ConfigError::NoDataDir)?;
        std::fs::create_dir_all(dirs.data_dir())
            .map_err(|e| ConfigError::InvalidValue(format!("database_path: {}", e)))?;
        Ok(dirs.data_dir().join("stockline.db"))
    }

    pub fn db_config(&self) -> Result<DbConfig, ConfigError> {
        Ok(DbConfig::new(self.database_path()?)
            .max_connections(self.max_connections)
            .policy(self.policy))
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("No platform data directory; set STOCKLINE__DATABASE_PATH")]
    NoDataDir,
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockline_core::policy::{NegativeCountPolicy, PartialDeliveryPolicy};

    #[test]
    fn test_policy_section_deserializes() {
        let config: ApiConfig = Config::builder()
            .set_default("bind_address", DEFAULT_BIND_ADDRESS)
            .unwrap()
            .set_default("max_connections", 2)
            .unwrap()
            .add_source(File::from_str(
                r#"
                database_path = "/tmp/stockline-test.db"

                [policy]
                partial_delivery = "explicit_close"
                negative_count = "clamp_to_zero"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.policy.partial_delivery, PartialDeliveryPolicy::ExplicitClose);
        assert_eq!(config.policy.negative_count, NegativeCountPolicy::ClampToZero);
        assert_eq!(config.max_connections, 2);
        assert_eq!(
            config.database_path().unwrap(),
            PathBuf::from("/tmp/stockline-test.db")
        );
    }

    #[test]
    fn test_policy_defaults_when_absent() {
        let config: ApiConfig = Config::builder()
            .set_default("bind_address", DEFAULT_BIND_ADDRESS)
            .unwrap()
            .set_default("max_connections", i64::from(DEFAULT_MAX_CONNECTIONS))
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.policy, LedgerPolicy::default());
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
    }
}
