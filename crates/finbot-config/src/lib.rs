//! Configuration management for finbot
//!
//! This module handles loading, validation, and management of
//! finbot configuration from YAML files.

pub mod error;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use error::ConfigError;

// ==================== Configuration Types ====================

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
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
    8085
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./finbot.db")
}

/// Authentication and session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Session token lifetime in hours
    #[serde(default = "default_token_ttl")]
    pub token_ttl_hours: i64,
    /// Minimum accepted password length
    #[serde(default = "default_min_password_len")]
    pub min_password_len: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl_hours: default_token_ttl(),
            min_password_len: default_min_password_len(),
        }
    }
}

fn default_token_ttl() -> i64 {
    72
}

fn default_min_password_len() -> usize {
    8
}

/// Pagination settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Records per page for lists
    #[serde(default = "default_records_per_page")]
    pub records_per_page: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            records_per_page: default_records_per_page(),
        }
    }
}

fn default_records_per_page() -> usize {
    50
}

/// Forecast engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Default Monte Carlo iteration count
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Hard cap on iteration count accepted from the API
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Default forecast horizon in months
    #[serde(default = "default_horizon")]
    pub horizon_months: u32,
    /// Hard cap on horizon accepted from the API
    #[serde(default = "default_max_horizon")]
    pub max_horizon_months: u32,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            max_iterations: default_max_iterations(),
            horizon_months: default_horizon(),
            max_horizon_months: default_max_horizon(),
        }
    }
}

fn default_iterations() -> u32 {
    1000
}

fn default_max_iterations() -> u32 {
    20_000
}

fn default_horizon() -> u32 {
    12
}

fn default_max_horizon() -> u32 {
    60
}

/// Currency and number formatting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyConfig {
    /// Default currency for new teams
    #[serde(default = "default_currency")]
    pub default_currency: String,
    /// Number of decimal places
    #[serde(default = "default_decimal_places")]
    pub decimal_places: u32,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            default_currency: default_currency(),
            decimal_places: default_decimal_places(),
        }
    }
}

fn default_currency() -> String {
    "TRY".to_string()
}

fn default_decimal_places() -> u32 {
    2
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Database settings
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Authentication settings
    #[serde(default)]
    pub auth: AuthConfig,
    /// Pagination settings
    #[serde(default)]
    pub pagination: PaginationConfig,
    /// Forecast engine settings
    #[serde(default)]
    pub forecast: ForecastConfig,
    /// Currency settings
    #[serde(default)]
    pub currency: CurrencyConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: PathBuf) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound {
                    path: path.to_string_lossy().to_string(),
                }
            } else {
                ConfigError::IoError
            }
        })?;

        let config: Config =
            serde_yaml::from_str(&content).map_err(|_| ConfigError::InvalidYaml)?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                reason: "Port must be greater than 0".to_string(),
            });
        }

        if self.auth.token_ttl_hours <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "auth.token_ttl_hours".to_string(),
                reason: "Token lifetime must be positive".to_string(),
            });
        }

        if self.forecast.iterations == 0 || self.forecast.iterations > self.forecast.max_iterations
        {
            return Err(ConfigError::InvalidValue {
                field: "forecast.iterations".to_string(),
                reason: format!(
                    "Iterations must be between 1 and {}",
                    self.forecast.max_iterations
                ),
            });
        }

        if self.forecast.horizon_months == 0
            || self.forecast.horizon_months > self.forecast.max_horizon_months
        {
            return Err(ConfigError::InvalidValue {
                field: "forecast.horizon_months".to_string(),
                reason: format!(
                    "Horizon must be between 1 and {} months",
                    self.forecast.max_horizon_months
                ),
            });
        }

        if self.currency.decimal_places > 10 {
            return Err(ConfigError::InvalidValue {
                field: "currency.decimal_places".to_string(),
                reason: "Decimal places must be between 0 and 10".to_string(),
            });
        }

        Ok(())
    }

    /// Generate a default configuration file
    pub fn generate_default() -> &'static str {
        include_str!("../templates/default_config.yaml")
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 8085);
        assert_eq!(config.currency.default_currency, "TRY");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_default_template_parses() {
        let config: Config = serde_yaml::from_str(Config::generate_default()).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "server:\n  port: 9000\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.forecast.iterations, 1000);
    }

    #[test]
    fn test_invalid_port_rejected() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_excessive_iterations_rejected() {
        let mut config = Config::default();
        config.forecast.iterations = config.forecast.max_iterations + 1;
        assert!(config.validate().is_err());
    }
}
