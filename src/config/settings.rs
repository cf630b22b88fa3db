//! Application configuration loading from config.toml
//!
//! Every section is optional; missing values fall back to the platform defaults
//! (10% earning rate, 500 SwagBucks cap per order, 50 SwagBucks minimum redemption,
//! document-backed tenant storage). `DATABASE_URL` in the environment overrides the
//! database URL from the file.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Connection settings for the transactional store
    pub database: DatabaseConfig,
    /// SwagBucks earning and redemption policy
    pub swagbucks: RewardsConfig,
    /// Which tenant storage shape to use
    pub tenants: TenantStorageConfig,
}

/// Connection settings for the transactional store
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database URL (`sqlite://...`)
    pub url: String,
    /// Seconds to wait when opening a new connection
    pub connect_timeout_secs: u64,
    /// Seconds to wait for a pooled connection before failing fast
    pub acquire_timeout_secs: u64,
    /// Upper bound on pooled connections
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: super::database::DEFAULT_DATABASE_URL.to_string(),
            connect_timeout_secs: 5,
            acquire_timeout_secs: 5,
            max_connections: 5,
        }
    }
}

/// SwagBucks earning and redemption policy
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RewardsConfig {
    /// Fraction of the order subtotal credited (0.10 = 10%)
    pub earning_rate: f64,
    /// Maximum SwagBucks credited for a single order
    pub max_earn_per_order: i64,
    /// Smallest redemption accepted
    pub minimum_redemption: i64,
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            earning_rate: 0.10,
            max_earn_per_order: 500,
            minimum_redemption: 50,
        }
    }
}

/// Tenant storage shape
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One row per tenant, transitions are single transactional updates
    #[default]
    Document,
    /// One list per status, transitions serialized per list key and journaled
    List,
}

/// Tenant storage configuration
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(default)]
pub struct TenantStorageConfig {
    /// Storage shape used by the lifecycle manager
    pub backend: StorageBackend,
}

/// Loads the application configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse {}: {e}", path_ref.display()),
    })
}

/// Loads the configuration the binary runs with.
///
/// Reads `path` when it exists (defaults otherwise), then applies the
/// `DATABASE_URL` override.
pub fn load_app_configuration<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    let mut config = if path_ref.exists() {
        load_config(path_ref)?
    } else {
        info!(
            "No configuration file at {}, using defaults",
            path_ref.display()
        );
        AppConfig::default()
    };

    if let Some(url) = super::database::database_url_override() {
        debug!("DATABASE_URL overrides the configured database");
        config.database.url = url;
    }

    config.swagbucks.validate()?;
    Ok(config)
}

impl RewardsConfig {
    /// Checks the policy values are usable.
    pub fn validate(&self) -> Result<()> {
        if !self.earning_rate.is_finite() || !(0.0..=1.0).contains(&self.earning_rate) {
            return Err(Error::Config {
                message: format!(
                    "earning_rate must be between 0 and 1, got {}",
                    self.earning_rate
                ),
            });
        }
        if self.max_earn_per_order < 0 {
            return Err(Error::Config {
                message: "max_earn_per_order cannot be negative".to_string(),
            });
        }
        if self.minimum_redemption < 1 {
            return Err(Error::Config {
                message: "minimum_redemption must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
