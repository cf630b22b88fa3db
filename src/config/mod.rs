/// Database connection management and schema creation
pub mod database;

/// Application settings loading from config.toml
pub mod settings;

pub use settings::{AppConfig, DatabaseConfig, RewardsConfig, StorageBackend};
