//! Database configuration module.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the unique constraints on `tenants.slug` and `swagbucks_transactions.earn_key`
//! come straight from the entity attributes.

use super::settings::DatabaseConfig;
use crate::entities::{ListEntry, SwagBucksBalance, SwagBucksTransaction, Tenant};
use crate::errors::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::time::Duration;
use tracing::info;

/// Local database used when neither config.toml nor `DATABASE_URL` names one.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/swagstore.sqlite?mode=rwc";

/// Database URL from the `DATABASE_URL` environment variable, if set.
#[must_use]
pub fn database_url_override() -> Option<String> {
    std::env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty())
}

/// Establishes a pooled connection with fail-fast timeouts.
///
/// Store operations must not block indefinitely: a connection that cannot be
/// acquired within `acquire_timeout_secs` surfaces as `Error::StoreUnavailable`.
pub async fn create_connection(config: &DatabaseConfig) -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .max_connections(config.max_connections)
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    info!("Connected to database");
    Ok(db)
}

/// Creates all necessary database tables using `SeaORM`'s schema generation from entity
/// definitions.
///
/// Creation is idempotent (`IF NOT EXISTS`), so the binary can call this on every start.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let tenant_table = schema
        .create_table_from_entity(Tenant)
        .if_not_exists()
        .to_owned();
    let list_entry_table = schema
        .create_table_from_entity(ListEntry)
        .if_not_exists()
        .to_owned();
    let balance_table = schema
        .create_table_from_entity(SwagBucksBalance)
        .if_not_exists()
        .to_owned();
    let transaction_table = schema
        .create_table_from_entity(SwagBucksTransaction)
        .if_not_exists()
        .to_owned();

    db.execute(builder.build(&tenant_table)).await?;
    db.execute(builder.build(&list_entry_table)).await?;
    db.execute(builder.build(&balance_table)).await?;
    db.execute(builder.build(&transaction_table)).await?;

    Ok(())
}
