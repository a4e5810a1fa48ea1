//! Product store setup

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use xrdeck_core::Config;
use xrdeck_db::{InMemoryProductStore, PgProductRepository, ProductRecordStore};

const DB_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Connect to PostgreSQL when `DATABASE_URL` is set, otherwise keep product
/// records in memory.
pub async fn setup_product_store(config: &Config) -> Result<Arc<dyn ProductRecordStore>> {
    let Some(database_url) = config.database_url() else {
        tracing::warn!(
            "DATABASE_URL not set, product records are kept in memory and lost on restart"
        );
        return Ok(Arc::new(InMemoryProductStore::new()));
    };

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections())
        .acquire_timeout(Duration::from_secs(DB_ACQUIRE_TIMEOUT_SECS))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!(
        max_connections = config.db_max_connections(),
        "Database connected successfully"
    );

    Ok(Arc::new(PgProductRepository::new(pool)))
}
