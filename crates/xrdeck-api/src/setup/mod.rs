//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod services;

use crate::state::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use xrdeck_core::Config;
use xrdeck_infra::LogFormat;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    config
        .validate()
        .context("Configuration validation failed")?;

    xrdeck_infra::init_telemetry(
        LogFormat::from_name(config.log_format()),
        env!("CARGO_PKG_VERSION"),
    )
    .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.environment(),
        "Configuration loaded and validated successfully"
    );

    let products = database::setup_product_store(&config).await?;

    let storage = xrdeck_storage::create_storage(&config)
        .await
        .context("Failed to initialize storage")?;
    tracing::info!(backend = %storage.backend_type(), "Storage initialized");

    let state = services::initialize_services(&config, storage, products);

    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
