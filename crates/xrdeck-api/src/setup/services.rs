//! Service wiring

use crate::state::AppState;
use std::sync::Arc;
use std::time::Duration;
use xrdeck_core::Config;
use xrdeck_db::ProductRecordStore;
use xrdeck_infra::{FixedWindowRateLimiter, RateLimitConfig};
use xrdeck_ingest::IngestionPipeline;
use xrdeck_storage::Storage;

/// Build the shared state and start the rate-limit sweeper.
///
/// Must be called inside a Tokio runtime.
pub fn initialize_services(
    config: &Config,
    storage: Arc<dyn Storage>,
    products: Arc<dyn ProductRecordStore>,
) -> Arc<AppState> {
    let ingest = config.ingest();

    let pipeline = Arc::new(IngestionPipeline::new(storage, products, ingest.clone()));

    let ingest_rate_limit = RateLimitConfig::new(
        ingest.rate_limit_max_requests,
        Duration::from_secs(ingest.rate_limit_window_secs),
    );
    let rate_limiter = Arc::new(FixedWindowRateLimiter::new());
    let sweep_interval = Duration::from_secs(ingest.rate_limit_sweep_interval_secs.max(1));
    // Detached: the sweeper ends with the runtime.
    let _sweeper = rate_limiter.spawn_sweeper(sweep_interval);

    tracing::info!(
        max_requests = ingest_rate_limit.max_requests,
        window_secs = ingest.rate_limit_window_secs,
        sweep_interval_secs = sweep_interval.as_secs(),
        batch_size = ingest.batch_size,
        max_retries = ingest.max_retries,
        "Ingestion services initialized"
    );

    Arc::new(AppState {
        config: config.clone(),
        pipeline,
        rate_limiter,
        ingest_rate_limit,
    })
}
