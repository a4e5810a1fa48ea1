use std::sync::Arc;
use xrdeck_core::Config;
use xrdeck_infra::{FixedWindowRateLimiter, RateLimitConfig};
use xrdeck_ingest::IngestionPipeline;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub pipeline: Arc<IngestionPipeline>,
    pub rate_limiter: Arc<FixedWindowRateLimiter>,
    /// Budget applied per client and route on the import endpoint
    pub ingest_rate_limit: RateLimitConfig,
}
