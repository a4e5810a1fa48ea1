//! xrdeck Infrastructure Library
//!
//! Shared infrastructure used by the API server:
//! - Middleware (request ID)
//! - Telemetry initialization
//! - Fixed-window rate limiting

#[cfg(feature = "middleware")]
pub mod middleware;

#[cfg(feature = "observability-basic")]
pub mod telemetry;

#[cfg(feature = "rate-limit")]
pub mod rate_limit;

// Re-export commonly used types
#[cfg(feature = "middleware")]
pub use middleware::{get_request_id, request_id_middleware, RequestId};

#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, LogFormat};

#[cfg(feature = "rate-limit")]
pub use rate_limit::{FixedWindowRateLimiter, RateLimitConfig, RateLimitDecision};
