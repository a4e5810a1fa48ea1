//! API constants

/// Versioned prefix used by every API route
pub const API_PREFIX: &str = "/api/v0";

/// Archive import endpoint, relative to [`API_PREFIX`]
pub const XR_IMPORT_PATH: &str = "/products/xr-import";

/// Where the OpenAPI document is served
pub const OPENAPI_JSON_PATH: &str = "/api/openapi.json";

/// Server-level cap on in-flight requests
pub const HTTP_CONCURRENCY_LIMIT: usize = 1024;

/// Rate-limit response headers
pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

/// Full path of the import endpoint.
pub fn xr_import_route() -> String {
    format!("{}{}", API_PREFIX, XR_IMPORT_PATH)
}
