//! OpenAPI documentation

use utoipa::OpenApi;

use crate::error;
use crate::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "xrdeck API",
        version = "0.1.0",
        description = "Imports KeyShot XR archive exports into products. Progress is reported as a server-sent event stream. Versioned endpoints live under /api/v0/."
    ),
    paths(
        handlers::health::health_check,
        handlers::ingest::import_xr_archive,
    ),
    components(schemas(
        error::ErrorResponse,
        handlers::health::HealthResponse,
        handlers::ingest::StagedImportRequest,
        handlers::ingest::XrImportForm,
    )),
    tags(
        (name = "health", description = "Liveness"),
        (name = "products", description = "XR archive import")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_routes() {
        let spec = ApiDoc::openapi();
        assert!(spec.paths.paths.contains_key("/health"));
        assert!(spec.paths.paths.contains_key("/api/v0/products/xr-import"));
    }
}
