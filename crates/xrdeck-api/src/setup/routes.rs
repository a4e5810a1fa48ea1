//! Route configuration and setup

use crate::api_doc::ApiDoc;
use crate::constants::{xr_import_route, HTTP_CONCURRENCY_LIMIT, OPENAPI_JSON_PATH};
use crate::handlers;
use crate::middleware::ingest_rate_limit_middleware;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;
use xrdeck_core::Config;
use xrdeck_infra::request_id_middleware;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;
    let max_body = config.max_request_body_bytes();

    // The gate is a route layer so it sees the matched path and runs before
    // the body is read.
    let ingest_routes = Router::new()
        .route(&xr_import_route(), post(handlers::ingest::import_xr_archive))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            ingest_rate_limit_middleware,
        ));

    let app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(OPENAPI_JSON_PATH, get(|| async { Json(ApiDoc::openapi()) }))
        .merge(ingest_routes)
        .merge(RapiDoc::new(OPENAPI_JSON_PATH).path("/docs"))
        .layer(ConcurrencyLimitLayer::new(HTTP_CONCURRENCY_LIMIT))
        .layer(DefaultBodyLimit::max(max_body))
        .layer(RequestBodyLimitLayer::new(max_body))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state);

    Ok(app)
}

/// Setup CORS configuration
fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];
    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}
