//! Rate-limit gate for the import endpoint
//!
//! Runs before the body is read, so a rejected request never reaches the
//! ingestion pipeline. There is no enforcement once the event stream is open.

use crate::constants::{
    RATE_LIMIT_LIMIT_HEADER, RATE_LIMIT_REMAINING_HEADER, RATE_LIMIT_RESET_HEADER,
};
use crate::error::HttpAppError;
use crate::state::AppState;
use crate::utils::ip_extraction::client_identity;
use axum::{
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use xrdeck_infra::RateLimitDecision;
use xrdeck_ingest::IngestError;

/// `{identity}:{route}`
pub fn rate_limit_key(identity: &str, route: &str) -> String {
    format!("{}:{}", identity, route)
}

fn apply_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(decision.limit));
    headers.insert(
        RATE_LIMIT_REMAINING_HEADER,
        HeaderValue::from(decision.remaining),
    );
    headers.insert(
        RATE_LIMIT_RESET_HEADER,
        HeaderValue::from(decision.retry_after_secs()),
    );
}

pub async fn ingest_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let identity = client_identity(
        request.headers(),
        peer.as_ref(),
        state.config.trusted_proxy_count(),
    );
    let key = rate_limit_key(&identity, &route);

    let decision = state
        .rate_limiter
        .check(&key, &state.ingest_rate_limit)
        .await;

    if !decision.allowed {
        tracing::warn!(
            client = %identity,
            route = %route,
            limit = decision.limit,
            retry_after_secs = decision.retry_after_secs(),
            "Ingestion rejected by rate limit"
        );
        return HttpAppError::from(IngestError::RateLimited {
            retry_after_secs: decision.retry_after_secs(),
            limit: decision.limit,
        })
        .into_response();
    }

    tracing::debug!(
        client = %identity,
        route = %route,
        remaining = decision.remaining,
        "Rate limit check passed"
    );

    let mut response = next.run(request).await;
    apply_headers(response.headers_mut(), &decision);
    response
}
