//! HTTP server - the poll endpoint plus health and metrics
//!
//! The poll contract: `GET /?since=<float epoch seconds>` returns every
//! buffered hit newer than `since`, together with the server's current
//! time, which a well-behaved poller echoes back as its next `since`.
//! Callers never see an error response; a missing or unparseable `since`
//! falls back to a short default lookback.

use crate::buffer::SlidingBuffer;
use crate::hit::{Hit, epoch_seconds};
use crate::metrics;
use axum::{
    Json, Router,
    extract::{RawQuery, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use serde::Serialize;
use std::sync::Arc;

/// Shared state injected into every handler
#[derive(Clone)]
pub struct AppState {
    pub buffer: Arc<SlidingBuffer>,
    /// Lookback for first-time callers with no `since`, in seconds
    pub default_lookback: f64,
}

/// Build the router for the public endpoint.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(poll_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct PollResponse {
    since: f64,
    hits: Vec<Hit>,
}

/// Handler for the poll endpoint
///
/// One wall-clock reading serves as the eviction cutoff, the query bound
/// and the returned `since`, so consecutive polls that echo it back see
/// every hit exactly from where the previous poll left off. The raw query
/// string is parsed by hand: any malformed input degrades to the default
/// lookback instead of a rejection.
async fn poll_handler(State(state): State<AppState>, RawQuery(query): RawQuery) -> impl IntoResponse {
    let now = epoch_seconds();

    let since = query
        .as_deref()
        .and_then(parse_since)
        .filter(|s| s.is_finite())
        .unwrap_or(now - state.default_lookback);

    let hits = state.buffer.query_at(now, since);
    metrics::try_count_poll();
    metrics::try_set_buffer_size(state.buffer.len());

    (
        StatusCode::OK,
        [(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
        Json(PollResponse { since: now, hits }),
    )
}

/// Pull a float `since` out of a raw query string.
fn parse_since(query: &str) -> Option<f64> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key == "since" { value.parse().ok() } else { None }
    })
}

/// Handler for /health
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Handler for /metrics
async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics::gather(),
    )
}
