//! Request-tracking middleware.
//!
//! Sets the memory gauge when a request starts and again when it ends, and
//! records the request counter and duration histogram once, after the
//! response is produced, with the final status code. The `endpoint` label is
//! the matched route pattern, never the raw path, so label cardinality stays
//! bounded by the routing table.

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::state::SharedState;

/// Label used for requests that matched no route.
pub const UNMATCHED_ENDPOINT: &str = "unmatched";

/// Route pattern of a request, or [`UNMATCHED_ENDPOINT`].
pub fn endpoint_label(req: &Request) -> String {
    req.extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ENDPOINT.to_string())
}

fn record_memory(state: &SharedState) {
    if let Some(bytes) = state.sampler.memory_usage_bytes() {
        state.metrics.record_memory_usage_best_effort(bytes);
    }
}

pub async fn track_requests(State(state): State<SharedState>, req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let endpoint = endpoint_label(&req);
    record_memory(&state);

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let duration = start.elapsed();
    // Store writes may wait on a file lock; keep them off the async workers
    let state_clone = state.clone();
    tokio::task::spawn_blocking(move || {
        state_clone
            .metrics
            .record_request_best_effort(&method, &endpoint, status, duration);
        record_memory(&state_clone);
    });

    response
}
