//! Health check endpoint handler.
//!
//! `/health` probes the configured dependencies and checks disk space.
//! It answers 200 while the overall status is `UP` and 503 otherwise.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::{debug, instrument};

use crate::collect::current_health;
use crate::state::SharedState;

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");

    let sample = state.sampler.sample();
    let (_, health) = current_health(&state, &sample).await;

    let status = if health.is_up() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    debug!("Health check: {}", health.status.as_str());
    (status, Json(health.to_json()))
}
