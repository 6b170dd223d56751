//! Metrics endpoint handler.
//!
//! `/metrics` runs one collection cycle and renders the registry either as
//! Prometheus text or as the JSON status report. The format comes from the
//! `format` query parameter, then the `Accept` header, then the configured
//! default. `endpoint=<key>` narrows the JSON report to one top-level key.

use axum::{
    extract::{Query, State},
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use herakles_app_metrics::{
    endpoint_not_found_body, negotiate_format, render_text, select_endpoint, OutputFormat,
    RegistryError, TEXT_CONTENT_TYPE,
};
use serde::Deserialize;
use std::time::Instant;
use tracing::{debug, error, instrument};

use crate::collect::{collect_cycle, status_report};
use crate::state::SharedState;

/// Query parameters accepted by `/metrics`.
#[derive(Debug, Default, Deserialize)]
pub struct MetricsQuery {
    pub format: Option<String>,
    pub endpoint: Option<String>,
}

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    StoreUnavailable(RegistryError),
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> Response {
        match self {
            MetricsError::StoreUnavailable(e) => {
                error!("Failed to read metrics: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "Metrics store unavailable").into_response()
            }
        }
    }
}

/// Handler for the /metrics endpoint.
#[instrument(skip(state, headers))]
pub async fn metrics_handler(
    State(state): State<SharedState>,
    Query(query): Query<MetricsQuery>,
    headers: HeaderMap,
) -> Result<Response, MetricsError> {
    let start = Instant::now();
    debug!("Processing /metrics request");

    let accept = headers.get(ACCEPT).and_then(|v| v.to_str().ok());
    let format = negotiate_format(query.format.as_deref(), accept, state.default_format);

    let response = match format {
        OutputFormat::Prometheus => {
            collect_cycle(&state.metrics, state.sampler.as_ref());
            let snapshot = state
                .registry
                .snapshot()
                .map_err(MetricsError::StoreUnavailable)?;
            ([(CONTENT_TYPE, TEXT_CONTENT_TYPE)], render_text(&snapshot)).into_response()
        }
        OutputFormat::Json => {
            let report = status_report(&state)
                .await
                .map_err(MetricsError::StoreUnavailable)?;
            match select_endpoint(report, query.endpoint.as_deref()) {
                Ok(body) => Json(body).into_response(),
                Err(e) => {
                    debug!("Unknown report endpoint '{}'", e.0);
                    (StatusCode::NOT_FOUND, Json(endpoint_not_found_body())).into_response()
                }
            }
        }
    };

    debug!("/metrics ({}) served in {:?}", format, start.elapsed());
    Ok(response)
}
