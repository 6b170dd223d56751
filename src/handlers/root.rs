//! Root endpoint handler listing the available endpoints.

use axum::{extract::State, response::IntoResponse};
use herakles_app_metrics::format_uptime;
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Footer text for human-readable HTTP endpoints.
pub const FOOTER_TEXT: &str =
    "Project: https://github.com/cansp-dev/herakles-app-metrics - Support: exporter@herakles.now";

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");

    let app = state.reporter.app();
    let uptime = format_uptime(state.start_time.elapsed().as_secs());

    (
        [("Content-Type", "text/plain; charset=utf-8")],
        format!(
            "{name} {version} ({environment})\n\
             Uptime: {uptime}\n\n\
             Endpoints:\n\
             \x20 /metrics                      Prometheus text exposition\n\
             \x20 /metrics?format=json          JSON status report\n\
             \x20 /metrics?format=json&endpoint=<key>\n\
             \x20                               One report section (status, application, system,\n\
             \x20                               database, cache, memory, http)\n\
             \x20 /health                       Dependency and disk health (200 UP / 503 DOWN)\n\n\
             {FOOTER_TEXT}\n",
            name = app.name,
            version = app.version,
            environment = app.environment,
            uptime = uptime,
        ),
    )
}
