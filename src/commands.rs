//! Subcommand implementations.
//!
//! `render` prints what `/metrics` would serve; `record` lets a short-lived
//! process (a CGI script, a cron job) add one request to a shared file store.

use herakles_app_metrics::{render_text, select_endpoint, OutputFormat};
use std::time::Duration;

use crate::collect::{collect_cycle, status_report};
use crate::config::Config;
use crate::state::build_state;

/// Runs one collection cycle and prints the rendered output.
pub async fn command_render(
    format: OutputFormat,
    endpoint: Option<String>,
    config: Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = build_state(config)?;

    match format {
        OutputFormat::Prometheus => {
            collect_cycle(&state.metrics, state.sampler.as_ref());
            print!("{}", render_text(&state.registry.snapshot()?));
        }
        OutputFormat::Json => {
            let report = status_report(&state).await?;
            let body = select_endpoint(report, endpoint.as_deref())
                .map_err(|e| format!("{} (key '{}')", e, e.0))?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }
    Ok(())
}

/// Records one completed request into the configured store.
pub fn command_record(
    method: &str,
    endpoint: &str,
    status: u16,
    duration_ms: u64,
    config: Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = build_state(config)?;
    state
        .metrics
        .record_request(method, endpoint, status, Duration::from_millis(duration_ms))?;
    println!(
        "Recorded {} {} -> {} ({} ms)",
        method, endpoint, status, duration_ms
    );
    Ok(())
}
