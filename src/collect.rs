//! Collection cycle and report assembly shared by the HTTP handlers and the
//! `render` subcommand.

use herakles_app_metrics::{
    disk_component, AppMetrics, Component, ComponentHealth, HealthReport, RegistryError,
    ReportInputs, Sampler, SystemSample,
};
use serde_json::Value;
use std::time::Instant;
use tracing::debug;

use crate::config::DependencySection;
use crate::probes::{probe_all, section_status, ProbeResult};
use crate::state::AppState;

/// Samples the host once and pushes the figures into the registry.
pub fn collect_cycle(metrics: &AppMetrics, sampler: &dyn Sampler) -> SystemSample {
    let start = Instant::now();
    let sample = sampler.sample();
    metrics.record_sample_best_effort(&sample);
    if let Some(bytes) = sampler.memory_usage_bytes() {
        metrics.record_memory_usage_best_effort(bytes);
    }
    debug!("Collection cycle took {:?}", start.elapsed());
    sample
}

/// Sections that always appear in the health report.
const REQUIRED_SECTIONS: [(DependencySection, &str); 2] = [
    (DependencySection::Database, "database"),
    (DependencySection::Cache, "cache"),
];

/// Folds probe results and disk space into a health report.
///
/// A database or cache section with no configured dependency is reported as
/// `UNKNOWN`, which does not affect the overall status.
pub fn health_report(
    probes: &[ProbeResult],
    sample: &SystemSample,
    disk_min_free_ratio: f64,
) -> HealthReport {
    let mut components: Vec<_> = probes.iter().map(ProbeResult::component).collect();
    for (section, name) in REQUIRED_SECTIONS {
        if !probes.iter().any(|p| p.section == section) {
            components.push(Component::new(name, ComponentHealth::Unknown));
        }
    }
    if let (Some(free), Some(total)) = (sample.disk_free_bytes, sample.disk_total_bytes) {
        components.push(disk_component(free, total, disk_min_free_ratio));
    }
    HealthReport::from_components(components)
}

/// Probes dependencies and builds the health report.
pub async fn current_health(state: &AppState, sample: &SystemSample) -> (Vec<ProbeResult>, HealthReport) {
    let probes = probe_all(&state.config.dependencies).await;
    let health = health_report(&probes, sample, state.disk_min_free_ratio);
    (probes, health)
}

/// Runs a collection cycle and builds the full JSON status report.
pub async fn status_report(state: &AppState) -> Result<Value, RegistryError> {
    let sample = collect_cycle(&state.metrics, state.sampler.as_ref());
    let (probes, health) = current_health(state, &sample).await;
    let snapshot = state.registry.snapshot()?;
    let database = section_status(&probes, DependencySection::Database);
    let cache = section_status(&probes, DependencySection::Cache);

    Ok(state.reporter.build(&ReportInputs {
        health: &health,
        sample: &sample,
        memory_usage: state.sampler.memory_usage_bytes(),
        database: &database,
        cache: &cache,
        snapshot: &snapshot,
    }))
}
