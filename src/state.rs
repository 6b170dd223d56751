//! Application state management for the metrics server.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers and the request-tracking middleware.

use herakles_app_metrics::{
    AppInfo, AppMetrics, FileStore, MemoryStore, OutputFormat, Registry, Sampler, SharedStoreRef,
    StatusReporter, StoreError,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use crate::cli::StoreBackend;
use crate::config::{Config, StoreConfig, DEFAULT_DISK_MIN_FREE_RATIO, DEFAULT_MAX_LABEL_SETS};
use crate::system::ProcSampler;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests.
pub struct AppState {
    /// Registry over the shared store; holds no state of its own.
    pub registry: Registry,
    pub metrics: AppMetrics,
    pub sampler: Arc<dyn Sampler>,
    pub reporter: StatusReporter,
    pub config: Arc<Config>,
    pub default_format: OutputFormat,
    pub disk_min_free_ratio: f64,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

/// Opens the configured shared store backend.
pub fn open_store(cfg: &StoreConfig) -> Result<SharedStoreRef, StoreError> {
    match cfg.backend {
        StoreBackend::Memory => {
            info!("Using in-process memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::File => {
            let path = cfg
                .path
                .clone()
                .ok_or_else(|| StoreError::Unavailable("store.path is not set".into()))?;
            let store = FileStore::open(path, Duration::from_millis(cfg.lock_timeout_ms))?;
            info!("Using shared file store at {}", store.path().display());
            Ok(Arc::new(store))
        }
    }
}

/// Application identity from config plus build metadata.
pub fn app_info(config: &Config) -> AppInfo {
    let app = &config.application;
    AppInfo {
        name: app.name.clone(),
        description: app.description.clone(),
        version: app.version.clone(),
        environment: app.environment.clone(),
        revision: option_env!("VERGEN_GIT_SHA").unwrap_or("unknown").to_string(),
        build_timestamp: option_env!("VERGEN_BUILD_TIMESTAMP")
            .unwrap_or("unknown")
            .to_string(),
        runtime: format!("rust/{}", std::env::consts::ARCH),
    }
}

/// Builds the shared state from a validated config, with the given sampler.
pub fn build_state_with_sampler(
    config: Config,
    sampler: Arc<dyn Sampler>,
) -> Result<AppState, Box<dyn std::error::Error>> {
    let store = open_store(&config.store)?;
    let registry = Registry::new(store)
        .with_max_label_sets(config.max_label_sets.unwrap_or(DEFAULT_MAX_LABEL_SETS));
    let metrics = AppMetrics::register(&registry)?;

    let info = app_info(&config);
    metrics.record_build_info(&info.version, &info.environment, &info.revision)?;

    let prefix = config
        .status_prefix
        .clone()
        .unwrap_or_else(|| herakles_app_metrics::status::DEFAULT_STATUS_PREFIX.to_string());

    Ok(AppState {
        registry,
        metrics,
        sampler,
        reporter: StatusReporter::new(info, prefix),
        default_format: config.default_format.unwrap_or_default(),
        disk_min_free_ratio: config
            .disk_min_free_ratio
            .unwrap_or(DEFAULT_DISK_MIN_FREE_RATIO),
        config: Arc::new(config),
        start_time: Instant::now(),
    })
}

/// Builds the shared state with the /proc sampler.
pub fn build_state(config: Config) -> Result<AppState, Box<dyn std::error::Error>> {
    let disk_path = config
        .disk_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("/"));
    build_state_with_sampler(config, Arc::new(ProcSampler::new(disk_path)))
}
