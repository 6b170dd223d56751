//! Application metric families and their typed handles.
//!
//! Every family the host records is listed once in [`DESCRIPTORS`].
//! [`AppMetrics::register`] registers the whole table at startup, so label
//! arity and metric type are checked once rather than on every update.
//!
//! Several gauge names follow JVM/Spring conventions (`jvm_*`, `hikaricp_*`,
//! `tomcat_*`) so existing dashboards keep working.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::descriptor::{MetricDescriptor, MetricKind};
use crate::error::RegistryError;
use crate::registry::{Counter, Gauge, Histogram, Registry};
use crate::sampler::SystemSample;

/// Request duration bucket bounds in seconds.
pub const REQUEST_DURATION_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0];

const fn counter(
    namespace: &'static str,
    name: &'static str,
    help: &'static str,
    label_names: &'static [&'static str],
) -> MetricDescriptor {
    MetricDescriptor {
        namespace,
        name,
        help,
        kind: MetricKind::Counter,
        label_names,
        buckets: &[],
    }
}

const fn gauge(
    namespace: &'static str,
    name: &'static str,
    help: &'static str,
    label_names: &'static [&'static str],
) -> MetricDescriptor {
    MetricDescriptor {
        namespace,
        name,
        help,
        kind: MetricKind::Gauge,
        label_names,
        buckets: &[],
    }
}

// ========== Request Metrics ==========
pub const HTTP_REQUESTS_TOTAL: MetricDescriptor = counter(
    "app",
    "http_requests_total",
    "Total number of HTTP requests",
    &["method", "endpoint", "status"],
);
pub const HTTP_REQUEST_DURATION: MetricDescriptor = MetricDescriptor {
    namespace: "app",
    name: "http_request_duration_seconds",
    help: "HTTP request duration in seconds",
    kind: MetricKind::Histogram,
    label_names: &["method", "endpoint"],
    buckets: REQUEST_DURATION_BUCKETS,
};
pub const MEMORY_USAGE: MetricDescriptor =
    gauge("app", "memory_usage_bytes", "Memory usage in bytes", &[]);
pub const BUILD_INFO: MetricDescriptor = gauge(
    "app",
    "build_info",
    "Build information, constant 1",
    &["version", "environment", "revision"],
);

// ========== Process Metrics ==========
pub const PROCESS_CPU_USAGE: MetricDescriptor =
    gauge("process", "cpu_usage", "Recent CPU usage of the process (0-1)", &[]);
pub const PROCESS_UPTIME: MetricDescriptor =
    gauge("process", "uptime_seconds", "Process uptime in seconds", &[]);
pub const PROCESS_FILES_OPEN: MetricDescriptor =
    gauge("process", "files_open", "Open file descriptors", &[]);
pub const PROCESS_FILES_MAX: MetricDescriptor =
    gauge("process", "files_max", "Maximum file descriptors", &[]);

// ========== System Metrics ==========
pub const LOAD_1M: MetricDescriptor =
    gauge("system", "load_average_1m", "System load average over 1 minute", &[]);
pub const LOAD_5M: MetricDescriptor =
    gauge("system", "load_average_5m", "System load average over 5 minutes", &[]);
pub const LOAD_15M: MetricDescriptor =
    gauge("system", "load_average_15m", "System load average over 15 minutes", &[]);
pub const CPU_COUNT: MetricDescriptor =
    gauge("system", "cpu_count", "Number of processors available", &[]);

// ========== Runtime Memory Metrics ==========
pub const MEMORY_USED: MetricDescriptor =
    gauge("jvm", "memory_used_bytes", "Used memory in bytes", &[]);
pub const MEMORY_MAX: MetricDescriptor =
    gauge("jvm", "memory_max_bytes", "Maximum memory in bytes", &[]);
pub const MEMORY_PEAK: MetricDescriptor =
    gauge("jvm", "memory_peak_bytes", "Peak memory usage in bytes", &[]);
pub const THREADS_LIVE: MetricDescriptor =
    gauge("jvm", "threads_live", "Current number of live threads", &[]);
pub const THREADS_PEAK: MetricDescriptor =
    gauge("jvm", "threads_peak", "Peak number of live threads", &[]);

// ========== Connection Pool Metrics ==========
pub const DB_ACTIVE: MetricDescriptor =
    gauge("hikaricp", "connections_active", "Active database connections", &[]);
pub const DB_IDLE: MetricDescriptor =
    gauge("hikaricp", "connections_idle", "Idle database connections", &[]);
pub const DB_MIN: MetricDescriptor =
    gauge("hikaricp", "connections_min", "Minimum database connections", &[]);
pub const DB_MAX: MetricDescriptor =
    gauge("hikaricp", "connections_max", "Maximum database connections", &[]);

// ========== Session Metrics ==========
pub const SESSIONS_ACTIVE: MetricDescriptor =
    gauge("tomcat", "sessions_active_current", "Active HTTP sessions", &[]);
pub const SESSIONS_MAX: MetricDescriptor =
    gauge("tomcat", "sessions_active_max", "Maximum active HTTP sessions", &[]);
pub const SESSIONS_CREATED: MetricDescriptor =
    counter("tomcat", "sessions_created_total", "Total HTTP sessions created", &[]);

/// Every family registered by [`AppMetrics::register`], in registration order.
pub const DESCRIPTORS: &[MetricDescriptor] = &[
    HTTP_REQUESTS_TOTAL,
    HTTP_REQUEST_DURATION,
    MEMORY_USAGE,
    BUILD_INFO,
    PROCESS_CPU_USAGE,
    PROCESS_UPTIME,
    PROCESS_FILES_OPEN,
    PROCESS_FILES_MAX,
    LOAD_1M,
    LOAD_5M,
    LOAD_15M,
    CPU_COUNT,
    MEMORY_USED,
    MEMORY_MAX,
    MEMORY_PEAK,
    THREADS_LIVE,
    THREADS_PEAK,
    DB_ACTIVE,
    DB_IDLE,
    DB_MIN,
    DB_MAX,
    SESSIONS_ACTIVE,
    SESSIONS_MAX,
    SESSIONS_CREATED,
];

/// Latch so a dead store is reported once, not on every request.
static STORE_FAILURE_LOGGED: AtomicBool = AtomicBool::new(false);

fn log_swallowed(context: &str, err: &RegistryError) {
    if err.is_store_failure() {
        if !STORE_FAILURE_LOGGED.swap(true, Ordering::Relaxed) {
            warn!("Metrics store unavailable, dropping updates ({}): {}", context, err);
        }
    } else {
        debug!("Metric update skipped ({}): {}", context, err);
    }
}

/// Typed handles for every application metric family.
#[derive(Clone)]
pub struct AppMetrics {
    // ========== Request Metrics ==========
    pub http_requests_total: Counter,
    pub http_request_duration_seconds: Histogram,
    pub memory_usage_bytes: Gauge,
    pub build_info: Gauge,

    // ========== Process Metrics ==========
    pub process_cpu_usage: Gauge,
    pub process_uptime_seconds: Gauge,
    pub process_files_open: Gauge,
    pub process_files_max: Gauge,

    // ========== System Metrics ==========
    pub system_load_average_1m: Gauge,
    pub system_load_average_5m: Gauge,
    pub system_load_average_15m: Gauge,
    pub system_cpu_count: Gauge,

    // ========== Runtime Memory Metrics ==========
    pub memory_used_bytes: Gauge,
    pub memory_max_bytes: Gauge,
    pub memory_peak_bytes: Gauge,
    pub threads_live: Gauge,
    pub threads_peak: Gauge,

    // ========== Connection Pool Metrics ==========
    pub db_connections_active: Gauge,
    pub db_connections_idle: Gauge,
    pub db_connections_min: Gauge,
    pub db_connections_max: Gauge,

    // ========== Session Metrics ==========
    pub sessions_active: Gauge,
    pub sessions_max: Gauge,
    pub sessions_created_total: Counter,
}

fn counter_handle(registry: &Registry, d: &MetricDescriptor) -> Result<Counter, RegistryError> {
    registry.get_or_register_counter(d.namespace, d.name, d.help, d.label_names)
}

fn gauge_handle(registry: &Registry, d: &MetricDescriptor) -> Result<Gauge, RegistryError> {
    registry.get_or_register_gauge(d.namespace, d.name, d.help, d.label_names)
}

fn set_if(gauge: &Gauge, value: Option<f64>) -> Result<(), RegistryError> {
    match value {
        Some(v) => gauge.set(&[], v),
        None => Ok(()),
    }
}

impl AppMetrics {
    /// Registers every family in [`DESCRIPTORS`] and returns the handles.
    pub fn register(registry: &Registry) -> Result<Self, RegistryError> {
        let d = &HTTP_REQUEST_DURATION;
        let metrics = Self {
            http_requests_total: counter_handle(registry, &HTTP_REQUESTS_TOTAL)?,
            http_request_duration_seconds: registry.get_or_register_histogram(
                d.namespace,
                d.name,
                d.help,
                d.label_names,
                d.buckets,
            )?,
            memory_usage_bytes: gauge_handle(registry, &MEMORY_USAGE)?,
            build_info: gauge_handle(registry, &BUILD_INFO)?,

            process_cpu_usage: gauge_handle(registry, &PROCESS_CPU_USAGE)?,
            process_uptime_seconds: gauge_handle(registry, &PROCESS_UPTIME)?,
            process_files_open: gauge_handle(registry, &PROCESS_FILES_OPEN)?,
            process_files_max: gauge_handle(registry, &PROCESS_FILES_MAX)?,

            system_load_average_1m: gauge_handle(registry, &LOAD_1M)?,
            system_load_average_5m: gauge_handle(registry, &LOAD_5M)?,
            system_load_average_15m: gauge_handle(registry, &LOAD_15M)?,
            system_cpu_count: gauge_handle(registry, &CPU_COUNT)?,

            memory_used_bytes: gauge_handle(registry, &MEMORY_USED)?,
            memory_max_bytes: gauge_handle(registry, &MEMORY_MAX)?,
            memory_peak_bytes: gauge_handle(registry, &MEMORY_PEAK)?,
            threads_live: gauge_handle(registry, &THREADS_LIVE)?,
            threads_peak: gauge_handle(registry, &THREADS_PEAK)?,

            db_connections_active: gauge_handle(registry, &DB_ACTIVE)?,
            db_connections_idle: gauge_handle(registry, &DB_IDLE)?,
            db_connections_min: gauge_handle(registry, &DB_MIN)?,
            db_connections_max: gauge_handle(registry, &DB_MAX)?,

            sessions_active: gauge_handle(registry, &SESSIONS_ACTIVE)?,
            sessions_max: gauge_handle(registry, &SESSIONS_MAX)?,
            sessions_created_total: counter_handle(registry, &SESSIONS_CREATED)?,
        };
        debug!("Registered {} application metric families", DESCRIPTORS.len());
        Ok(metrics)
    }

    /// Records one completed request with its final status.
    pub fn record_request(
        &self,
        method: &str,
        endpoint: &str,
        status: u16,
        duration: Duration,
    ) -> Result<(), RegistryError> {
        let status = status.to_string();
        self.http_requests_total.inc(&[method, endpoint, &status])?;
        self.http_request_duration_seconds
            .observe(&[method, endpoint], duration.as_secs_f64())
    }

    pub fn record_memory_usage(&self, bytes: u64) -> Result<(), RegistryError> {
        self.memory_usage_bytes.set(&[], bytes as f64)
    }

    pub fn record_build_info(
        &self,
        version: &str,
        environment: &str,
        revision: &str,
    ) -> Result<(), RegistryError> {
        self.build_info.set(&[version, environment, revision], 1.0)
    }

    /// Pushes one sampler cycle. Absent fields leave their metric untouched.
    ///
    /// Every present field is attempted even when an earlier one fails. Each
    /// failure is logged and the first one is returned.
    pub fn record_sample(&self, sample: &SystemSample) -> Result<(), RegistryError> {
        let as_f64 = |v: Option<u64>| v.map(|n| n as f64);
        let load = |i: usize| sample.load_average.map(|l| l[i]);
        let mut first_err = None;

        let mut set = |gauge: &Gauge, value: Option<f64>| {
            if let Err(e) = set_if(gauge, value) {
                log_swallowed(&gauge.family().fq_name(), &e);
                first_err.get_or_insert(e);
            }
        };

        set(&self.process_cpu_usage, sample.cpu_usage);
        set(&self.process_uptime_seconds, sample.process_uptime_seconds);
        set(&self.process_files_open, as_f64(sample.files_open));
        set(&self.process_files_max, as_f64(sample.files_max));

        set(&self.system_load_average_1m, load(0));
        set(&self.system_load_average_5m, load(1));
        set(&self.system_load_average_15m, load(2));
        set(&self.system_cpu_count, sample.processors.map(f64::from));

        set(&self.memory_used_bytes, as_f64(sample.memory_used_bytes));
        set(&self.memory_max_bytes, as_f64(sample.memory_max_bytes));
        set(&self.memory_peak_bytes, as_f64(sample.memory_peak_bytes));
        set(&self.threads_live, as_f64(sample.threads_live));
        set(&self.threads_peak, as_f64(sample.threads_peak));

        set(&self.db_connections_active, as_f64(sample.db_connections_active));
        set(&self.db_connections_idle, as_f64(sample.db_connections_idle));
        set(&self.db_connections_min, as_f64(sample.db_connections_min));
        set(&self.db_connections_max, as_f64(sample.db_connections_max));

        set(&self.sessions_active, as_f64(sample.sessions_active));
        set(&self.sessions_max, as_f64(sample.sessions_max));

        if let Some(created) = sample.sessions_created {
            if let Err(e) = self.sessions_created_total.increment(&[], created as f64) {
                log_swallowed(&self.sessions_created_total.family().fq_name(), &e);
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// [`Self::record_request`], never failing the caller.
    pub fn record_request_best_effort(
        &self,
        method: &str,
        endpoint: &str,
        status: u16,
        duration: Duration,
    ) {
        if let Err(e) = self.record_request(method, endpoint, status, duration) {
            log_swallowed("request", &e);
        }
    }

    pub fn record_memory_usage_best_effort(&self, bytes: u64) {
        if let Err(e) = self.record_memory_usage(bytes) {
            log_swallowed("memory", &e);
        }
    }

    /// [`Self::record_sample`], which already logs each failed field.
    pub fn record_sample_best_effort(&self, sample: &SystemSample) {
        let _ = self.record_sample(sample);
    }
}
