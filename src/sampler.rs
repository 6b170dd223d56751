//! Sampler adapter contract.
//!
//! A [`Sampler`] supplies already-computed OS and runtime figures once per
//! collection cycle. The library never reads `/proc` or shells out itself;
//! the host binary provides a real implementation and tests use
//! [`StaticSampler`].

use serde::Serialize;

/// One collection cycle's worth of externally sampled values.
///
/// Every field is optional; `None` means "not available on this host" and
/// leaves the corresponding metric untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SystemSample {
    // ========== Host facts ==========
    pub hostname: Option<String>,
    pub os: Option<String>,
    pub processors: Option<u32>,
    pub system_uptime_seconds: Option<u64>,
    pub load_average: Option<[f64; 3]>,

    // ========== Process ==========
    /// CPU usage as a fraction of all processors (0.0-1.0).
    pub cpu_usage: Option<f64>,
    pub process_uptime_seconds: Option<f64>,
    pub files_open: Option<u64>,
    pub files_max: Option<u64>,
    pub threads_live: Option<u64>,
    pub threads_peak: Option<u64>,

    // ========== Memory ==========
    pub memory_used_bytes: Option<u64>,
    pub memory_max_bytes: Option<u64>,
    pub memory_peak_bytes: Option<u64>,

    // ========== Connection pool ==========
    pub db_connections_active: Option<u64>,
    pub db_connections_idle: Option<u64>,
    pub db_connections_min: Option<u64>,
    pub db_connections_max: Option<u64>,

    // ========== HTTP sessions ==========
    pub sessions_active: Option<u64>,
    pub sessions_max: Option<u64>,
    /// Sessions created since the previous sample.
    pub sessions_created: Option<u64>,

    // ========== Disk ==========
    pub disk_free_bytes: Option<u64>,
    pub disk_total_bytes: Option<u64>,
}

/// Source of [`SystemSample`]s.
pub trait Sampler: Send + Sync {
    fn sample(&self) -> SystemSample;

    /// Current memory footprint of the serving process, used for the
    /// per-request memory gauge.
    fn memory_usage_bytes(&self) -> Option<u64>;
}

/// Sampler returning fixed values.
#[derive(Debug, Clone, Default)]
pub struct StaticSampler {
    pub sample: SystemSample,
    pub memory_usage: Option<u64>,
}

impl StaticSampler {
    pub fn new(sample: SystemSample, memory_usage: Option<u64>) -> Self {
        Self {
            sample,
            memory_usage,
        }
    }
}

impl Sampler for StaticSampler {
    fn sample(&self) -> SystemSample {
        self.sample.clone()
    }

    fn memory_usage_bytes(&self) -> Option<u64> {
        self.memory_usage
    }
}
