//! Herakles Application Metrics Library
//!
//! A metric registry whose entire state lives in an injected atomic shared
//! store, so that many independent writers (request handlers in one process,
//! or several processes sharing a store file) aggregate into the same
//! counters, gauges and histograms. A snapshot of the registry renders either
//! as Prometheus text exposition or as a nested JSON status report.
//!
//! # Features
//!
//! - **Shared Store**: `read`/`write`/`atomic_increment` over memory or a locked file
//! - **Registry**: get-or-register families, typed `Counter`/`Gauge`/`Histogram` handles
//! - **Exposition**: Prometheus text format 0.0.4, byte-identical to the `prometheus` crate's encoder
//! - **Status Report**: health, application, system, memory and HTTP sections as JSON
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use herakles_app_metrics::{render_text, MemoryStore, Registry};
//!
//! let registry = Registry::new(Arc::new(MemoryStore::new()));
//! let requests = registry
//!     .get_or_register_counter("app", "http_requests_total", "Total requests", &["method"])
//!     .unwrap();
//! requests.inc(&["GET"]).unwrap();
//!
//! let text = render_text(&registry.snapshot().unwrap());
//! assert!(text.contains("app_http_requests_total{method=\"GET\"} 1"));
//! ```

pub mod descriptor;
pub mod error;
pub mod exposition;
pub mod health;
pub mod metrics;
pub mod registry;
pub mod sampler;
pub mod status;
pub mod store;

// Re-export main types for convenience
pub use descriptor::{MetricDescriptor, MetricFamily, MetricKind};
pub use error::{EndpointNotFound, RegistryError, StoreError};
pub use exposition::{render_text, TEXT_CONTENT_TYPE};
pub use health::{
    disk_component, Component, ComponentHealth, DependencyStatus, HealthReport, Status,
};
pub use metrics::AppMetrics;
pub use registry::{
    Counter, FamilySnapshot, Gauge, Histogram, HistogramState, Registry, Sample, SampleValue,
};
pub use sampler::{Sampler, StaticSampler, SystemSample};
pub use status::{
    endpoint_not_found_body, format_bytes, format_uptime, negotiate_format, select_endpoint,
    AppInfo, OutputFormat, ReportInputs, StatusReporter,
};
pub use store::{FileStore, MemoryStore, SharedStore, SharedStoreRef, StoreValue};
