//! HTTP endpoint handlers for the metrics server.
//!
//! This module provides handlers for all HTTP endpoints:
//! - `/metrics`: Prometheus text or JSON status report
//! - `/health`: Dependency and disk health
//! - `/`: Plain-text endpoint index

pub mod health;
pub mod metrics;
pub mod root;
pub mod track;

// Re-export handlers
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use root::root_handler;
pub use track::track_requests;
