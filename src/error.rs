//! Error types for the shared store and the metric registry.
//!
//! Store failures are always surfaced from registry operations as
//! [`RegistryError::StoreUnavailable`]; callers on a request path are expected
//! to swallow them (see [`crate::metrics::AppMetrics`]).

use crate::descriptor::MetricKind;

/// Errors raised by a [`crate::store::SharedStore`] backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("timed out after {waited_ms} ms waiting for lock on {path}")]
    LockTimeout { path: String, waited_ms: u64 },

    #[error("corrupt store entry {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("store entry {key} is not numeric")]
    NotNumeric { key: String },
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// Errors raised by registry registration and update operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(
        "metric family {name} already registered as {existing} with labels {existing_labels:?}; \
         requested {requested} with labels {requested_labels:?}"
    )]
    FamilyConflict {
        name: String,
        existing: MetricKind,
        existing_labels: Vec<String>,
        requested: MetricKind,
        requested_labels: Vec<String>,
    },

    #[error("metric {name} expects {expected} label values, got {got}")]
    LabelArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("counter delta must be finite and non-negative, got {0}")]
    InvalidDelta(f64),

    #[error("invalid histogram buckets: {0}")]
    InvalidBuckets(String),

    #[error("invalid metric or label name: {0}")]
    InvalidName(String),

    #[error("metric {name} reached its limit of {limit} label sets")]
    CardinalityExceeded { name: String, limit: usize },

    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),
}

impl RegistryError {
    /// Returns true when the failure came from the backing store rather than
    /// from the caller's input.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, RegistryError::StoreUnavailable(_))
    }
}

/// Returned when a JSON status report is asked for a top-level key it lacks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Endpoint not found")]
pub struct EndpointNotFound(pub String);
