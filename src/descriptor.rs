//! Metric family definitions and name/bucket validation.
//!
//! A [`MetricDescriptor`] is the static, compile-time description of a family;
//! a [`MetricFamily`] is the registered form persisted in the shared store so
//! every process resolves the same identity.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::RegistryError;

static METRIC_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_:][a-zA-Z0-9_:]*$").expect("valid metric name regex"));
static LABEL_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("valid label name regex"));

/// Histogram bucket label, reserved.
pub const BUCKET_LABEL: &str = "le";

/// Metric type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static definition of a metric family.
#[derive(Debug, Clone, Copy)]
pub struct MetricDescriptor {
    pub namespace: &'static str,
    pub name: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
    pub label_names: &'static [&'static str],
    /// Upper bounds for histograms; empty for other kinds.
    pub buckets: &'static [f64],
}

impl MetricDescriptor {
    pub fn fq_name(&self) -> String {
        fq_name(self.namespace, self.name)
    }

    pub fn to_family(&self) -> MetricFamily {
        MetricFamily::new(
            self.namespace,
            self.name,
            self.help,
            self.kind,
            self.label_names,
            self.buckets,
        )
    }
}

/// A registered metric family as stored in the shared store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricFamily {
    pub namespace: String,
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
    pub label_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buckets: Vec<f64>,
    /// Position in registration order across all writers.
    #[serde(default)]
    pub ordinal: u64,
}

impl MetricFamily {
    pub fn new(
        namespace: &str,
        name: &str,
        help: &str,
        kind: MetricKind,
        label_names: &[&str],
        buckets: &[f64],
    ) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            help: help.to_string(),
            kind,
            label_names: label_names.iter().map(|s| s.to_string()).collect(),
            buckets: buckets.to_vec(),
            ordinal: 0,
        }
    }

    /// Fully-qualified name (`namespace_name`).
    pub fn fq_name(&self) -> String {
        fq_name(&self.namespace, &self.name)
    }

    /// Whether `other` describes the same immutable shape (kind, labels, buckets).
    pub fn is_compatible(&self, other: &MetricFamily) -> bool {
        self.kind == other.kind
            && self.label_names == other.label_names
            && self.buckets == other.buckets
    }

    /// Validates names and, for histograms, bucket bounds.
    pub fn validate(&self) -> Result<(), RegistryError> {
        validate_metric_name(&self.fq_name())?;
        validate_label_names(&self.label_names, self.kind)?;
        match self.kind {
            MetricKind::Histogram => validate_buckets(&self.buckets),
            _ if !self.buckets.is_empty() => Err(RegistryError::InvalidBuckets(format!(
                "{} {} must not declare buckets",
                self.kind,
                self.fq_name()
            ))),
            _ => Ok(()),
        }
    }
}

/// Joins namespace and name; an empty namespace yields the bare name.
pub fn fq_name(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}_{}", namespace, name)
    }
}

pub fn validate_metric_name(name: &str) -> Result<(), RegistryError> {
    if METRIC_NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(RegistryError::InvalidName(name.to_string()))
    }
}

pub fn validate_label_names(names: &[String], kind: MetricKind) -> Result<(), RegistryError> {
    for (i, name) in names.iter().enumerate() {
        if !LABEL_NAME_RE.is_match(name) || name.starts_with("__") {
            return Err(RegistryError::InvalidName(name.clone()));
        }
        if kind == MetricKind::Histogram && name == BUCKET_LABEL {
            return Err(RegistryError::InvalidName(format!(
                "'{}' is reserved for histogram buckets",
                BUCKET_LABEL
            )));
        }
        if names[..i].contains(name) {
            return Err(RegistryError::InvalidName(format!("duplicate label '{}'", name)));
        }
    }
    Ok(())
}

/// Buckets must be a non-empty, strictly ascending sequence of finite numbers.
/// The `+Inf` bucket is implicit and must not be listed.
pub fn validate_buckets(buckets: &[f64]) -> Result<(), RegistryError> {
    if buckets.is_empty() {
        return Err(RegistryError::InvalidBuckets("no bucket bounds given".into()));
    }
    if let Some(bad) = buckets.iter().find(|b| !b.is_finite()) {
        return Err(RegistryError::InvalidBuckets(format!(
            "bound {} is not finite",
            bad
        )));
    }
    if let Some(pair) = buckets.windows(2).find(|w| w[0] >= w[1]) {
        return Err(RegistryError::InvalidBuckets(format!(
            "bounds must be strictly ascending ({} >= {})",
            pair[0], pair[1]
        )));
    }
    Ok(())
}
