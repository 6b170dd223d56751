//! JSON status report.
//!
//! Merges health, application identity, sampled system facts, memory figures
//! and the registry families under a name prefix into one nested object:
//!
//! ```json
//! {
//!   "status":      { "status": "UP", "components": { ... } },
//!   "application": { "name": ..., "version": ..., ... },
//!   "system":      { "hostname": ..., "uptime": "up 2 days, 3 hours", ... },
//!   "database":    { "status": "connected", ... },
//!   "cache":       { "status": "not configured" },
//!   "memory":      { "current_usage": "12.34 MB", ... },
//!   "http":        { "app_http_requests_total": { "help": ..., "type": ..., "samples": [...] } }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::descriptor::BUCKET_LABEL;
use crate::error::EndpointNotFound;
use crate::exposition::format_value;
use crate::health::{DependencyStatus, HealthReport};
use crate::registry::{FamilySnapshot, SampleValue};
use crate::sampler::SystemSample;

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Default name prefix selecting families for the `http` section.
pub const DEFAULT_STATUS_PREFIX: &str = "http_";

/// Formats a byte count with base-1024 units, two decimals at most.
///
/// `0` → `"0 B"`, `1536` → `"1.5 KB"`, `1073741824` → `"1 GB"`.
pub fn format_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}

fn format_optional_bytes(bytes: Option<u64>) -> Value {
    match bytes {
        Some(b) => Value::from(format_bytes(b)),
        None => Value::from("unknown"),
    }
}

fn plural(n: u64, unit: &str) -> String {
    if n == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", n, unit)
    }
}

/// Renders an uptime like `up 2 days, 3 hours, 4 minutes`; zero parts are omitted.
pub fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(plural(days, "day"));
    }
    if hours > 0 {
        parts.push(plural(hours, "hour"));
    }
    if minutes > 0 || parts.is_empty() {
        parts.push(plural(minutes, "minute"));
    }
    format!("up {}", parts.join(", "))
}

/// Static application identity, fixed at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppInfo {
    pub name: String,
    pub description: String,
    pub version: String,
    pub environment: String,
    pub revision: String,
    pub build_timestamp: String,
    pub runtime: String,
}

/// Output format of the metrics endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Prometheus,
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Prometheus => f.write_str("prometheus"),
            OutputFormat::Json => f.write_str("json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "prometheus" | "text" => Ok(OutputFormat::Prometheus),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown format '{}' (expected prometheus or json)", other)),
        }
    }
}

/// Picks the output format for a request.
///
/// An explicit, recognised `format` query value wins; otherwise an `Accept`
/// header mentioning `application/json` selects JSON; otherwise `default`.
pub fn negotiate_format(
    format: Option<&str>,
    accept: Option<&str>,
    default: OutputFormat,
) -> OutputFormat {
    if let Some(f) = format.and_then(|f| f.parse().ok()) {
        return f;
    }
    match accept {
        Some(a) if a.contains("application/json") => OutputFormat::Json,
        _ => default,
    }
}

/// Inputs gathered by the host for one report.
pub struct ReportInputs<'a> {
    pub health: &'a HealthReport,
    pub sample: &'a SystemSample,
    /// Current memory usage of the serving process.
    pub memory_usage: Option<u64>,
    pub database: &'a DependencyStatus,
    pub cache: &'a DependencyStatus,
    pub snapshot: &'a [FamilySnapshot],
}

/// Builds JSON status reports for one application.
#[derive(Debug, Clone)]
pub struct StatusReporter {
    app: AppInfo,
    prefix: String,
}

impl StatusReporter {
    pub fn new(app: AppInfo, prefix: impl Into<String>) -> Self {
        Self {
            app,
            prefix: prefix.into(),
        }
    }

    pub fn app(&self) -> &AppInfo {
        &self.app
    }

    /// Builds the full report object.
    pub fn build(&self, inputs: &ReportInputs<'_>) -> Value {
        let mut report = Map::new();
        report.insert("status".into(), inputs.health.to_json());
        report.insert("application".into(), json!(self.app));
        report.insert("system".into(), system_section(inputs.sample));
        report.insert("database".into(), inputs.database.to_json());
        report.insert("cache".into(), inputs.cache.to_json());
        report.insert(
            "memory".into(),
            json!({
                "current_usage": format_optional_bytes(inputs.memory_usage),
                "peak_usage": format_optional_bytes(inputs.sample.memory_peak_bytes),
                "memory_limit": format_optional_bytes(inputs.sample.memory_max_bytes),
            }),
        );
        report.insert("http".into(), self.families_section(inputs.snapshot));
        Value::Object(report)
    }

    /// Families whose unqualified name starts with the prefix, keyed by fully-qualified name.
    fn families_section(&self, snapshot: &[FamilySnapshot]) -> Value {
        let mut section = Map::new();
        for snap in snapshot
            .iter()
            .filter(|s| s.family.name.starts_with(&self.prefix) && !s.samples.is_empty())
        {
            section.insert(snap.family.fq_name(), family_json(snap));
        }
        Value::Object(section)
    }
}

fn system_section(sample: &SystemSample) -> Value {
    json!({
        "hostname": sample.hostname.as_deref().unwrap_or("unknown"),
        "os": sample.os.as_deref().unwrap_or("unknown"),
        "uptime": sample
            .system_uptime_seconds
            .map(format_uptime)
            .unwrap_or_else(|| "unknown".to_string()),
        "load_average": sample.load_average.map(|l| l.to_vec()).unwrap_or_default(),
        "processors": sample.processors,
    })
}

fn labels_json(names: &[String], values: &[String], extra: Option<(&str, String)>) -> Value {
    let mut labels: Map<String, Value> = names
        .iter()
        .zip(values)
        .map(|(n, v)| (n.clone(), Value::from(v.as_str())))
        .collect();
    if let Some((n, v)) = extra {
        labels.insert(n.to_string(), Value::from(v));
    }
    Value::Object(labels)
}

fn sample_json(name: String, labels: Value, value: f64) -> Value {
    // Non-finite values have no JSON number form
    let value = serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or_else(|| Value::from(format_value(value)));
    json!({ "name": name, "labels": labels, "value": value })
}

fn family_json(snap: &FamilySnapshot) -> Value {
    let family = &snap.family;
    let name = family.fq_name();
    let mut samples = Vec::new();

    for sample in &snap.samples {
        let values = &sample.label_values;
        match &sample.value {
            SampleValue::Scalar(v) => {
                samples.push(sample_json(
                    name.clone(),
                    labels_json(&family.label_names, values, None),
                    *v,
                ));
            }
            SampleValue::Histogram(h) => {
                let bucket_name = format!("{}_bucket", name);
                for (bound, count) in &h.buckets {
                    let le = Some((BUCKET_LABEL, format_value(*bound)));
                    samples.push(sample_json(
                        bucket_name.clone(),
                        labels_json(&family.label_names, values, le),
                        *count as f64,
                    ));
                }
                let inf = Some((BUCKET_LABEL, "+Inf".to_string()));
                samples.push(sample_json(
                    bucket_name,
                    labels_json(&family.label_names, values, inf),
                    h.count as f64,
                ));
                samples.push(sample_json(
                    format!("{}_sum", name),
                    labels_json(&family.label_names, values, None),
                    h.sum,
                ));
                samples.push(sample_json(
                    format!("{}_count", name),
                    labels_json(&family.label_names, values, None),
                    h.count as f64,
                ));
            }
        }
    }

    json!({
        "help": family.help,
        "type": family.kind.as_str(),
        "samples": samples,
    })
}

/// Returns the whole report, or only the named top-level key.
pub fn select_endpoint(report: Value, endpoint: Option<&str>) -> Result<Value, EndpointNotFound> {
    let Some(key) = endpoint else {
        return Ok(report);
    };
    match report {
        Value::Object(mut map) => map
            .remove(key)
            .ok_or_else(|| EndpointNotFound(key.to_string())),
        _ => Err(EndpointNotFound(key.to_string())),
    }
}

/// Body returned alongside HTTP 404 for an unknown endpoint key.
pub fn endpoint_not_found_body() -> Value {
    json!({ "error": "Endpoint not found" })
}
