//! Health reporting for external dependencies and local resources.
//!
//! Dependency checks are performed by the host; this module only turns their
//! outcome into an explicit [`ComponentHealth`] and folds components into an
//! overall status using the worst-of rule.
//!
//! # Usage
//!
//! ```rust
//! use herakles_app_metrics::{Component, ComponentHealth, HealthReport};
//!
//! let report = HealthReport::from_components(vec![
//!     Component::new("database", ComponentHealth::Up),
//!     Component::new("redis", ComponentHealth::Down("connection refused".into())),
//! ]);
//! assert!(!report.is_up());
//! ```

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::status::format_bytes;

/// Overall status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Up,
    Down,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Up => "UP",
            Status::Down => "DOWN",
        }
    }
}

/// Outcome of a single health check.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentHealth {
    Up,
    /// Check failed; carries a human-readable reason.
    Down(String),
    /// Check was not performed (e.g. dependency not configured).
    Unknown,
}

impl ComponentHealth {
    pub fn label(&self) -> &'static str {
        match self {
            ComponentHealth::Up => "UP",
            ComponentHealth::Down(_) => "DOWN",
            ComponentHealth::Unknown => "UNKNOWN",
        }
    }

    /// Numeric priority (higher = worse). `Unknown` does not degrade.
    fn priority(&self) -> u8 {
        match self {
            ComponentHealth::Up | ComponentHealth::Unknown => 0,
            ComponentHealth::Down(_) => 1,
        }
    }
}

/// A named health component with optional extra detail fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub name: String,
    pub health: ComponentHealth,
    pub details: Map<String, Value>,
}

impl Component {
    pub fn new(name: impl Into<String>, health: ComponentHealth) -> Self {
        Self {
            name: name.into(),
            health,
            details: Map::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("status".into(), Value::from(self.health.label()));
        if let ComponentHealth::Down(detail) = &self.health {
            obj.insert("error".into(), Value::from(detail.as_str()));
        }
        for (k, v) in &self.details {
            obj.insert(k.clone(), v.clone());
        }
        Value::Object(obj)
    }
}

/// Folded health of all components.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub status: Status,
    pub components: Vec<Component>,
}

impl HealthReport {
    /// Builds the report; the overall status is the worst component status.
    pub fn from_components(components: Vec<Component>) -> Self {
        let worst = components
            .iter()
            .map(|c| c.health.priority())
            .max()
            .unwrap_or(0);
        let status = if worst == 0 { Status::Up } else { Status::Down };
        Self { status, components }
    }

    pub fn is_up(&self) -> bool {
        self.status == Status::Up
    }

    /// `{"status": "UP", "components": {name: {...}}}`
    pub fn to_json(&self) -> Value {
        let components: Map<String, Value> = self
            .components
            .iter()
            .map(|c| (c.name.clone(), c.to_json()))
            .collect();
        json!({
            "status": self.status.as_str(),
            "components": components,
        })
    }
}

/// Result of probing one external dependency, as shown in the status report.
#[derive(Debug, Clone, PartialEq)]
pub enum DependencyStatus {
    NotConfigured,
    Connected(Map<String, Value>),
    Error(String),
}

impl DependencyStatus {
    pub fn health(&self) -> ComponentHealth {
        match self {
            DependencyStatus::NotConfigured => ComponentHealth::Unknown,
            DependencyStatus::Connected(_) => ComponentHealth::Up,
            DependencyStatus::Error(e) => ComponentHealth::Down(e.clone()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            DependencyStatus::NotConfigured => json!({ "status": "not configured" }),
            DependencyStatus::Connected(details) => {
                let mut obj = Map::new();
                obj.insert("status".into(), Value::from("connected"));
                for (k, v) in details {
                    obj.insert(k.clone(), v.clone());
                }
                Value::Object(obj)
            }
            DependencyStatus::Error(e) => json!({ "status": "error", "error": e }),
        }
    }
}

/// Disk space component: `UP` while the free fraction exceeds `min_free_ratio`.
pub fn disk_component(free_bytes: u64, total_bytes: u64, min_free_ratio: f64) -> Component {
    let ratio = if total_bytes == 0 {
        0.0
    } else {
        free_bytes as f64 / total_bytes as f64
    };
    let health = if ratio > min_free_ratio {
        ComponentHealth::Up
    } else {
        ComponentHealth::Down(format!(
            "free space {:.1}% at or below threshold {:.1}%",
            ratio * 100.0,
            min_free_ratio * 100.0
        ))
    };
    Component::new("disk", health)
        .with_detail("free", format_bytes(free_bytes))
        .with_detail("total", format_bytes(total_bytes))
}
