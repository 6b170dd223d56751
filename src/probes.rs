//! TCP reachability probes for configured dependencies.
//!
//! A probe only checks that a TCP connection can be opened within the
//! configured timeout. The outcome is captured as data, never propagated:
//! an unreachable dependency shows up as `DOWN` in the health report.

use anyhow::{anyhow, Context};
use herakles_app_metrics::{Component, DependencyStatus};
use serde_json::{Map, Value};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tracing::{debug, instrument};

use crate::config::{DependencyConfig, DependencySection};

/// Outcome of probing one dependency.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub name: String,
    pub section: DependencySection,
    pub status: DependencyStatus,
}

impl ProbeResult {
    pub fn component(&self) -> Component {
        Component::new(self.name.clone(), self.status.health())
    }
}

async fn connect(address: &str, timeout: Duration) -> anyhow::Result<Duration> {
    let started = Instant::now();
    let stream = tokio::time::timeout(timeout, TcpStream::connect(address))
        .await
        .map_err(|_| anyhow!("connect timed out after {} ms", timeout.as_millis()))?
        .with_context(|| format!("connect to {} failed", address))?;
    drop(stream);
    Ok(started.elapsed())
}

/// Probes one dependency.
#[instrument(skip(dep), fields(name = %dep.name))]
pub async fn probe(dep: &DependencyConfig) -> ProbeResult {
    let status = match connect(&dep.address, Duration::from_millis(dep.timeout_ms)).await {
        Ok(latency) => {
            let mut details = Map::new();
            details.insert("address".into(), Value::from(dep.address.as_str()));
            details.insert(
                "latency_ms".into(),
                Value::from((latency.as_secs_f64() * 1000.0 * 100.0).round() / 100.0),
            );
            DependencyStatus::Connected(details)
        }
        Err(e) => {
            debug!("Dependency {} unreachable: {:#}", dep.name, e);
            DependencyStatus::Error(format!("{:#}", e))
        }
    };
    ProbeResult {
        name: dep.name.clone(),
        section: dep.section,
        status,
    }
}

/// Probes all dependencies concurrently, preserving configuration order.
pub async fn probe_all(deps: &[DependencyConfig]) -> Vec<ProbeResult> {
    let handles: Vec<_> = deps
        .iter()
        .cloned()
        .map(|dep| tokio::spawn(async move { probe(&dep).await }))
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (handle, dep) in handles.into_iter().zip(deps) {
        match handle.await {
            Ok(result) => results.push(result),
            Err(e) => results.push(ProbeResult {
                name: dep.name.clone(),
                section: dep.section,
                status: DependencyStatus::Error(format!("probe task failed: {}", e)),
            }),
        }
    }
    results
}

/// Status of the first dependency feeding `section`, or `NotConfigured`.
pub fn section_status(results: &[ProbeResult], section: DependencySection) -> DependencyStatus {
    results
        .iter()
        .find(|r| r.section == section)
        .map(|r| r.status.clone())
        .unwrap_or(DependencyStatus::NotConfigured)
}

#[cfg(test)]
mod tests {
    use super::*;
    use herakles_app_metrics::ComponentHealth;
    use tokio::net::TcpListener;

    fn dep(name: &str, section: DependencySection, address: String) -> DependencyConfig {
        DependencyConfig {
            name: name.into(),
            section,
            address,
            timeout_ms: 500,
        }
    }

    #[tokio::test]
    async fn test_probe_reachable_dependency() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let result = probe(&dep("db", DependencySection::Database, addr.clone())).await;
        match &result.status {
            DependencyStatus::Connected(details) => {
                assert_eq!(details["address"], Value::from(addr));
            }
            other => panic!("expected connected, got {:?}", other),
        }
        assert_eq!(result.component().health, ComponentHealth::Up);
    }

    #[tokio::test]
    async fn test_probe_unreachable_dependency() {
        // Bind then drop to get a port with nothing listening
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = probe(&dep("cache", DependencySection::Cache, addr)).await;
        assert!(matches!(result.status, DependencyStatus::Error(_)));
        assert!(matches!(result.component().health, ComponentHealth::Down(_)));
    }

    #[tokio::test]
    async fn test_probe_all_and_sections() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let deps = vec![
            dep("db", DependencySection::Database, addr.clone()),
            dep("search", DependencySection::Other, addr),
        ];

        let results = probe_all(&deps).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "db");
        assert!(matches!(
            section_status(&results, DependencySection::Database),
            DependencyStatus::Connected(_)
        ));
        assert_eq!(
            section_status(&results, DependencySection::Cache),
            DependencyStatus::NotConfigured
        );
    }
}
