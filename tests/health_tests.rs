//! Integration tests for health folding and its JSON form.

use herakles_app_metrics::{
    disk_component, Component, ComponentHealth, DependencyStatus, HealthReport, Status,
};
use serde_json::json;

#[test]
fn test_all_up_components() {
    let report = HealthReport::from_components(vec![
        Component::new("db", ComponentHealth::Up),
        disk_component(800, 1000, 0.1),
    ]);

    assert_eq!(report.status, Status::Up);
    assert_eq!(
        report.to_json(),
        json!({
            "status": "UP",
            "components": {
                "db": {"status": "UP"},
                "disk": {"status": "UP", "free": "800 B", "total": "1000 B"},
            }
        })
    );
}

#[test]
fn test_single_down_component_fails_report() {
    let report = HealthReport::from_components(vec![
        Component::new("db", ComponentHealth::Up),
        Component::new("cache", DependencyStatus::Error("timed out".into()).health()),
    ]);

    assert_eq!(report.status, Status::Down);
    let body = report.to_json();
    assert_eq!(body["status"], "DOWN");
    assert_eq!(body["components"]["db"]["status"], "UP");
    assert_eq!(body["components"]["cache"]["status"], "DOWN");
    assert_eq!(body["components"]["cache"]["error"], "timed out");
}

#[test]
fn test_disk_threshold_edges() {
    // Strictly above the threshold is healthy
    assert_eq!(disk_component(101, 1000, 0.1).health, ComponentHealth::Up);
    // Exactly at the threshold is not
    assert!(matches!(
        disk_component(100, 1000, 0.1).health,
        ComponentHealth::Down(_)
    ));
    // An empty or unreadable filesystem reports zero capacity
    assert!(matches!(
        disk_component(0, 0, 0.0).health,
        ComponentHealth::Down(_)
    ));
}

#[test]
fn test_component_order_preserved_in_json() {
    let report = HealthReport::from_components(vec![
        Component::new("zeta", ComponentHealth::Up),
        Component::new("alpha", ComponentHealth::Unknown),
    ]);
    let body = report.to_json();
    let names: Vec<&String> = body["components"].as_object().unwrap().keys().collect();
    assert_eq!(names, vec!["zeta", "alpha"]);
    assert_eq!(body["status"], "UP");
}
