//! Integration tests for the registry over both store backends.
//!
//! The file store tests open one `FileStore` per writer to stand in for
//! separate processes sharing a store file.

use herakles_app_metrics::{
    render_text, FileStore, MemoryStore, Registry, RegistryError, SampleValue, SharedStoreRef,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

const WRITERS: usize = 2;
const INCREMENTS: usize = 1000;

fn file_store(path: &std::path::Path) -> SharedStoreRef {
    Arc::new(FileStore::open(path, Duration::from_secs(10)).expect("Failed to open file store"))
}

fn hammer(registries: Vec<Registry>) {
    let handles: Vec<_> = registries
        .into_iter()
        .map(|registry| {
            thread::spawn(move || {
                let counter = registry
                    .get_or_register_counter(
                        "app",
                        "http_requests_total",
                        "Total number of HTTP requests",
                        &["method", "endpoint", "status"],
                    )
                    .expect("registration should succeed");
                for _ in 0..INCREMENTS {
                    counter.inc(&["GET", "/x", "200"]).expect("increment should succeed");
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("writer thread panicked");
    }
}

fn total(registry: &Registry) -> f64 {
    registry
        .get_or_register_counter(
            "app",
            "http_requests_total",
            "Total number of HTTP requests",
            &["method", "endpoint", "status"],
        )
        .unwrap()
        .get(&["GET", "/x", "200"])
        .unwrap()
}

#[test]
fn test_concurrent_writers_memory_store() {
    let store: SharedStoreRef = Arc::new(MemoryStore::new());
    let registries = (0..WRITERS).map(|_| Registry::new(store.clone())).collect();

    hammer(registries);

    assert_eq!(total(&Registry::new(store)), (WRITERS * INCREMENTS) as f64);
}

#[test]
fn test_concurrent_writers_file_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("metrics.json");
    let registries = (0..WRITERS)
        .map(|_| Registry::new(file_store(&path)))
        .collect();

    hammer(registries);

    // A fresh handle sees every increment made through the others
    let reader = Registry::new(file_store(&path));
    assert_eq!(total(&reader), (WRITERS * INCREMENTS) as f64);

    let snapshot = reader.snapshot().unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].samples.len(), 1);
}

#[test]
fn test_registration_visible_across_file_store_handles() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("metrics.json");

    let first = Registry::new(file_store(&path));
    first
        .get_or_register_gauge("app", "queue_depth", "Items waiting", &["queue"])
        .unwrap()
        .set(&["mail"], 7.0)
        .unwrap();

    let second = Registry::new(file_store(&path));
    let family = second
        .family("app_queue_depth")
        .unwrap()
        .expect("family registered through the first handle");
    assert_eq!(family.help, "Items waiting");
    assert_eq!(family.label_names, vec!["queue".to_string()]);

    // Same identity from the second handle succeeds and shares the value
    let gauge = second
        .get_or_register_gauge("app", "queue_depth", "Different help is ignored", &["queue"])
        .unwrap();
    assert_eq!(gauge.get(&["mail"]).unwrap(), 7.0);
    assert_eq!(gauge.family().help, "Items waiting");

    // A conflicting shape is rejected from any handle
    let err = second
        .get_or_register_counter("app", "queue_depth", "Items waiting", &["queue"])
        .err()
        .expect("type conflict should be rejected");
    assert!(matches!(err, RegistryError::FamilyConflict { .. }));
}

#[test]
fn test_histogram_invariants_after_concurrent_observations() {
    let store: SharedStoreRef = Arc::new(MemoryStore::new());
    let buckets = [0.1, 0.5, 1.0];

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let registry = Registry::new(store.clone());
            thread::spawn(move || {
                let histogram = registry
                    .get_or_register_histogram(
                        "app",
                        "latency_seconds",
                        "Latency",
                        &["endpoint"],
                        &buckets,
                    )
                    .unwrap();
                for j in 0..100 {
                    // 0.0, 0.25, 0.75, 2.0 cycle through every bucket and overflow
                    let v = [0.0, 0.25, 0.75, 2.0][(i + j) % 4];
                    histogram.observe(&["/x"], v).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let snapshot = Registry::new(store).snapshot().unwrap();
    let SampleValue::Histogram(state) = &snapshot[0].samples[0].value else {
        panic!("expected a histogram sample");
    };

    assert_eq!(state.count, 400);
    let counts: Vec<u64> = state.buckets.iter().map(|(_, c)| *c).collect();
    assert_eq!(counts, vec![100, 200, 300]);
    // Buckets are cumulative and never exceed the total count
    assert!(counts.windows(2).all(|w| w[0] <= w[1]));
    assert!(counts.iter().all(|c| *c <= state.count));
    assert_eq!(state.sum, 100.0 * (0.0 + 0.25 + 0.75 + 2.0));
}

#[test]
fn test_snapshot_preserves_registration_order_across_writers() {
    let store: SharedStoreRef = Arc::new(MemoryStore::new());
    let a = Registry::new(store.clone());
    let b = Registry::new(store.clone());

    a.get_or_register_gauge("app", "zeta", "Z", &[]).unwrap().set(&[], 1.0).unwrap();
    b.get_or_register_gauge("app", "alpha", "A", &[]).unwrap().set(&[], 2.0).unwrap();
    a.get_or_register_gauge("app", "mid", "M", &[]).unwrap().set(&[], 3.0).unwrap();

    let names: Vec<String> = Registry::new(store)
        .snapshot()
        .unwrap()
        .iter()
        .map(|s| s.family.fq_name())
        .collect();
    assert_eq!(names, vec!["app_zeta", "app_alpha", "app_mid"]);
}

#[test]
fn test_file_store_in_missing_directory_fails_fast() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing").join("metrics.json");

    match FileStore::open(&path, Duration::from_millis(50)) {
        Err(_) => {}
        Ok(store) => {
            let registry = Registry::new(Arc::new(store));
            let err = registry
                .get_or_register_counter("app", "requests_total", "Requests", &[])
                .err()
                .expect("registration on an unusable store should fail");
            assert!(err.is_store_failure());
        }
    }
}

#[test]
fn test_infinite_values_keep_file_store_usable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("metrics.json");
    let writer = Registry::new(file_store(&path));

    writer
        .get_or_register_gauge("app", "limit", "Configured limit", &[])
        .unwrap()
        .set(&[], f64::INFINITY)
        .unwrap();
    writer
        .get_or_register_histogram("app", "wait_seconds", "Wait time", &[], &[1.0])
        .unwrap()
        .observe(&[], f64::INFINITY)
        .unwrap();

    // A later writer on a fresh handle must still load the file
    let other = Registry::new(file_store(&path));
    other
        .get_or_register_counter("app", "requests_total", "Requests", &[])
        .unwrap()
        .inc(&[])
        .unwrap();

    let snapshot = other.snapshot().expect("snapshot after +Inf writes");
    assert_eq!(snapshot.len(), 3);
    assert_eq!(snapshot[0].samples[0].value, SampleValue::Scalar(f64::INFINITY));

    let text = render_text(&snapshot);
    assert!(text.contains("app_limit +Inf\n"), "got: {}", text);
    assert!(text.contains("app_wait_seconds_sum +Inf\n"), "got: {}", text);
    assert!(text.contains("app_wait_seconds_count 1\n"), "got: {}", text);
    assert!(text.contains("app_requests_total 1\n"), "got: {}", text);
}
