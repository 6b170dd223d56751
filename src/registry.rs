//! Metric registry over the shared store.
//!
//! The registry holds nothing but a store handle. Family definitions, label
//! sets and sample values all live in the store under a deterministic key
//! layout, so a registry built in any process sees and extends the same state:
//!
//! ```text
//! meta:family:<fqname>                      JSON-encoded MetricFamily
//! meta:seq                                  registration ordinal counter
//! sample:<fqname>:<labels>                  marker for a known label set
//! value:<fqname>:<labels>                   counter / gauge value
//! hist:<fqname>:<labels>:bucket:<i>         cumulative bucket count
//! hist:<fqname>:<labels>:sum / :count
//! cardinality:<fqname>                      number of known label sets
//! ```
//!
//! `<labels>` is the label values encoded as a JSON array.
//!
//! Label values should come from a bounded set (route patterns, status codes),
//! never raw user input: every distinct label set is stored forever. The
//! `max_label_sets` limit turns runaway cardinality into a
//! [`RegistryError::CardinalityExceeded`] instead of unbounded growth.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::descriptor::{MetricDescriptor, MetricFamily, MetricKind};
use crate::error::{RegistryError, StoreError};
use crate::store::{read_number, SharedStore, SharedStoreRef, StoreValue};

const FAMILY_PREFIX: &str = "meta:family:";
const SEQUENCE_KEY: &str = "meta:seq";

/// Default limit on distinct label sets per family.
pub const DEFAULT_MAX_LABEL_SETS: usize = 10_000;

fn family_key(fq_name: &str) -> String {
    format!("{}{}", FAMILY_PREFIX, fq_name)
}

fn sample_prefix(fq_name: &str) -> String {
    format!("sample:{}:", fq_name)
}

/// Scan prefix for one family's sample markers.
///
/// Includes the opening bracket of the label array so that family `x` does
/// not pick up the markers of family `x:y`.
fn sample_scan_prefix(fq_name: &str) -> String {
    format!("{}[", sample_prefix(fq_name))
}

fn value_key(fq_name: &str, labels: &str) -> String {
    format!("value:{}:{}", fq_name, labels)
}

fn bucket_key(fq_name: &str, labels: &str, index: usize) -> String {
    format!("hist:{}:{}:bucket:{}", fq_name, labels, index)
}

fn sum_key(fq_name: &str, labels: &str) -> String {
    format!("hist:{}:{}:sum", fq_name, labels)
}

fn count_key(fq_name: &str, labels: &str) -> String {
    format!("hist:{}:{}:count", fq_name, labels)
}

fn cardinality_key(fq_name: &str) -> String {
    format!("cardinality:{}", fq_name)
}

/// Encodes label values as a JSON array so any string survives the key round trip.
fn encode_labels(values: &[&str]) -> String {
    Value::Array(values.iter().map(|v| Value::String(v.to_string())).collect()).to_string()
}

fn decode_labels(key: &str, encoded: &str) -> Result<Vec<String>, StoreError> {
    serde_json::from_str(encoded).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        reason: format!("bad label encoding: {}", e),
    })
}

/// Accumulated state of one histogram sample.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramState {
    /// `(upper_bound, cumulative_count)` in ascending bound order, without `+Inf`.
    pub buckets: Vec<(f64, u64)>,
    pub sum: f64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SampleValue {
    Scalar(f64),
    Histogram(HistogramState),
}

/// One label set of a family and its value.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub label_values: Vec<String>,
    pub value: SampleValue,
}

/// A family and every sample recorded for it.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilySnapshot {
    pub family: MetricFamily,
    pub samples: Vec<Sample>,
}

/// Registry of metric families backed by a [`SharedStore`].
#[derive(Clone)]
pub struct Registry {
    store: SharedStoreRef,
    max_label_sets: usize,
}

impl Registry {
    pub fn new(store: SharedStoreRef) -> Self {
        Self {
            store,
            max_label_sets: DEFAULT_MAX_LABEL_SETS,
        }
    }

    /// Sets the per-family label set limit; `0` disables it.
    pub fn with_max_label_sets(mut self, limit: usize) -> Self {
        self.max_label_sets = limit;
        self
    }

    pub fn store(&self) -> &SharedStoreRef {
        &self.store
    }

    pub fn get_or_register_counter(
        &self,
        namespace: &str,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<Counter, RegistryError> {
        let family = MetricFamily::new(namespace, name, help, MetricKind::Counter, label_names, &[]);
        Ok(Counter(self.handle(family)?))
    }

    pub fn get_or_register_gauge(
        &self,
        namespace: &str,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<Gauge, RegistryError> {
        let family = MetricFamily::new(namespace, name, help, MetricKind::Gauge, label_names, &[]);
        Ok(Gauge(self.handle(family)?))
    }

    pub fn get_or_register_histogram(
        &self,
        namespace: &str,
        name: &str,
        help: &str,
        label_names: &[&str],
        buckets: &[f64],
    ) -> Result<Histogram, RegistryError> {
        let family = MetricFamily::new(
            namespace,
            name,
            help,
            MetricKind::Histogram,
            label_names,
            buckets,
        );
        Ok(Histogram(self.handle(family)?))
    }

    /// Registers a static descriptor and returns the stored family.
    pub fn register(&self, descriptor: &MetricDescriptor) -> Result<MetricFamily, RegistryError> {
        self.get_or_register(descriptor.to_family())
    }

    fn handle(&self, family: MetricFamily) -> Result<Handle, RegistryError> {
        let family = self.get_or_register(family)?;
        Ok(Handle {
            fq_name: family.fq_name(),
            family: Arc::new(family),
            store: self.store.clone(),
            max_label_sets: self.max_label_sets,
        })
    }

    fn get_or_register(&self, mut requested: MetricFamily) -> Result<MetricFamily, RegistryError> {
        requested.validate()?;
        let fq_name = requested.fq_name();
        let key = family_key(&fq_name);

        if let Some(existing) = self.load_family(&key)? {
            return check_compatible(existing, &requested);
        }

        requested.ordinal = self.store.atomic_increment(SEQUENCE_KEY, 1.0)? as u64;
        let encoded = serde_json::to_vec(&requested).map_err(|e| StoreError::Corrupt {
            key: key.clone(),
            reason: e.to_string(),
        })?;

        if self.store.insert_if_absent(&key, StoreValue::Bytes(encoded))? {
            debug!(
                "Registered {} {} (ordinal {})",
                requested.kind, fq_name, requested.ordinal
            );
            return Ok(requested);
        }

        // Another writer registered the family between our read and insert
        let existing = self.load_family(&key)?.ok_or_else(|| StoreError::Corrupt {
            key: key.clone(),
            reason: "family vanished after concurrent registration".into(),
        })?;
        check_compatible(existing, &requested)
    }

    fn load_family(&self, key: &str) -> Result<Option<MetricFamily>, StoreError> {
        match self.store.read(key)? {
            None => Ok(None),
            Some(StoreValue::Bytes(bytes)) => {
                serde_json::from_slice(&bytes)
                    .map(Some)
                    .map_err(|e| StoreError::Corrupt {
                        key: key.to_string(),
                        reason: e.to_string(),
                    })
            }
            Some(StoreValue::Number(_)) => Err(StoreError::Corrupt {
                key: key.to_string(),
                reason: "family definition is numeric".into(),
            }),
        }
    }

    /// Looks up a registered family by fully-qualified name.
    pub fn family(&self, fq_name: &str) -> Result<Option<MetricFamily>, RegistryError> {
        Ok(self.load_family(&family_key(fq_name))?)
    }

    /// All registered families in registration order.
    pub fn families(&self) -> Result<Vec<MetricFamily>, RegistryError> {
        let mut families = Vec::new();
        for key in self.store.keys_with_prefix(FAMILY_PREFIX)? {
            if let Some(family) = self.load_family(&key)? {
                families.push(family);
            }
        }
        families.sort_by(|a, b| {
            a.ordinal
                .cmp(&b.ordinal)
                .then_with(|| a.fq_name().cmp(&b.fq_name()))
        });
        Ok(families)
    }

    /// Reads every family and its samples.
    ///
    /// Each value is read independently; there is no isolation across
    /// families or across the buckets of a histogram being written concurrently.
    pub fn snapshot(&self) -> Result<Vec<FamilySnapshot>, RegistryError> {
        self.families()?
            .into_iter()
            .map(|family| {
                let samples = read_samples(self.store.as_ref(), &family)?;
                Ok(FamilySnapshot { family, samples })
            })
            .collect()
    }
}

fn check_compatible(
    existing: MetricFamily,
    requested: &MetricFamily,
) -> Result<MetricFamily, RegistryError> {
    if existing.is_compatible(requested) {
        return Ok(existing);
    }
    warn!(
        "Conflicting registration for {}: existing {} {:?}, requested {} {:?}",
        existing.fq_name(),
        existing.kind,
        existing.label_names,
        requested.kind,
        requested.label_names
    );
    Err(RegistryError::FamilyConflict {
        name: existing.fq_name(),
        existing: existing.kind,
        existing_labels: existing.label_names,
        requested: requested.kind,
        requested_labels: requested.label_names.clone(),
    })
}

fn read_samples(store: &dyn SharedStore, family: &MetricFamily) -> Result<Vec<Sample>, StoreError> {
    let fq_name = family.fq_name();
    let prefix = sample_prefix(&fq_name);
    let mut samples = Vec::new();

    for key in store.keys_with_prefix(&sample_scan_prefix(&fq_name))? {
        let encoded = &key[prefix.len()..];
        let label_values = decode_labels(&key, encoded)?;
        let value = match family.kind {
            MetricKind::Counter | MetricKind::Gauge => {
                SampleValue::Scalar(read_number(store, &value_key(&fq_name, encoded))?)
            }
            MetricKind::Histogram => SampleValue::Histogram(read_histogram(
                store,
                &fq_name,
                encoded,
                &family.buckets,
            )?),
        };
        samples.push(Sample {
            label_values,
            value,
        });
    }

    samples.sort_by(|a, b| a.label_values.cmp(&b.label_values));
    Ok(samples)
}

fn read_histogram(
    store: &dyn SharedStore,
    fq_name: &str,
    labels: &str,
    bounds: &[f64],
) -> Result<HistogramState, StoreError> {
    let mut buckets = Vec::with_capacity(bounds.len());
    for (i, bound) in bounds.iter().enumerate() {
        let count = read_number(store, &bucket_key(fq_name, labels, i))?;
        buckets.push((*bound, count as u64));
    }
    Ok(HistogramState {
        buckets,
        sum: read_number(store, &sum_key(fq_name, labels))?,
        count: read_number(store, &count_key(fq_name, labels))? as u64,
    })
}

/// Shared part of the typed handles.
#[derive(Clone)]
struct Handle {
    family: Arc<MetricFamily>,
    fq_name: String,
    store: SharedStoreRef,
    max_label_sets: usize,
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("family", &self.family)
            .field("fq_name", &self.fq_name)
            .field("max_label_sets", &self.max_label_sets)
            .finish_non_exhaustive()
    }
}

impl Handle {
    fn labels(&self, values: &[&str]) -> Result<String, RegistryError> {
        if values.len() != self.family.label_names.len() {
            return Err(RegistryError::LabelArityMismatch {
                name: self.fq_name.clone(),
                expected: self.family.label_names.len(),
                got: values.len(),
            });
        }
        Ok(encode_labels(values))
    }

    /// Records the label set as known, enforcing the cardinality limit for new sets.
    fn ensure_sample(&self, labels: &str) -> Result<(), RegistryError> {
        let marker = format!("{}{}", sample_prefix(&self.fq_name), labels);
        if self.store.read(&marker)?.is_some() {
            return Ok(());
        }

        let counter = cardinality_key(&self.fq_name);
        let reserved = self.store.atomic_increment(&counter, 1.0)?;
        if self.max_label_sets > 0 && reserved > self.max_label_sets as f64 {
            self.store.atomic_increment(&counter, -1.0)?;
            return Err(RegistryError::CardinalityExceeded {
                name: self.fq_name.clone(),
                limit: self.max_label_sets,
            });
        }
        if !self.store.insert_if_absent(&marker, StoreValue::Bytes(Vec::new()))? {
            // Another writer created it first; give the slot back
            self.store.atomic_increment(&counter, -1.0)?;
        }
        Ok(())
    }

    fn read_scalar(&self, values: &[&str]) -> Result<f64, RegistryError> {
        let labels = self.labels(values)?;
        Ok(read_number(self.store.as_ref(), &value_key(&self.fq_name, &labels))?)
    }
}

/// Monotonically non-decreasing counter.
#[derive(Debug, Clone)]
pub struct Counter(Handle);

impl Counter {
    pub fn family(&self) -> &MetricFamily {
        &self.0.family
    }

    /// Adds `delta` (finite, `>= 0`) and returns the new total.
    pub fn increment(&self, label_values: &[&str], delta: f64) -> Result<f64, RegistryError> {
        let labels = self.0.labels(label_values)?;
        if !delta.is_finite() || delta < 0.0 {
            return Err(RegistryError::InvalidDelta(delta));
        }
        self.0.ensure_sample(&labels)?;
        Ok(self
            .0
            .store
            .atomic_increment(&value_key(&self.0.fq_name, &labels), delta)?)
    }

    pub fn inc(&self, label_values: &[&str]) -> Result<f64, RegistryError> {
        self.increment(label_values, 1.0)
    }

    pub fn get(&self, label_values: &[&str]) -> Result<f64, RegistryError> {
        self.0.read_scalar(label_values)
    }
}

/// Last-write-wins instantaneous value.
#[derive(Debug, Clone)]
pub struct Gauge(Handle);

impl Gauge {
    pub fn family(&self) -> &MetricFamily {
        &self.0.family
    }

    pub fn set(&self, label_values: &[&str], value: f64) -> Result<(), RegistryError> {
        let labels = self.0.labels(label_values)?;
        self.0.ensure_sample(&labels)?;
        self.0.store.write(
            &value_key(&self.0.fq_name, &labels),
            StoreValue::Number(value),
        )?;
        Ok(())
    }

    pub fn get(&self, label_values: &[&str]) -> Result<f64, RegistryError> {
        self.0.read_scalar(label_values)
    }
}

/// Distribution over fixed bucket bounds.
#[derive(Debug, Clone)]
pub struct Histogram(Handle);

impl Histogram {
    pub fn family(&self) -> &MetricFamily {
        &self.0.family
    }

    /// Records one observation.
    ///
    /// Every bucket whose bound is `>= value` is incremented, then the sum and
    /// count. Each counter is its own atomic increment, so a concurrent reader
    /// may briefly see a partially applied observation. `NaN` is rejected.
    pub fn observe(&self, label_values: &[&str], value: f64) -> Result<(), RegistryError> {
        let labels = self.0.labels(label_values)?;
        if value.is_nan() {
            return Err(RegistryError::InvalidDelta(value));
        }
        self.0.ensure_sample(&labels)?;

        let store = &self.0.store;
        let fq_name = &self.0.fq_name;
        for (i, bound) in self.0.family.buckets.iter().enumerate() {
            if value <= *bound {
                store.atomic_increment(&bucket_key(fq_name, &labels, i), 1.0)?;
            }
        }
        store.atomic_increment(&sum_key(fq_name, &labels), value)?;
        store.atomic_increment(&count_key(fq_name, &labels), 1.0)?;
        Ok(())
    }

    pub fn state(&self, label_values: &[&str]) -> Result<HistogramState, RegistryError> {
        let labels = self.0.labels(label_values)?;
        Ok(read_histogram(
            self.0.store.as_ref(),
            &self.0.fq_name,
            &labels,
            &self.0.family.buckets,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn registry() -> Registry {
        Registry::new(Arc::new(MemoryStore::new()))
    }

    /// Store whose every operation fails, as if the backing medium were gone.
    struct DownStore;

    impl SharedStore for DownStore {
        fn read(&self, _: &str) -> Result<Option<StoreValue>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        fn write(&self, _: &str, _: StoreValue) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        fn atomic_increment(&self, _: &str, _: f64) -> Result<f64, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        fn insert_if_absent(&self, _: &str, _: StoreValue) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        fn keys_with_prefix(&self, _: &str) -> Result<Vec<String>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
    }

    #[test]
    fn test_label_encoding_roundtrip() {
        let encoded = encode_labels(&["GET", "/a\"b", "line\nbreak"]);
        let decoded = decode_labels("k", &encoded).unwrap();
        assert_eq!(decoded, vec!["GET", "/a\"b", "line\nbreak"]);
        assert_eq!(encode_labels(&[]), "[]");
    }

    #[test]
    fn test_reregistration_is_idempotent() {
        let reg = registry();
        let a = reg
            .get_or_register_counter("app", "hits_total", "Hits", &["path"])
            .unwrap();
        let b = reg
            .get_or_register_counter("app", "hits_total", "Other help", &["path"])
            .unwrap();

        assert_eq!(a.family(), b.family());
        assert_eq!(b.family().help, "Hits");

        a.inc(&["/x"]).unwrap();
        assert_eq!(b.get(&["/x"]).unwrap(), 1.0);
        assert_eq!(reg.families().unwrap().len(), 1);
    }

    #[test]
    fn test_conflicting_type_is_rejected() {
        let reg = registry();
        reg.get_or_register_counter("app", "x", "h", &["a"]).unwrap();
        let err = reg.get_or_register_gauge("app", "x", "h", &["a"]).unwrap_err();
        assert!(matches!(err, RegistryError::FamilyConflict { .. }));
    }

    #[test]
    fn test_conflicting_label_arity_is_rejected() {
        let reg = registry();
        reg.get_or_register_counter("app", "x", "h", &["a"]).unwrap();
        let err = reg
            .get_or_register_counter("app", "x", "h", &["a", "b"])
            .unwrap_err();
        assert!(matches!(err, RegistryError::FamilyConflict { .. }));

        // The original family is untouched
        let family = reg.family("app_x").unwrap().unwrap();
        assert_eq!(family.label_names, vec!["a"]);
    }

    #[test]
    fn test_conflicting_buckets_are_rejected() {
        let reg = registry();
        reg.get_or_register_histogram("app", "d", "h", &[], &[1.0, 2.0])
            .unwrap();
        assert!(reg
            .get_or_register_histogram("app", "d", "h", &[], &[1.0, 3.0])
            .is_err());
    }

    #[test]
    fn test_invalid_buckets_rejected_at_registration() {
        let reg = registry();
        assert!(matches!(
            reg.get_or_register_histogram("app", "d", "h", &[], &[]),
            Err(RegistryError::InvalidBuckets(_))
        ));
        assert!(matches!(
            reg.get_or_register_histogram("app", "d", "h", &[], &[0.5, 0.1]),
            Err(RegistryError::InvalidBuckets(_))
        ));
        assert!(reg.families().unwrap().is_empty());
    }

    #[test]
    fn test_label_arity_mismatch() {
        let reg = registry();
        let c = reg
            .get_or_register_counter("app", "req_total", "h", &["method", "path"])
            .unwrap();
        let err = c.inc(&["GET"]).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::LabelArityMismatch {
                expected: 2,
                got: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_counter_rejects_negative_and_non_finite_delta() {
        let reg = registry();
        let c = reg.get_or_register_counter("app", "c", "h", &[]).unwrap();
        assert!(matches!(
            c.increment(&[], -1.0),
            Err(RegistryError::InvalidDelta(_))
        ));
        assert!(c.increment(&[], f64::NAN).is_err());
        assert!(c.increment(&[], f64::INFINITY).is_err());
        assert_eq!(c.increment(&[], 0.0).unwrap(), 0.0);
        assert_eq!(c.increment(&[], 2.5).unwrap(), 2.5);
    }

    #[test]
    fn test_gauge_last_write_wins() {
        let reg = registry();
        let g = reg.get_or_register_gauge("app", "mem", "h", &[]).unwrap();
        g.set(&[], 10.0).unwrap();
        g.set(&[], -3.5).unwrap();
        assert_eq!(g.get(&[]).unwrap(), -3.5);
    }

    #[test]
    fn test_histogram_buckets_are_cumulative() {
        let reg = registry();
        let h = reg
            .get_or_register_histogram("app", "lat", "h", &["m"], &[0.1, 1.0, 5.0])
            .unwrap();
        let observations = [0.05, 0.1, 0.7, 3.0, 9.0];
        for v in observations {
            h.observe(&["GET"], v).unwrap();
        }

        let state = h.state(&["GET"]).unwrap();
        for (bound, count) in &state.buckets {
            let expected = observations.iter().filter(|v| **v <= *bound).count() as u64;
            assert_eq!(*count, expected, "bucket le={}", bound);
        }
        assert_eq!(state.count, 5);
        assert!((state.sum - observations.iter().sum::<f64>()).abs() < 1e-9);
        assert!(h.observe(&["GET"], f64::NAN).is_err());
    }

    #[test]
    fn test_snapshot_follows_registration_order_and_sorts_samples() {
        let reg = registry();
        let z = reg.get_or_register_gauge("app", "zeta", "h", &["k"]).unwrap();
        let a = reg.get_or_register_counter("app", "alpha", "h", &["k"]).unwrap();
        z.set(&["b"], 1.0).unwrap();
        z.set(&["a"], 2.0).unwrap();
        a.inc(&["x"]).unwrap();

        let snapshot = reg.snapshot().unwrap();
        let names: Vec<String> = snapshot.iter().map(|f| f.family.fq_name()).collect();
        assert_eq!(names, vec!["app_zeta", "app_alpha"]);

        let labels: Vec<&str> = snapshot[0]
            .samples
            .iter()
            .map(|s| s.label_values[0].as_str())
            .collect();
        assert_eq!(labels, vec!["a", "b"]);
    }

    #[test]
    fn test_second_registry_on_same_store_sees_everything() {
        let store: SharedStoreRef = Arc::new(MemoryStore::new());
        let writer = Registry::new(store.clone());
        writer
            .get_or_register_counter("app", "c", "h", &["k"])
            .unwrap()
            .inc(&["v"])
            .unwrap();

        let reader = Registry::new(store);
        let snapshot = reader.snapshot().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].samples[0].value, SampleValue::Scalar(1.0));
    }

    #[test]
    fn test_colon_names_do_not_share_samples() {
        let reg = registry();
        let x = reg.get_or_register_counter("app", "x", "h", &[]).unwrap();
        let xy = reg.get_or_register_counter("app", "x:y", "h", &["k"]).unwrap();
        x.inc(&[]).unwrap();
        xy.increment(&["v"], 2.0).unwrap();

        let snapshot = reg.snapshot().unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].family.fq_name(), "app_x");
        assert_eq!(snapshot[0].samples.len(), 1);
        assert_eq!(snapshot[0].samples[0].value, SampleValue::Scalar(1.0));
        assert_eq!(snapshot[1].family.fq_name(), "app_x:y");
        assert_eq!(snapshot[1].samples.len(), 1);
        assert_eq!(snapshot[1].samples[0].label_values, vec!["v"]);
    }

    #[test]
    fn test_cardinality_limit() {
        let reg = registry().with_max_label_sets(2);
        let c = reg.get_or_register_counter("app", "c", "h", &["user"]).unwrap();
        c.inc(&["a"]).unwrap();
        c.inc(&["b"]).unwrap();
        // Known sets keep working at the limit
        c.inc(&["a"]).unwrap();
        assert!(matches!(
            c.inc(&["c"]),
            Err(RegistryError::CardinalityExceeded { limit: 2, .. })
        ));
        assert_eq!(reg.snapshot().unwrap()[0].samples.len(), 2);
    }

    #[test]
    fn test_store_failure_surfaces_as_store_unavailable() {
        let reg = Registry::new(Arc::new(DownStore));
        let err = reg.get_or_register_counter("app", "c", "h", &[]).unwrap_err();
        assert!(err.is_store_failure());
        assert!(reg.snapshot().unwrap_err().is_store_failure());
    }
}
