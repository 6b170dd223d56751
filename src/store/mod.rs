//! Atomic shared store backing every metric sample.
//!
//! The registry keeps no mutable state of its own; all counters, gauges and
//! histogram buckets live behind this trait so that independent writers (threads
//! in one process, or separate processes sharing a file) combine their updates.
//!
//! Two backends are provided:
//! - [`MemoryStore`]: lock-free numeric entries in a `DashMap`, for a single process
//! - [`FileStore`]: one JSON file guarded by `flock`, shared across processes

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::StoreError;

/// A single store entry.
///
/// Finite numbers persist as JSON numbers; `NaN` and the infinities, which
/// JSON cannot represent, persist as the strings `"NaN"`, `"+Inf"`, `"-Inf"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoreValue {
    Number(#[serde(with = "number_repr")] f64),
    Bytes(Vec<u8>),
}

mod number_repr {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Finite(f64),
        Special(String),
    }

    pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
        if v.is_nan() {
            s.serialize_str("NaN")
        } else if v.is_infinite() {
            s.serialize_str(if *v > 0.0 { "+Inf" } else { "-Inf" })
        } else {
            s.serialize_f64(*v)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        match Repr::deserialize(d)? {
            Repr::Finite(v) => Ok(v),
            Repr::Special(s) => match s.as_str() {
                "NaN" => Ok(f64::NAN),
                "+Inf" => Ok(f64::INFINITY),
                "-Inf" => Ok(f64::NEG_INFINITY),
                other => Err(D::Error::custom(format!("not a number: {}", other))),
            },
        }
    }
}

impl StoreValue {
    /// Returns the numeric payload, or `None` for byte entries.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            StoreValue::Number(n) => Some(*n),
            StoreValue::Bytes(_) => None,
        }
    }

    /// Returns the byte payload, or `None` for numeric entries.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            StoreValue::Bytes(b) => Some(b),
            StoreValue::Number(_) => None,
        }
    }
}

/// Key/value substrate with atomic numeric increments.
///
/// Every method must be safe to call concurrently from independent writers
/// and must fail fast (never block indefinitely) when the medium is unusable.
pub trait SharedStore: Send + Sync {
    /// Reads an entry.
    fn read(&self, key: &str) -> Result<Option<StoreValue>, StoreError>;

    /// Overwrites an entry. Last physical write wins.
    fn write(&self, key: &str, value: StoreValue) -> Result<(), StoreError>;

    /// Adds `delta` to a numeric entry and returns the new value.
    ///
    /// An absent key starts at zero. Concurrent increments are never lost.
    fn atomic_increment(&self, key: &str, delta: f64) -> Result<f64, StoreError>;

    /// Creates an entry only if the key is absent. Returns true if this call created it.
    fn insert_if_absent(&self, key: &str, value: StoreValue) -> Result<bool, StoreError>;

    /// Lists keys starting with `prefix`, sorted ascending.
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// Shared handle type passed to the registry.
pub type SharedStoreRef = Arc<dyn SharedStore>;

/// Reads a numeric entry, treating an absent key as zero.
pub fn read_number(store: &dyn SharedStore, key: &str) -> Result<f64, StoreError> {
    match store.read(key)? {
        None => Ok(0.0),
        Some(StoreValue::Number(n)) => Ok(n),
        Some(StoreValue::Bytes(_)) => Err(StoreError::NotNumeric {
            key: key.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_value_accessors() {
        assert_eq!(StoreValue::Number(2.5).as_number(), Some(2.5));
        assert!(StoreValue::Number(2.5).as_bytes().is_none());
        assert_eq!(StoreValue::Bytes(vec![1, 2]).as_bytes(), Some(&[1u8, 2][..]));
        assert!(StoreValue::Bytes(vec![]).as_number().is_none());
    }

    #[test]
    fn test_store_value_json_shape() {
        // Untagged: numbers stay plain JSON numbers in the file store
        let json = serde_json::to_string(&StoreValue::Number(3.0)).unwrap();
        assert_eq!(json, "3.0");
        let back: StoreValue = serde_json::from_str("[104,105]").unwrap();
        assert_eq!(back, StoreValue::Bytes(b"hi".to_vec()));
    }

    #[test]
    fn test_non_finite_numbers_survive_json() {
        for (v, text) in [
            (f64::INFINITY, "\"+Inf\""),
            (f64::NEG_INFINITY, "\"-Inf\""),
            (f64::NAN, "\"NaN\""),
        ] {
            let json = serde_json::to_string(&StoreValue::Number(v)).unwrap();
            assert_eq!(json, text);
            let back: StoreValue = serde_json::from_str(&json).unwrap();
            let n = back.as_number().expect("number variant");
            assert!(n == v || (n.is_nan() && v.is_nan()));
        }
        assert!(serde_json::from_str::<StoreValue>("\"bogus\"").is_err());
    }

    #[test]
    fn test_read_number_defaults_to_zero() {
        let store = MemoryStore::new();
        assert_eq!(read_number(&store, "missing").unwrap(), 0.0);

        store
            .write("blob", StoreValue::Bytes(b"x".to_vec()))
            .unwrap();
        assert!(matches!(
            read_number(&store, "blob"),
            Err(StoreError::NotNumeric { .. })
        ));
    }
}
