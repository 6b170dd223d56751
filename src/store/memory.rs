//! In-process shared store.
//!
//! Numeric entries are `f64` bit patterns in an `AtomicU64`, updated with a
//! compare-and-retry loop so increments never take the shard write lock once
//! the key exists.

use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{SharedStore, StoreValue};
use crate::error::StoreError;

enum Entry {
    Number(AtomicU64),
    Bytes(Vec<u8>),
}

impl Entry {
    fn from_value(value: StoreValue) -> Self {
        match value {
            StoreValue::Number(n) => Entry::Number(AtomicU64::new(n.to_bits())),
            StoreValue::Bytes(b) => Entry::Bytes(b),
        }
    }

    fn to_value(&self) -> StoreValue {
        match self {
            Entry::Number(cell) => StoreValue::Number(f64::from_bits(cell.load(Ordering::Acquire))),
            Entry::Bytes(b) => StoreValue::Bytes(b.clone()),
        }
    }
}

/// Adds `delta` to an atomic `f64` and returns the resulting value.
fn add_f64(cell: &AtomicU64, delta: f64) -> f64 {
    let mut current = cell.load(Ordering::Acquire);
    loop {
        let next = (f64::from_bits(current) + delta).to_bits();
        match cell.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => return f64::from_bits(next),
            Err(actual) => current = actual,
        }
    }
}

/// Shared store for writers living in one address space.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SharedStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<StoreValue>, StoreError> {
        Ok(self.entries.get(key).map(|e| e.value().to_value()))
    }

    fn write(&self, key: &str, value: StoreValue) -> Result<(), StoreError> {
        if let StoreValue::Number(n) = &value {
            // Fast path: overwrite an existing numeric cell in place
            if let Some(entry) = self.entries.get(key) {
                if let Entry::Number(cell) = entry.value() {
                    cell.store(n.to_bits(), Ordering::Release);
                    return Ok(());
                }
            }
        }
        self.entries.insert(key.to_string(), Entry::from_value(value));
        Ok(())
    }

    fn atomic_increment(&self, key: &str, delta: f64) -> Result<f64, StoreError> {
        loop {
            if let Some(entry) = self.entries.get(key) {
                return match entry.value() {
                    Entry::Number(cell) => Ok(add_f64(cell, delta)),
                    Entry::Bytes(_) => Err(StoreError::NotNumeric {
                        key: key.to_string(),
                    }),
                };
            }
            // Losing this race is fine: the next iteration increments whichever cell won.
            self.entries
                .entry(key.to_string())
                .or_insert_with(|| Entry::Number(AtomicU64::new(0f64.to_bits())));
        }
    }

    fn insert_if_absent(&self, key: &str, value: StoreValue) -> Result<bool, StoreError> {
        match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(_) => Ok(false),
            MapEntry::Vacant(slot) => {
                slot.insert(Entry::from_value(value));
                Ok(true)
            }
        }
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}
