//! File-backed shared store for multi-process deployments.
//!
//! All entries live in a single JSON object on disk. Every operation takes an
//! advisory `flock` on a sibling `<path>.lock` file (shared for reads,
//! exclusive for mutations) and releases it before returning, so independent
//! processes pointing at the same path see each other's updates. Lock
//! acquisition is non-blocking with a bounded retry window; once it elapses
//! the call fails with [`StoreError::LockTimeout`] instead of stalling the
//! request.
//!
//! Mutations write the whole object to `<path>.tmp`, sync it and rename it
//! over the data file, so a writer killed mid-write never leaves a partial
//! store behind.

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

use super::{SharedStore, StoreValue};
use crate::error::StoreError;

/// Pause between non-blocking lock attempts.
const LOCK_RETRY_INTERVAL: Duration = Duration::from_micros(200);

type Entries = BTreeMap<String, StoreValue>;

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Shared store persisted in a `flock`-guarded JSON file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
    temp_path: PathBuf,
    lock_timeout: Duration,
}

impl FileStore {
    /// Opens the store at `path`, creating its lock file if needed.
    ///
    /// The data file itself is created by the first mutation.
    pub fn open(path: impl Into<PathBuf>, lock_timeout: Duration) -> Result<Self, StoreError> {
        let path = path.into();
        let store = Self {
            lock_path: sibling(&path, ".lock"),
            temp_path: sibling(&path, ".tmp"),
            path,
            lock_timeout,
        };
        store.open_lock_file()?;
        debug!("File store opened at {}", store.path.display());
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_lock_file(&self) -> Result<File, StoreError> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|e| {
                StoreError::Unavailable(format!(
                    "cannot open {}: {}",
                    self.lock_path.display(),
                    e
                ))
            })
    }

    fn lock(&self, exclusive: bool) -> Result<Flock<File>, StoreError> {
        let arg = if exclusive {
            FlockArg::LockExclusiveNonblock
        } else {
            FlockArg::LockSharedNonblock
        };
        let start = Instant::now();
        let mut file = self.open_lock_file()?;
        loop {
            match Flock::lock(file, arg) {
                Ok(guard) => return Ok(guard),
                Err((returned, errno)) if errno == Errno::EWOULDBLOCK || errno == Errno::EINTR => {
                    if start.elapsed() >= self.lock_timeout {
                        return Err(StoreError::LockTimeout {
                            path: self.path.display().to_string(),
                            waited_ms: start.elapsed().as_millis() as u64,
                        });
                    }
                    file = returned;
                    std::thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err((_, errno)) => {
                    return Err(StoreError::Unavailable(format!(
                        "flock on {} failed: {}",
                        self.lock_path.display(),
                        errno
                    )));
                }
            }
        }
    }

    fn load(&self) -> Result<Entries, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => {
                return Err(StoreError::Unavailable(format!(
                    "cannot read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };
        if content.trim().is_empty() {
            return Ok(Entries::new());
        }
        serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
            key: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Replaces the data file; caller holds the exclusive lock.
    fn save(&self, entries: &Entries) -> Result<(), StoreError> {
        let data = serde_json::to_vec(entries).map_err(|e| StoreError::Corrupt {
            key: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        let mut temp = File::create(&self.temp_path)?;
        temp.write_all(&data)?;
        temp.sync_all()?;
        fs::rename(&self.temp_path, &self.path)?;
        Ok(())
    }

    /// Runs a read-only closure under a shared lock.
    fn with_read<R>(&self, f: impl FnOnce(&Entries) -> Result<R, StoreError>) -> Result<R, StoreError> {
        let _guard = self.lock(false)?;
        let entries = self.load()?;
        f(&entries)
    }

    /// Runs a mutating closure under an exclusive lock; persists when it returns `dirty = true`.
    fn with_write<R>(
        &self,
        f: impl FnOnce(&mut Entries) -> Result<(R, bool), StoreError>,
    ) -> Result<R, StoreError> {
        let _guard = self.lock(true)?;
        let mut entries = self.load()?;
        let (result, dirty) = f(&mut entries)?;
        if dirty {
            self.save(&entries)?;
        }
        Ok(result)
    }
}

impl SharedStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<StoreValue>, StoreError> {
        self.with_read(|entries| Ok(entries.get(key).cloned()))
    }

    fn write(&self, key: &str, value: StoreValue) -> Result<(), StoreError> {
        self.with_write(|entries| {
            entries.insert(key.to_string(), value);
            Ok(((), true))
        })
    }

    fn atomic_increment(&self, key: &str, delta: f64) -> Result<f64, StoreError> {
        self.with_write(|entries| {
            let current = match entries.get(key) {
                None => 0.0,
                Some(StoreValue::Number(n)) => *n,
                Some(StoreValue::Bytes(_)) => {
                    return Err(StoreError::NotNumeric {
                        key: key.to_string(),
                    })
                }
            };
            let next = current + delta;
            entries.insert(key.to_string(), StoreValue::Number(next));
            Ok((next, true))
        })
    }

    fn insert_if_absent(&self, key: &str, value: StoreValue) -> Result<bool, StoreError> {
        self.with_write(|entries| {
            if entries.contains_key(key) {
                return Ok((false, false));
            }
            entries.insert(key.to_string(), value);
            Ok((true, true))
        })
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        // BTreeMap iteration is already sorted
        self.with_read(|entries| {
            Ok(entries
                .range(prefix.to_string()..)
                .take_while(|(k, _)| k.starts_with(prefix))
                .map(|(k, _)| k.clone())
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tempfile::tempdir;

    const TIMEOUT: Duration = Duration::from_millis(500);

    #[test]
    fn test_roundtrip_through_separate_handles() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metrics.json");

        let a = FileStore::open(&path, TIMEOUT).unwrap();
        let b = FileStore::open(&path, TIMEOUT).unwrap();

        a.write("blob", StoreValue::Bytes(b"abc".to_vec())).unwrap();
        a.atomic_increment("n", 4.0).unwrap();

        assert_eq!(b.read("blob").unwrap(), Some(StoreValue::Bytes(b"abc".to_vec())));
        assert_eq!(b.atomic_increment("n", 1.0).unwrap(), 5.0);
        assert_eq!(a.read("missing").unwrap(), None);
    }

    #[test]
    fn test_insert_if_absent_and_prefix_scan() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path().join("s.json"), TIMEOUT).unwrap();

        assert!(store.insert_if_absent("sample:x:[\"b\"]", StoreValue::Bytes(vec![])).unwrap());
        assert!(store.insert_if_absent("sample:x:[\"a\"]", StoreValue::Bytes(vec![])).unwrap());
        assert!(!store.insert_if_absent("sample:x:[\"a\"]", StoreValue::Number(1.0)).unwrap());
        store.write("sample:xy:[]", StoreValue::Bytes(vec![])).unwrap();

        assert_eq!(
            store.keys_with_prefix("sample:x:").unwrap(),
            vec!["sample:x:[\"a\"]".to_string(), "sample:x:[\"b\"]".to_string()]
        );
    }

    #[test]
    fn test_concurrent_writers_do_not_lose_updates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shared.json");

        let handles: Vec<_> = (0..2)
            .map(|_| {
                // Each writer gets its own handle, like an independent process would
                let store = FileStore::open(&path, Duration::from_secs(5)).unwrap();
                thread::spawn(move || {
                    for _ in 0..500 {
                        store.atomic_increment("requests", 1.0).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let store = FileStore::open(&path, TIMEOUT).unwrap();
        assert_eq!(store.read("requests").unwrap(), Some(StoreValue::Number(1000.0)));
    }

    #[test]
    fn test_lock_timeout_fails_fast() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("locked.json");
        let store = FileStore::open(&path, Duration::from_millis(20)).unwrap();

        let holder = File::open(&store.lock_path).unwrap();
        let _held = Flock::lock(holder, FlockArg::LockExclusiveNonblock)
            .map_err(|(_, e)| e)
            .unwrap();

        let started = Instant::now();
        let err = store.atomic_increment("x", 1.0).unwrap_err();
        assert!(matches!(err, StoreError::LockTimeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FileStore::open(&path, TIMEOUT).unwrap();
        assert!(matches!(store.read("k"), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn test_non_finite_values_do_not_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("inf.json");
        let a = FileStore::open(&path, TIMEOUT).unwrap();
        let b = FileStore::open(&path, TIMEOUT).unwrap();

        a.write("gauge", StoreValue::Number(f64::INFINITY)).unwrap();
        a.write("nan", StoreValue::Number(f64::NAN)).unwrap();
        assert_eq!(a.atomic_increment("sum", f64::NEG_INFINITY).unwrap(), f64::NEG_INFINITY);

        // Later operations from another handle still load the file
        assert_eq!(b.atomic_increment("count", 1.0).unwrap(), 1.0);
        assert_eq!(b.read("gauge").unwrap(), Some(StoreValue::Number(f64::INFINITY)));
        assert_eq!(b.read("sum").unwrap(), Some(StoreValue::Number(f64::NEG_INFINITY)));
        assert!(b.read("nan").unwrap().and_then(|v| v.as_number()).unwrap().is_nan());
    }

    #[test]
    fn test_interrupted_write_leaves_last_commit_intact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("crash.json");
        let store = FileStore::open(&path, TIMEOUT).unwrap();
        store.atomic_increment("requests", 3.0).unwrap();

        // A writer that died before its rename leaves only a partial temp file
        std::fs::write(&store.temp_path, "{\"requests\":").unwrap();

        let reopened = FileStore::open(&path, TIMEOUT).unwrap();
        assert_eq!(reopened.read("requests").unwrap(), Some(StoreValue::Number(3.0)));
        assert_eq!(reopened.atomic_increment("requests", 1.0).unwrap(), 4.0);
        assert!(!store.temp_path.exists());
    }

    #[test]
    fn test_missing_data_file_reads_empty() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path().join("fresh.json"), TIMEOUT).unwrap();
        assert_eq!(store.read("k").unwrap(), None);
        assert!(store.keys_with_prefix("").unwrap().is_empty());
    }

    #[test]
    fn test_unopenable_path_is_unavailable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("store.json");
        assert!(matches!(
            FileStore::open(&path, TIMEOUT),
            Err(StoreError::Unavailable(_))
        ));
    }
}
