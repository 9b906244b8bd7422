//! Merge Store - persisted key/value cache with deep-merge writes
//!
//! One JSON blob per storage medium, flat dotted keys (`app`, `page.<key>`,
//! `news.<start_date>.<limit>`). Writes read-merge-write the whole blob under
//! an async mutex so two concurrent writers can never clobber each other's
//! nested updates.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::WeftError;
use crate::merge::deep_merge;
use crate::poll::{wait_for, RetryPolicy};

/// A place the serialized cache blob lives.
///
/// Session-scoped media come and go with the process; durable media survive
/// reloads. External writers must respect the deep-merge contract.
pub trait StorageMedium: Send + Sync {
    fn load(&self) -> Result<Option<String>, WeftError>;
    fn store(&self, blob: &str) -> Result<(), WeftError>;
}

/// Session-scoped medium backed by process memory.
#[derive(Default)]
pub struct MemoryMedium {
    blob: std::sync::Mutex<Option<String>>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageMedium for MemoryMedium {
    fn load(&self) -> Result<Option<String>, WeftError> {
        Ok(self.blob.lock().expect("medium lock").clone())
    }

    fn store(&self, blob: &str) -> Result<(), WeftError> {
        *self.blob.lock().expect("medium lock") = Some(blob.to_string());
        Ok(())
    }
}

/// Durable medium backed by a single file.
pub struct FileMedium {
    path: PathBuf,
}

impl FileMedium {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StorageMedium for FileMedium {
    fn load(&self) -> Result<Option<String>, WeftError> {
        match std::fs::read_to_string(&self.path) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, blob: &str) -> Result<(), WeftError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, blob)?;
        Ok(())
    }
}

/// Key/value store over a [`StorageMedium`] with deep-merge write semantics.
///
/// Reads always re-probe persisted state rather than trusting an in-memory
/// copy; writes are totally ordered by the mutex. Cheap to clone, clones
/// share the medium and the write lock.
#[derive(Clone)]
pub struct MergeStore {
    medium: Arc<dyn StorageMedium>,
    write_lock: Arc<tokio::sync::Mutex<()>>,
}

impl MergeStore {
    pub fn new(medium: Arc<dyn StorageMedium>) -> Self {
        Self {
            medium,
            write_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Session-scoped store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryMedium::new()))
    }

    /// Durable store persisted at `path`.
    pub fn durable(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileMedium::new(path)))
    }

    /// Parse the persisted blob. Unreadable or corrupt blobs degrade to an
    /// empty snapshot (logged), they never fail a read path.
    fn snapshot(&self) -> Map<String, Value> {
        let blob = match self.medium.load() {
            Ok(blob) => blob,
            Err(e) => {
                warn!(error = %e, "failed to load cache blob");
                return Map::new();
            }
        };
        let Some(blob) = blob else {
            return Map::new();
        };
        match serde_json::from_str::<Value>(&blob) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                warn!("cache blob root is not an object, starting empty");
                Map::new()
            }
            Err(e) => {
                let error = WeftError::CacheBlob {
                    details: e.to_string(),
                };
                warn!(error = %error, "starting empty");
                Map::new()
            }
        }
    }

    /// Single non-blocking probe for `key`.
    pub fn probe(&self, key: &str) -> Option<Value> {
        self.snapshot().remove(key)
    }

    /// Look up `key`, optionally waiting for an in-flight writer to populate
    /// it. Zero retries is a plain probe.
    pub async fn get(&self, key: &str, policy: RetryPolicy) -> Option<Value> {
        wait_for(|| self.probe(key), policy).await
    }

    /// Deep-merge `value` into the blob under `key`.
    ///
    /// Holds the write mutex across the whole read-merge-write so concurrent
    /// writers serialize instead of racing on stale snapshots. Persistence
    /// failures are logged; the guard is released on every path.
    pub async fn set(&self, key: &str, value: Value) {
        let _guard = self.write_lock.lock().await;
        let mut incoming = Map::new();
        incoming.insert(key.to_string(), value);
        let merged = deep_merge(
            Value::Object(self.snapshot()),
            Value::Object(incoming),
        );
        self.persist(&merged);
    }

    /// Drop `key` from the blob. The only invalidation path; there is no TTL
    /// or eviction policy, refresh is caller-driven.
    pub async fn invalidate(&self, key: &str) {
        let _guard = self.write_lock.lock().await;
        let mut map = self.snapshot();
        if map.remove(key).is_some() {
            self.persist(&Value::Object(map));
        }
    }

    /// Reset the whole blob.
    pub async fn clear(&self) {
        let _guard = self.write_lock.lock().await;
        self.persist(&Value::Object(Map::new()));
    }

    fn persist(&self, blob: &Value) {
        let serialized = match serde_json::to_string(blob) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "failed to serialize cache blob");
                return;
            }
        };
        if let Err(e) = self.medium.store(&serialized) {
            warn!(error = %e, "failed to persist cache blob");
        }
    }
}
