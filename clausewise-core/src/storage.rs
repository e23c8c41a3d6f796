//! Guarded key/value storage.
//!
//! A [`StorageBackend`] is the raw medium and may fail. The
//! [`StorageAdapter`] wraps one and never fails: read errors become "absent",
//! write errors become no-ops, and both are logged at `warn`. Two backends
//! ship here:
//! - `FileBackend`: one file per key under a data directory.
//! - `MemoryBackend`: process-local map for tests and headless use.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::config::{StorageConfig, StorageKind};
use crate::error::StorageError;
use crate::persistence;

/// A raw key/value medium.
pub trait StorageBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Stores each key as `<dir>/<encoded-key>.json`.
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Keys contain `:`, which some filesystems reject, so keys are
    /// percent-encoded.
    pub fn file_name_for(key: &str) -> String {
        format!("{}.json", urlencoding::encode(key))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(Self::file_name_for(key))
    }
}

impl StorageBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        persistence::read_optional(&self.path_for(key)).map_err(|e| StorageError::ReadFailed {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        persistence::atomic_write(&self.path_for(key), value.as_bytes()).map_err(|e| {
            StorageError::WriteFailed {
                key: key.to_string(),
                message: e.to_string(),
            }
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        persistence::remove_if_exists(&self.path_for(key)).map_err(|e| {
            StorageError::WriteFailed {
                key: key.to_string(),
                message: e.to_string(),
            }
        })
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// In-memory backend. Does not persist across process restarts.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.entries.lock().map_err(|_| StorageError::Unavailable {
            message: "memory store lock poisoned".into(),
        })
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries()?.remove(key);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Infallible façade over a [`StorageBackend`].
#[derive(Clone)]
pub struct StorageAdapter {
    backend: Arc<dyn StorageBackend>,
}

impl StorageAdapter {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// An adapter over a fresh in-memory backend.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Pick the backend the host configuration asks for.
    ///
    /// A file store with no configured directory falls back to the per-user
    /// data directory; if even that cannot be resolved the adapter runs in
    /// memory.
    pub fn from_config(config: &StorageConfig) -> Self {
        match config.backend {
            StorageKind::Memory => Self::in_memory(),
            StorageKind::File => match config.resolved_dir() {
                Some(dir) => Self::new(Arc::new(FileBackend::new(dir))),
                None => {
                    warn!("No data directory available; using in-memory storage");
                    Self::in_memory()
                }
            },
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(backend = self.backend.name(), key, error = %e, "Storage read failed");
                None
            }
        }
    }

    pub fn set(&self, key: &str, value: &str) {
        if let Err(e) = self.backend.set(key, value) {
            warn!(backend = self.backend.name(), key, error = %e, "Storage write failed");
        }
    }

    pub fn remove(&self, key: &str) {
        if let Err(e) = self.backend.remove(key) {
            warn!(backend = self.backend.name(), key, error = %e, "Storage remove failed");
        }
    }

    /// Read and decode a JSON value. Undecodable data reads as absent.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Stored value is not valid JSON for its type; ignoring");
                None
            }
        }
    }

    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(json) => self.set(key, &json),
            Err(e) => warn!(key, error = %e, "Failed to serialize value for storage"),
        }
    }
}

impl std::fmt::Debug for StorageAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageAdapter")
            .field("backend", &self.backend.name())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A medium that fails every operation.
    #[derive(Default)]
    pub(crate) struct BrokenBackend {
        pub(crate) calls: AtomicUsize,
    }

    impl StorageBackend for BrokenBackend {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Err(StorageError::ReadFailed {
                key: key.into(),
                message: "storage disabled".into(),
            })
        }

        fn set(&self, key: &str, _value: &str) -> Result<(), StorageError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Err(StorageError::WriteFailed {
                key: key.into(),
                message: "quota exceeded".into(),
            })
        }

        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Err(StorageError::Unavailable {
                message: "storage disabled".into(),
            })
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    #[test]
    fn test_memory_set_get_remove() {
        let store = StorageAdapter::in_memory();
        assert!(store.get("k").is_none());
        store.set("k", "v");
        assert_eq!(store.get("k").as_deref(), Some("v"));
        store.set("k", "v2");
        assert_eq!(store.get("k").as_deref(), Some("v2"));
        store.remove("k");
        assert!(store.get("k").is_none());
    }

    #[test]
    fn test_file_backend_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let first = StorageAdapter::new(Arc::new(FileBackend::new(dir.path())));
        first.set("contract-data:contract-review", "{}");

        let second = StorageAdapter::new(Arc::new(FileBackend::new(dir.path())));
        assert_eq!(
            second.get("contract-data:contract-review").as_deref(),
            Some("{}")
        );
    }

    #[test]
    fn test_file_name_encoding() {
        assert_eq!(FileBackend::file_name_for("apiConfig"), "apiConfig.json");
        assert_eq!(
            FileBackend::file_name_for("contract-data:legal-research"),
            "contract-data%3Alegal-research.json"
        );
        assert_ne!(
            FileBackend::file_name_for("a:b"),
            FileBackend::file_name_for("a_b")
        );
    }

    #[test]
    fn test_file_name_encoding_leaves_unreserved_alone() {
        assert_eq!(FileBackend::file_name_for("a~b"), "a~b.json");
        assert_eq!(
            FileBackend::file_name_for("contract-data:custom-query:0123abcd"),
            "contract-data%3Acustom-query%3A0123abcd.json"
        );
        assert_eq!(FileBackend::file_name_for("a/b c"), "a%2Fb%20c.json");
    }

    #[test]
    fn test_file_backend_round_trips_colon_keys() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path());
        backend.set("contract-data:risk-assessment", "{}").unwrap();
        assert!(
            dir.path()
                .join("contract-data%3Arisk-assessment.json")
                .exists()
        );
        assert_eq!(
            backend.get("contract-data:risk-assessment").unwrap().as_deref(),
            Some("{}")
        );
    }

    #[test]
    fn test_broken_backend_never_escapes() {
        let broken = Arc::new(BrokenBackend::default());
        let store = StorageAdapter::new(broken.clone());

        assert!(store.get("k").is_none());
        store.set("k", "v");
        store.remove("k");
        assert!(store.get_json::<serde_json::Value>("k").is_none());
        assert_eq!(broken.calls.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn test_file_backend_unwritable_dir_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        // The "directory" is a regular file, so every write fails.
        let store = StorageAdapter::new(Arc::new(FileBackend::new(&blocker)));
        store.set("k", "v");
        assert!(store.get("k").is_none());
        store.remove("k");
    }

    #[test]
    fn test_get_json_ignores_garbage() {
        let store = StorageAdapter::in_memory();
        store.set("n", "not json");
        assert!(store.get_json::<u32>("n").is_none());
        store.set_json("n", &7u32);
        assert_eq!(store.get_json::<u32>("n"), Some(7));
    }

    #[test]
    fn test_from_config_memory() {
        let config = StorageConfig {
            backend: StorageKind::Memory,
            dir: None,
        };
        assert_eq!(StorageAdapter::from_config(&config).backend_name(), "memory");
    }

    #[test]
    fn test_from_config_file_with_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            backend: StorageKind::File,
            dir: Some(dir.path().to_path_buf()),
        };
        let store = StorageAdapter::from_config(&config);
        assert_eq!(store.backend_name(), "file");
        store.set("x", "1");
        assert!(dir.path().join("x.json").exists());
    }
}
