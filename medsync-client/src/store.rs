//! Durable key-value storage.
//!
//! The core persists everything (queue, cache, endpoints, session) as JSON
//! strings under fixed keys in an external key-value store. This module
//! provides the trait for that store, an in-memory implementation for tests,
//! and a single-file JSON implementation for the CLI.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StorageError;

/// Keys used in the key-value store.
pub mod keys {
    /// Bearer token of the active session.
    pub const SESSION_TOKEN: &str = "session_token";
    /// Id of the active session.
    pub const SESSION_ID: &str = "session_id";
    /// Language of the local participant.
    pub const USER_LANGUAGE: &str = "user_language";
    /// JSON array of queue items.
    pub const OFFLINE_QUEUE: &str = "offline_queue";
    /// JSON map fingerprint → cache entry.
    pub const TRANSLATION_CACHE: &str = "translation_cache";
    /// JSON array of discovered endpoint descriptors.
    pub const EDGE_DEVICES: &str = "edge_devices";
    /// Address of the most recently used edge.
    pub const PREFERRED_EDGE: &str = "preferred_edge";
}

/// Trait for the durable key-value store.
///
/// Values are opaque strings; callers store JSON.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value. `Ok(None)` if the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a value. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Read and decode a JSON value.
pub async fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match store.get(key).await? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StorageError::Decode {
                key: key.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

/// Encode and write a JSON value.
pub async fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value).map_err(|source| StorageError::Encode {
        key: key.to_string(),
        source,
    })?;
    store.set(key, &raw).await
}

/// In-memory store for testing.
///
/// Not persistent - all data is lost when the last clone is dropped.
/// Writes can be made to fail to exercise rollback paths.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    values: HashMap<String, String>,
    fail_writes: bool,
    write_count: usize,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryStoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every subsequent `set`/`remove` fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.lock().write_count
    }

    /// Raw value for a key, bypassing the async API.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.lock().values.get(key).cloned()
    }

    /// Seed a raw value, bypassing the async API.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.lock().values.insert(key.to_string(), value.to_string());
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock().values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(StorageError::Backend {
                operation: "set",
                key: key.to_string(),
                message: "injected write failure".to_string(),
            });
        }
        inner.values.insert(key.to_string(), value.to_string());
        inner.write_count += 1;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(StorageError::Backend {
                operation: "remove",
                key: key.to_string(),
                message: "injected write failure".to_string(),
            });
        }
        inner.values.remove(key);
        inner.write_count += 1;
        Ok(())
    }
}

/// Store backed by a single JSON object file.
///
/// The whole map is rewritten on every mutation via a temporary file and
/// rename, so a crash leaves either the old or the new contents.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: tokio::sync::Mutex<Option<BTreeMap<String, String>>>,
}

impl FileStore {
    /// Use (or create on first write) the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            values: tokio::sync::Mutex::new(None),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backend_error(&self, operation: &'static str, key: &str, e: impl ToString) -> StorageError {
        StorageError::Backend {
            operation,
            key: key.to_string(),
            message: format!("{}: {}", self.path.display(), e.to_string()),
        }
    }

    async fn load(&self, key: &str) -> Result<BTreeMap<String, String>, StorageError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => serde_json::from_str(&content).map_err(|source| StorageError::Decode {
                key: key.to_string(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(self.backend_error("get", key, e)),
        }
    }

    async fn flush(
        &self,
        operation: &'static str,
        key: &str,
        values: &BTreeMap<String, String>,
    ) -> Result<(), StorageError> {
        let content = serde_json::to_string_pretty(values).map_err(|source| StorageError::Encode {
            key: key.to_string(),
            source,
        })?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.backend_error(operation, key, e))?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| self.backend_error(operation, key, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.backend_error(operation, key, e))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut guard = self.values.lock().await;
        if guard.is_none() {
            *guard = Some(self.load(key).await?);
        }
        Ok(guard.as_ref().and_then(|values| values.get(key).cloned()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self.values.lock().await;
        let mut values = match guard.take() {
            Some(values) => values,
            None => self.load(key).await?,
        };
        let previous = values.insert(key.to_string(), value.to_string());
        let result = self.flush("set", key, &values).await;
        if result.is_err() {
            match previous {
                Some(old) => values.insert(key.to_string(), old),
                None => values.remove(key),
            };
        }
        *guard = Some(values);
        result
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self.values.lock().await;
        let mut values = match guard.take() {
            Some(values) => values,
            None => self.load(key).await?,
        };
        let Some(previous) = values.remove(key) else {
            *guard = Some(values);
            return Ok(());
        };
        let result = self.flush("remove", key, &values).await;
        if result.is_err() {
            values.insert(key.to_string(), previous);
        }
        *guard = Some(values);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ===========================================
    // MemoryStore
    // ===========================================

    #[tokio::test]
    async fn memory_store_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_store_injected_failure() {
        let store = MemoryStore::new();
        store.set("k", "v1").await.unwrap();
        store.fail_writes(true);

        let result = store.set("k", "v2").await;
        assert!(matches!(result, Err(StorageError::Backend { .. })));
        assert_eq!(store.raw("k").as_deref(), Some("v1"));

        store.fail_writes(false);
        store.set("k", "v2").await.unwrap();
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn memory_store_clone_shares_state() {
        let a = MemoryStore::new();
        let b = a.clone();
        a.set("k", "v").await.unwrap();
        assert_eq!(b.get("k").await.unwrap().as_deref(), Some("v"));
    }

    // ===========================================
    // JSON helpers
    // ===========================================

    #[tokio::test]
    async fn json_helpers_roundtrip_and_decode_error() {
        let store = MemoryStore::new();
        save_json(&store, "list", &vec![1u32, 2, 3]).await.unwrap();
        let back: Option<Vec<u32>> = load_json(&store, "list").await.unwrap();
        assert_eq!(back, Some(vec![1, 2, 3]));

        store.insert_raw("bad", "{not json");
        let result: Result<Option<Vec<u32>>, _> = load_json(&store, "bad").await;
        assert!(matches!(result, Err(StorageError::Decode { .. })));
    }

    // ===========================================
    // FileStore
    // ===========================================

    #[tokio::test]
    async fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStore::new(&path);
        store.set(keys::SESSION_ID, "sess-1").await.unwrap();
        store.set(keys::USER_LANGUAGE, "es").await.unwrap();
        store.remove(keys::USER_LANGUAGE).await.unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(
            reopened.get(keys::SESSION_ID).await.unwrap().as_deref(),
            Some("sess-1")
        );
        assert_eq!(reopened.get(keys::USER_LANGUAGE).await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("state.json"));
        assert_eq!(store.get("anything").await.unwrap(), None);
        store.remove("anything").await.unwrap();
    }

    #[tokio::test]
    async fn file_store_corrupt_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "][").unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(
            store.get("k").await,
            Err(StorageError::Decode { .. })
        ));
    }
}
