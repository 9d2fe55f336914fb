//! Persisted translation result cache.

use std::collections::BTreeMap;
use std::sync::Arc;

use medsync_core::{CacheEntry, CacheTable};
use medsync_types::{Fingerprint, TranslationResult};
use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::store::{keys, load_json, save_json, KeyValueStore};

/// Fingerprint → result cache, written through to `translation_cache`.
pub struct ResultCache {
    store: Arc<dyn KeyValueStore>,
    table: Mutex<CacheTable>,
}

impl ResultCache {
    /// Rehydrate from the store.
    pub async fn load(store: Arc<dyn KeyValueStore>) -> Result<Self, StorageError> {
        let entries: BTreeMap<Fingerprint, CacheEntry> =
            load_json(store.as_ref(), keys::TRANSLATION_CACHE)
                .await?
                .unwrap_or_default();
        Ok(Self {
            store,
            table: Mutex::new(CacheTable::from_entries(entries)),
        })
    }

    /// Look up a previously computed result.
    pub async fn get(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        self.table.lock().await.get(fingerprint).cloned()
    }

    /// Store a freshly computed result. The in-memory table only changes if
    /// the write succeeds.
    pub async fn put(
        &self,
        fingerprint: Fingerprint,
        result: TranslationResult,
    ) -> Result<CacheEntry, StorageError> {
        let mut guard = self.table.lock().await;
        let mut next = guard.clone();
        let entry = next.insert(fingerprint, result);
        save_json(self.store.as_ref(), keys::TRANSLATION_CACHE, next.entries()).await?;
        *guard = next;
        tracing::debug!(%fingerprint, "Cached translation result");
        Ok(entry)
    }

    /// Number of cached results.
    pub async fn len(&self) -> usize {
        self.table.lock().await.len()
    }

    /// Check if the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.table.lock().await.is_empty()
    }
}
