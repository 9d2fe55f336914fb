//! Translation result cache table.

use std::collections::BTreeMap;

use medsync_types::{unix_millis, Fingerprint, TranslationResult};
use serde::{Deserialize, Serialize};

/// A previously computed translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Fingerprint of the request that produced this result.
    pub fingerprint: Fingerprint,
    /// The translation.
    pub translated_result: TranslationResult,
    /// Unix milliseconds when the result was computed.
    pub computed_at: u64,
}

/// Fingerprint → result map. Entries never expire.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheTable {
    entries: BTreeMap<Fingerprint, CacheEntry>,
}

impl CacheTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a persisted map.
    pub fn from_entries(entries: BTreeMap<Fingerprint, CacheEntry>) -> Self {
        Self { entries }
    }

    /// Look up a result.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&CacheEntry> {
        self.entries.get(fingerprint)
    }

    /// Store a freshly computed result, replacing any older one.
    pub fn insert(&mut self, fingerprint: Fingerprint, result: TranslationResult) -> CacheEntry {
        let entry = CacheEntry {
            fingerprint,
            translated_result: result,
            computed_at: unix_millis(),
        };
        self.entries.insert(fingerprint, entry.clone());
        entry
    }

    /// Number of cached results.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The underlying map, for persistence.
    pub fn entries(&self) -> &BTreeMap<Fingerprint, CacheEntry> {
        &self.entries
    }
}
