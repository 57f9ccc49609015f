// src/cache.rs

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

/// In-memory store of raw query results, keyed by query fingerprint.
///
/// Backs the cache policies on [`crate::query::ParseQuery`]; entries
/// hold the undeserialized `results` payload so one cached response can
/// serve differently-typed readers.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: Mutex<HashMap<String, Value>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.contains_key(fingerprint))
            .unwrap_or(false)
    }

    pub fn get(&self, fingerprint: &str) -> Option<Value> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(fingerprint).cloned())
    }

    pub fn store(&self, fingerprint: &str, results: Value) {
        if let Ok(mut entries) = self.entries.lock() {
            log::debug!("Caching query result for {}", fingerprint);
            entries.insert(fingerprint.to_string(), results);
        }
    }

    pub fn remove(&self, fingerprint: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(fingerprint);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}
