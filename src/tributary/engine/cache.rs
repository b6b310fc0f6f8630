//! The per-query collection cache.
//!
//! Holds the raw rows each operation fetched, keyed by collection
//! identity. Seeded with an empty entry for every collection the registry
//! knows before any operation runs, so the integrator never observes a
//! missing entry. Constructed fresh per query invocation and discarded
//! once the caller converts rows into results; there is no cross-query
//! state.

use crate::tributary::record::{Record, Value};
use crate::tributary::schema::Registry;
use log::debug;
use std::collections::{HashMap, HashSet};

/// Collection identity → raw (pre-integration) rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryCache {
    entries: HashMap<String, Vec<Record>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache with an empty entry for every collection in the registry.
    pub fn seeded(registry: &Registry) -> Self {
        let mut entries = HashMap::with_capacity(registry.len());
        for identity in registry.identities() {
            entries.insert(identity.to_string(), Vec::new());
        }
        QueryCache { entries }
    }

    pub fn contains(&self, collection: &str) -> bool {
        self.entries.contains_key(collection)
    }

    /// Rows currently cached for a collection; empty for unknown entries.
    pub fn rows(&self, collection: &str) -> &[Record] {
        self.entries
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Overwrite a collection's entry wholesale. Used for the parent
    /// operation's rows and for the junction rewrite, which replaces a
    /// broad junction fetch with the subset the second hop actually
    /// references.
    pub fn replace(&mut self, collection: impl Into<String>, rows: Vec<Record>) {
        self.entries.insert(collection.into(), rows);
    }

    /// Merge rows into a collection's entry, de-duplicating by the
    /// collection's primary key. Rows without a primary-key value are kept
    /// as-is; the first row seen for a key wins.
    pub fn merge(&mut self, collection: &str, rows: Vec<Record>, primary_key: &str) {
        let entry = self.entries.entry(collection.to_string()).or_default();
        let mut seen: HashSet<Value> = entry
            .iter()
            .filter_map(|r| r.get(primary_key))
            .filter(|v| !v.is_null())
            .cloned()
            .collect();
        let before = entry.len();
        for row in rows {
            match row.get(primary_key) {
                Some(pk) if !pk.is_null() => {
                    if seen.insert(pk.clone()) {
                        entry.push(row);
                    }
                }
                _ => entry.push(row),
            }
        }
        debug!(
            "cache merge for '{}': {} -> {} rows",
            collection,
            before,
            entry.len()
        );
    }

    /// Remove and return a collection's rows, leaving an empty entry.
    pub fn take(&mut self, collection: &str) -> Vec<Record> {
        self.entries.get_mut(collection).map(std::mem::take).unwrap_or_default()
    }

    pub fn collections(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tributary::schema::CollectionSchema;

    fn row(json: serde_json::Value) -> Record {
        Record::from_json(json).expect("object fixture")
    }

    #[test]
    fn seeded_cache_has_an_entry_per_collection() {
        let mut registry = Registry::new();
        registry.register(CollectionSchema::new("user", "id", "default"));
        registry.register(CollectionSchema::new("pet", "id", "default"));
        let cache = QueryCache::seeded(&registry);
        assert!(cache.contains("user"));
        assert!(cache.contains("pet"));
        assert!(cache.rows("user").is_empty());
    }

    #[test]
    fn merge_deduplicates_by_primary_key() {
        let mut cache = QueryCache::new();
        cache.merge(
            "pet",
            vec![row(serde_json::json!({"id": 1})), row(serde_json::json!({"id": 2}))],
            "id",
        );
        cache.merge(
            "pet",
            vec![row(serde_json::json!({"id": 2})), row(serde_json::json!({"id": 3}))],
            "id",
        );
        assert_eq!(cache.rows("pet").len(), 3);
    }

    #[test]
    fn replace_overwrites_the_entry() {
        let mut cache = QueryCache::new();
        cache.merge("link", vec![row(serde_json::json!({"id": 1}))], "id");
        cache.replace("link", vec![row(serde_json::json!({"id": 9}))]);
        assert_eq!(cache.rows("link").len(), 1);
        assert_eq!(
            cache.rows("link")[0].get("id"),
            Some(&Value::Integer(9))
        );
    }
}
