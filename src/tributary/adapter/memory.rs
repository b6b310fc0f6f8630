//! In-memory reference adapter.
//!
//! Backs its collections with a tokio `RwLock`-guarded map and evaluates
//! criteria with the shared in-memory evaluator. Serves as the reference
//! implementation of the [`Adapter`](super::Adapter) contract and as the
//! storage double for the crate's tests. Native join support is opt-in so
//! both planner paths (push-down and in-memory integration) can be
//! exercised against the same fixture data.

use super::{Adapter, AdapterError};
use crate::tributary::engine::{integrate, refine, QueryCache};
use crate::tributary::query::{Criteria, JoinInstruction};
use crate::tributary::record::Record;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

/// A storage adapter holding all of its collections in process memory.
#[derive(Default)]
pub struct MemoryAdapter {
    collections: RwLock<HashMap<String, Vec<Record>>>,
    join_support: bool,
}

impl MemoryAdapter {
    /// An adapter without native join support: joined queries against it
    /// go through the in-memory integrator.
    pub fn new() -> Self {
        Self::default()
    }

    /// An adapter advertising native joins, allowing the planner to push a
    /// whole single-connection query down as one `join` operation.
    pub fn with_native_join() -> Self {
        MemoryAdapter {
            collections: RwLock::new(HashMap::new()),
            join_support: true,
        }
    }

    /// Load fixture rows into a collection, replacing any existing rows.
    pub async fn seed(&self, collection: impl Into<String>, rows: Vec<Record>) {
        self.collections.write().await.insert(collection.into(), rows);
    }

    fn rows_of(store: &HashMap<String, Vec<Record>>, collection: &str) -> Vec<Record> {
        store.get(collection).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    async fn find(
        &self,
        collection: &str,
        criteria: &Criteria,
    ) -> Result<Vec<Record>, AdapterError> {
        let store = self.collections.read().await;
        Ok(criteria.apply(Self::rows_of(&store, collection)))
    }

    async fn find_one(
        &self,
        collection: &str,
        criteria: &Criteria,
    ) -> Result<Option<Record>, AdapterError> {
        let mut limited = criteria.clone();
        limited.limit = Some(1);
        Ok(self.find(collection, &limited).await?.into_iter().next())
    }

    async fn join(
        &self,
        collection: &str,
        criteria: &Criteria,
        joins: &[JoinInstruction],
    ) -> Result<Vec<Record>, AdapterError> {
        if !self.join_support {
            return Err(AdapterError::JoinNotSupported);
        }
        let store = self.collections.read().await;

        // The parent entry holds every row; the pushed-down criteria apply
        // once the aliases are attached, in the order the finder uses.
        let mut cache = QueryCache::new();
        cache.replace(collection, Self::rows_of(&store, collection));
        for join in joins {
            // A self-referential alias reads the parent entry as its child
            // side; unioning into it would turn child rows into parents.
            if join.child == collection {
                continue;
            }
            let scoped = join
                .criteria
                .as_ref()
                .map(|c| Criteria {
                    where_clause: c.where_clause.clone(),
                    sort: c.sort.clone(),
                    ..Criteria::all()
                })
                .unwrap_or_default();
            let fetched = scoped.apply(Self::rows_of(&store, &join.child));
            // Two aliases may target the same collection; union their rows.
            let mut rows = cache.take(&join.child);
            for row in fetched {
                if !rows.contains(&row) {
                    rows.push(row);
                }
            }
            cache.replace(&join.child, rows);
        }
        drop(store);

        let mut results = integrate(&mut cache, joins)
            .map_err(|e| AdapterError::operation_failed("join", e.to_string()))?;

        // Per-parent pagination of attached collections happens after the
        // join, exactly like the finder does for non-native plans.
        refine::paginate_aliases(&mut results, joins);

        // Filter, sort, paginate and project the combined rows. Alias-named
        // predicates are dropped and alias fields survive the projection,
        // the same contract the finder honors.
        let aliases: HashSet<String> = joins.iter().map(|j| j.alias.clone()).collect();
        let mut shaped = criteria.clone();
        shaped.where_clause = shaped.where_clause.without_fields(&aliases);
        if let Some(select) = &mut shaped.select {
            for alias in &aliases {
                if !select.iter().any(|f| f == alias) {
                    select.push(alias.clone());
                }
            }
        }
        shaped.omit.retain(|f| !aliases.contains(f));
        Ok(shaped.apply(results))
    }

    fn has_join(&self) -> bool {
        self.join_support
    }

    async fn create(&self, collection: &str, record: Record) -> Result<Record, AdapterError> {
        let mut store = self.collections.write().await;
        store
            .entry(collection.to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        collection: &str,
        criteria: &Criteria,
        changes: Record,
    ) -> Result<Vec<Record>, AdapterError> {
        let mut store = self.collections.write().await;
        let rows = store.entry(collection.to_string()).or_default();
        let mut updated = Vec::new();
        for row in rows.iter_mut() {
            if criteria.matches(row) {
                for (field, value) in &changes.fields {
                    row.set(field.clone(), value.clone());
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn destroy(
        &self,
        collection: &str,
        criteria: &Criteria,
    ) -> Result<Vec<Record>, AdapterError> {
        let mut store = self.collections.write().await;
        let rows = store.entry(collection.to_string()).or_default();
        let (removed, kept): (Vec<Record>, Vec<Record>) =
            rows.drain(..).partition(|r| criteria.matches(r));
        *rows = kept;
        Ok(removed)
    }
}
