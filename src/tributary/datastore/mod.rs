//! The datastore facade: a registry of collection metadata plus named
//! adapter connections, and the finder methods that compose the planner,
//! runner, integrator and refinement into one call.

use crate::tributary::adapter::Adapter;
use crate::tributary::engine::{integrate, refine::refine, Operations};
use crate::tributary::error::QueryError;
use crate::tributary::query::{Criteria, QueryMethod, StageTwoQuery};
use crate::tributary::record::Record;
use crate::tributary::schema::Registry;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

/// A set of collections spread across named adapter connections.
///
/// Owns nothing query-scoped: every `find` builds its plan and cache
/// fresh, and discards them once the rows are returned.
pub struct Datastore {
    registry: Registry,
    connections: HashMap<String, Arc<dyn Adapter>>,
}

impl Datastore {
    pub fn new(registry: Registry) -> Self {
        Datastore {
            registry,
            connections: HashMap::new(),
        }
    }

    /// Bind an adapter instance to a connection name.
    pub fn with_connection(mut self, name: impl Into<String>, adapter: Arc<dyn Adapter>) -> Self {
        self.connections.insert(name.into(), adapter);
        self
    }

    pub fn register_connection(&mut self, name: impl Into<String>, adapter: Arc<dyn Adapter>) {
        self.connections.insert(name.into(), adapter);
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The adapter bound to a connection name.
    pub fn adapter(&self, connection: &str) -> Result<Arc<dyn Adapter>, QueryError> {
        self.connections
            .get(connection)
            .cloned()
            .ok_or_else(|| QueryError::UnknownConnection {
                connection: connection.to_string(),
            })
    }

    /// Run a find query: plan, execute, integrate (unless a native join
    /// already combined the results), then refine.
    pub async fn find(&self, query: StageTwoQuery) -> Result<Vec<Record>, QueryError> {
        debug!(
            "find on '{}' with {} populate(s)",
            query.using,
            query.joins.len()
        );
        let operations = Operations::new(self, &query)?;
        let run = operations.run().await?;
        let mut cache = run.cache;

        if query.joins.is_empty() {
            return Ok(cache.take(&query.using));
        }
        if run.combined {
            // The adapter produced the nested shape natively.
            return Ok(cache.take(&query.using));
        }

        let results = integrate(&mut cache, &query.joins)?;
        Ok(refine(results, &query))
    }

    /// Like [`Datastore::find`], returning the first row.
    pub async fn find_one(&self, mut query: StageTwoQuery) -> Result<Option<Record>, QueryError> {
        query.method = QueryMethod::FindOne;
        Ok(self.find(query).await?.into_iter().next())
    }

    pub async fn create(
        &self,
        collection: &str,
        record: Record,
    ) -> Result<Record, QueryError> {
        let connection = self
            .registry
            .connection_for(collection, QueryMethod::Create)?
            .to_string();
        self.adapter(&connection)?
            .create(collection, record)
            .await
            .map_err(|e| QueryError::adapter(&connection, collection, QueryMethod::Create, e))
    }

    pub async fn update(
        &self,
        collection: &str,
        criteria: &Criteria,
        changes: Record,
    ) -> Result<Vec<Record>, QueryError> {
        let connection = self
            .registry
            .connection_for(collection, QueryMethod::Update)?
            .to_string();
        self.adapter(&connection)?
            .update(collection, criteria, changes)
            .await
            .map_err(|e| QueryError::adapter(&connection, collection, QueryMethod::Update, e))
    }

    pub async fn destroy(
        &self,
        collection: &str,
        criteria: &Criteria,
    ) -> Result<Vec<Record>, QueryError> {
        let connection = self
            .registry
            .connection_for(collection, QueryMethod::Destroy)?
            .to_string();
        self.adapter(&connection)?
            .destroy(collection, criteria)
            .await
            .map_err(|e| QueryError::adapter(&connection, collection, QueryMethod::Destroy, e))
    }
}
