//! Collection metadata: what the planner needs to know about each
//! collection: its primary key, which named connection serves each query
//! method, and whether it is a junction (through) collection realizing a
//! many-to-many association.

use crate::tributary::error::QueryError;
use crate::tributary::query::QueryMethod;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata for one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    /// Identity the query layer refers to this collection by.
    pub identity: String,
    /// Primary key column; drives cache de-duplication and the bare-array
    /// where-shorthand rewrite.
    pub primary_key: String,
    /// Default connection serving this collection.
    pub connection: String,
    /// Per-method connection overrides (the method→connection dictionary).
    pub method_connections: HashMap<QueryMethod, String>,
    /// Whether this collection is a junction/through table.
    pub junction_table: bool,
}

impl CollectionSchema {
    pub fn new(
        identity: impl Into<String>,
        primary_key: impl Into<String>,
        connection: impl Into<String>,
    ) -> Self {
        CollectionSchema {
            identity: identity.into(),
            primary_key: primary_key.into(),
            connection: connection.into(),
            method_connections: HashMap::new(),
            junction_table: false,
        }
    }

    pub fn as_junction_table(mut self) -> Self {
        self.junction_table = true;
        self
    }

    pub fn with_method_connection(
        mut self,
        method: QueryMethod,
        connection: impl Into<String>,
    ) -> Self {
        self.method_connections.insert(method, connection.into());
        self
    }

    /// Connection name serving the given method.
    pub fn connection_for(&self, method: QueryMethod) -> &str {
        self.method_connections
            .get(&method)
            .map(String::as_str)
            .unwrap_or(&self.connection)
    }
}

/// The collection registry: metadata keyed by collection identity.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    collections: HashMap<String, CollectionSchema>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: CollectionSchema) {
        self.collections.insert(schema.identity.clone(), schema);
    }

    pub fn get(&self, identity: &str) -> Option<&CollectionSchema> {
        self.collections.get(identity)
    }

    /// Like [`Registry::get`], but an unknown identity is a descriptive
    /// configuration error.
    pub fn expect(&self, identity: &str) -> Result<&CollectionSchema, QueryError> {
        self.collections
            .get(identity)
            .ok_or_else(|| QueryError::unknown_collection(identity))
    }

    pub fn primary_key(&self, identity: &str) -> Result<&str, QueryError> {
        self.expect(identity).map(|s| s.primary_key.as_str())
    }

    pub fn connection_for(
        &self,
        identity: &str,
        method: QueryMethod,
    ) -> Result<&str, QueryError> {
        Ok(self.expect(identity)?.connection_for(method))
    }

    /// All registered collection identities.
    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_connection_overrides_fall_back_to_default() {
        let schema = CollectionSchema::new("user", "id", "primary")
            .with_method_connection(QueryMethod::Create, "writer");
        assert_eq!(schema.connection_for(QueryMethod::Create), "writer");
        assert_eq!(schema.connection_for(QueryMethod::Find), "primary");
    }

    #[test]
    fn expect_reports_unknown_collections() {
        let registry = Registry::new();
        let err = registry.expect("ghost").unwrap_err();
        assert!(matches!(
            err,
            QueryError::UnknownCollection { identity } if identity == "ghost"
        ));
    }
}
