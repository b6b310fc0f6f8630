//! Shared fixtures and adapter doubles for the integration tests.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::Mutex;
use tributary::{
    Adapter, AdapterError, CollectionSchema, Criteria, JoinInstruction, MemoryAdapter, QueryMethod,
    Record, Registry,
};

/// Build a record from a JSON object literal.
pub fn row(json: serde_json::Value) -> Record {
    Record::from_json(json).expect("test fixtures are JSON objects")
}

/// Registry covering the shared fixture collections: users and pets plus a
/// user↔role many-to-many through `user_roles`.
pub fn fixture_registry(user_connection: &str, pet_connection: &str) -> Registry {
    let mut registry = Registry::new();
    registry.register(CollectionSchema::new("user", "id", user_connection));
    registry.register(CollectionSchema::new("pet", "id", pet_connection));
    registry.register(CollectionSchema::new("role", "id", pet_connection));
    registry.register(
        CollectionSchema::new("user_roles", "id", pet_connection).as_junction_table(),
    );
    registry
}

/// The standard user→pets populate instruction.
pub fn pets_join() -> JoinInstruction {
    JoinInstruction::new("user", "id", "pet", "owner", "pets")
}

/// The standard user→roles many-to-many pair (through `user_roles`).
pub fn roles_joins() -> (JoinInstruction, JoinInstruction) {
    (
        JoinInstruction::new("user", "id", "user_roles", "user", "roles"),
        JoinInstruction::new("user_roles", "role", "role", "id", "roles"),
    )
}

/// One recorded adapter call.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterCall {
    pub method: QueryMethod,
    pub collection: String,
    pub criteria: Criteria,
}

/// Wraps an adapter and records every call made through it.
pub struct RecordingAdapter {
    inner: MemoryAdapter,
    calls: Mutex<Vec<AdapterCall>>,
}

impl RecordingAdapter {
    pub fn new(inner: MemoryAdapter) -> Arc<Self> {
        Arc::new(RecordingAdapter {
            inner,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<AdapterCall> {
        self.calls.lock().expect("call log lock").clone()
    }

    pub fn calls_for(&self, collection: &str) -> Vec<AdapterCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.collection == collection)
            .collect()
    }

    fn record(&self, method: QueryMethod, collection: &str, criteria: &Criteria) {
        self.calls.lock().expect("call log lock").push(AdapterCall {
            method,
            collection: collection.to_string(),
            criteria: criteria.clone(),
        });
    }

    pub async fn seed(&self, collection: &str, rows: Vec<Record>) {
        self.inner.seed(collection, rows).await;
    }
}

#[async_trait]
impl Adapter for RecordingAdapter {
    async fn find(
        &self,
        collection: &str,
        criteria: &Criteria,
    ) -> Result<Vec<Record>, AdapterError> {
        self.record(QueryMethod::Find, collection, criteria);
        self.inner.find(collection, criteria).await
    }

    async fn find_one(
        &self,
        collection: &str,
        criteria: &Criteria,
    ) -> Result<Option<Record>, AdapterError> {
        self.record(QueryMethod::FindOne, collection, criteria);
        self.inner.find_one(collection, criteria).await
    }

    async fn join(
        &self,
        collection: &str,
        criteria: &Criteria,
        joins: &[JoinInstruction],
    ) -> Result<Vec<Record>, AdapterError> {
        self.record(QueryMethod::Join, collection, criteria);
        self.inner.join(collection, criteria, joins).await
    }

    fn has_join(&self) -> bool {
        self.inner.has_join()
    }

    async fn create(&self, collection: &str, record: Record) -> Result<Record, AdapterError> {
        self.record(QueryMethod::Create, collection, &Criteria::all());
        self.inner.create(collection, record).await
    }

    async fn update(
        &self,
        collection: &str,
        criteria: &Criteria,
        changes: Record,
    ) -> Result<Vec<Record>, AdapterError> {
        self.record(QueryMethod::Update, collection, criteria);
        self.inner.update(collection, criteria, changes).await
    }

    async fn destroy(
        &self,
        collection: &str,
        criteria: &Criteria,
    ) -> Result<Vec<Record>, AdapterError> {
        self.record(QueryMethod::Destroy, collection, criteria);
        self.inner.destroy(collection, criteria).await
    }
}

/// An adapter whose every call fails with a storage error.
pub struct FailingAdapter {
    pub message: String,
}

impl FailingAdapter {
    pub fn new(message: &str) -> Arc<Self> {
        Arc::new(FailingAdapter {
            message: message.to_string(),
        })
    }

    fn fail<T>(&self) -> Result<T, AdapterError> {
        Err(AdapterError::storage(self.message.clone()))
    }
}

#[async_trait]
impl Adapter for FailingAdapter {
    async fn find(&self, _: &str, _: &Criteria) -> Result<Vec<Record>, AdapterError> {
        self.fail()
    }

    async fn find_one(&self, _: &str, _: &Criteria) -> Result<Option<Record>, AdapterError> {
        self.fail()
    }

    async fn create(&self, _: &str, _: Record) -> Result<Record, AdapterError> {
        self.fail()
    }

    async fn update(
        &self,
        _: &str,
        _: &Criteria,
        _: Record,
    ) -> Result<Vec<Record>, AdapterError> {
        self.fail()
    }

    async fn destroy(&self, _: &str, _: &Criteria) -> Result<Vec<Record>, AdapterError> {
        self.fail()
    }
}
