//! Generic storage adapter abstraction.
//!
//! An adapter is a pluggable storage driver implementing a uniform CRUD
//! contract, plus an optional native `join` advertised through the
//! `has_join()` capability probe. A *connection* is a named, configured
//! adapter instance; multiple collections may share one connection, and one
//! logical query may touch several connections. The planner treats this
//! contract as the de facto protocol every backend must implement
//! identically (criteria shape, row shape, error convention).

use crate::tributary::query::{Criteria, JoinInstruction};
use crate::tributary::record::Record;
use async_trait::async_trait;

pub mod memory;

pub use memory::MemoryAdapter;

/// Errors raised by storage adapters.
///
/// The query layer never retries these; retry policy belongs to the
/// adapter and its connection pool.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The adapter was asked about a collection it does not manage.
    #[error("collection '{collection}' is unknown to this adapter")]
    UnknownCollection { collection: String },

    /// Native joins were requested from an adapter that does not
    /// advertise them.
    #[error("adapter does not support native joins")]
    JoinNotSupported,

    /// A storage-side failure (I/O, backend unavailable, driver error).
    #[error("storage failure: {message}")]
    Storage { message: String },

    /// A write violated a storage-side constraint.
    #[error("constraint violation on '{collection}': {message}")]
    ConstraintViolation { collection: String, message: String },

    /// An operation failed for an adapter-specific reason.
    #[error("{operation} failed: {message}")]
    OperationFailed { operation: String, message: String },
}

impl AdapterError {
    pub fn unknown_collection(collection: impl Into<String>) -> Self {
        AdapterError::UnknownCollection {
            collection: collection.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        AdapterError::Storage {
            message: message.into(),
        }
    }

    pub fn operation_failed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        AdapterError::OperationFailed {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// The uniform per-connection storage contract.
///
/// All methods take the collection identity explicitly so one adapter
/// instance can serve every collection bound to its connection.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Fetch every record matching the criteria.
    async fn find(&self, collection: &str, criteria: &Criteria)
        -> Result<Vec<Record>, AdapterError>;

    /// Fetch the first record matching the criteria.
    async fn find_one(
        &self,
        collection: &str,
        criteria: &Criteria,
    ) -> Result<Option<Record>, AdapterError>;

    /// Run a native join: the adapter receives the entire criteria plus the
    /// join instructions and returns fully nested parent records. Only
    /// called when [`Adapter::has_join`] reports `true` and every joined
    /// collection lives on this connection.
    async fn join(
        &self,
        collection: &str,
        criteria: &Criteria,
        joins: &[JoinInstruction],
    ) -> Result<Vec<Record>, AdapterError> {
        let _ = (collection, criteria, joins);
        Err(AdapterError::JoinNotSupported)
    }

    /// Capability probe for native join support.
    fn has_join(&self) -> bool {
        false
    }

    /// Insert a record, returning it as stored.
    async fn create(&self, collection: &str, record: Record) -> Result<Record, AdapterError>;

    /// Update every record matching the criteria with the given field
    /// changes, returning the updated records.
    async fn update(
        &self,
        collection: &str,
        criteria: &Criteria,
        changes: Record,
    ) -> Result<Vec<Record>, AdapterError>;

    /// Delete every record matching the criteria, returning the removed
    /// records.
    async fn destroy(
        &self,
        collection: &str,
        criteria: &Criteria,
    ) -> Result<Vec<Record>, AdapterError>;
}
