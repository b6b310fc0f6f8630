pub mod adapter;
pub mod datastore;
pub mod engine;
pub mod error;
pub mod query;
pub mod record;
pub mod schema;

// Re-export main API
pub use adapter::{Adapter, AdapterError, MemoryAdapter};
pub use datastore::Datastore;
pub use engine::{integrate, Operations, QueryCache, RunResult};
pub use error::QueryError;
pub use query::{Criteria, JoinInstruction, QueryMethod, StageTwoQuery, WhereClause};
pub use record::{Record, Value};
pub use schema::{CollectionSchema, Registry};

/// Crate version, surfaced for diagnostics.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
