//! # tributary
//!
//! A database-agnostic query layer. Declarative criteria (with optional
//! association "populates") are compiled into an ordered plan of physical
//! per-adapter operations, executed against one or more independent storage
//! adapters, and reassembled into nested results by an in-memory join engine,
//! reproducing the semantics of a native SQL join across backends that may
//! not share a connection, or may not support joins at all.
//!
//! ## Features
//!
//! - **Heterogeneous adapters**: collections may live on different
//!   connections; a single logical query spans all of them
//! - **Native-join short-circuit**: when every joined collection shares one
//!   connection and the adapter reports join support, the whole query is
//!   pushed down as a single native operation
//! - **In-memory integration**: pure hash left-outer-joins plus per-alias
//!   population, including many-to-many associations through junction
//!   collections and self-referential associations
//! - **Per-parent pagination**: "top N children per parent" is honored by
//!   fanning out one operation per parent key when a single `IN` query
//!   cannot express it
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tributary::{
//!     CollectionSchema, Criteria, Datastore, JoinInstruction, MemoryAdapter,
//!     Registry, StageTwoQuery,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut registry = Registry::new();
//!     registry.register(CollectionSchema::new("user", "id", "default"));
//!     registry.register(CollectionSchema::new("pet", "id", "default"));
//!
//!     let adapter = Arc::new(MemoryAdapter::new());
//!     let datastore = Datastore::new(registry).with_connection("default", adapter);
//!
//!     let query = StageTwoQuery::find("user")
//!         .populate(JoinInstruction::new("user", "id", "pet", "owner", "pets"));
//!     let users = datastore.find(query).await?;
//!     println!("{} users", users.len());
//!     Ok(())
//! }
//! ```

pub mod tributary;

// Re-export the main API at the crate root
pub use tributary::adapter::{Adapter, AdapterError, MemoryAdapter};
pub use tributary::datastore::Datastore;
pub use tributary::engine::{
    integrate, left_outer_join, populate, JoinParams, JoinedRow, Operation, OperationPayload,
    OperationPlan, Operations, QueryCache, RunResult,
};
pub use tributary::error::QueryError;
pub use tributary::query::{
    Criteria, JoinInstruction, QueryMethod, SortDirection, SortDirective, StageTwoQuery,
    WhereClause,
};
pub use tributary::record::{Record, Value};
pub use tributary::schema::{CollectionSchema, Registry};
