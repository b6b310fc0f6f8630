//! The operation planner/runner and the in-memory join engine.
//!
//! A stage-two query is compiled into an ordered [`OperationPlan`]
//! (one physical adapter call per node, dependencies expressed as parent
//! back-pointers), executed by [`Operations::run`] into a per-collection
//! [`QueryCache`], and then, unless a native adapter join already combined
//! the results, reassembled into nested parent records by [`integrate`].

pub mod cache;
pub mod integrator;
pub mod plan;
pub mod refine;
pub mod runner;

pub use cache::QueryCache;
pub use integrator::{integrate, left_outer_join, populate, JoinParams, JoinedRow};
pub use plan::{ConnectionDescriptor, Operation, OperationPayload, OperationPlan};
pub use runner::{Operations, RunResult};
