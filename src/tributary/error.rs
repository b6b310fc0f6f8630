//! Query-layer error types.
//!
//! Two kinds of failures flow through this layer and they are kept
//! distinct: consistency/configuration errors (unknown collections,
//! missing connections, malformed integrator input) are programmer or
//! schema errors surfaced immediately and never retried; adapter errors
//! are wrapped with the operation's context and propagated verbatim as the
//! `source`. Either way the remainder of the plan is aborted: callers get
//! a complete result or an error, never a partial one.

use crate::tributary::adapter::AdapterError;
use crate::tributary::query::QueryMethod;

/// Errors produced by the planner, runner and integrator.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// A query or join instruction referenced a collection the registry
    /// does not know about.
    #[error("unknown collection '{identity}' referenced by the query")]
    UnknownCollection { identity: String },

    /// An operation resolved to a connection with no registered adapter.
    #[error("no adapter registered for connection '{connection}'")]
    UnknownConnection { connection: String },

    /// An alias chains more join instructions than the engine supports.
    #[error(
        "association '{alias}' chains {depth} join instructions; \
         only one-hop and two-hop (junction) joins are supported"
    )]
    UnsupportedJoinDepth { alias: String, depth: usize },

    /// A junction hop appeared without the first hop it depends on.
    #[error("invalid join chain for association '{alias}': {reason}")]
    InvalidJoinChain { alias: String, reason: String },

    /// The integrator was handed input it cannot work with.
    #[error("malformed integrator input: {reason}")]
    MalformedIntegratorInput { reason: String },

    /// An operation plan violated one of the builder's own invariants.
    /// Indicates a bug in the planner, not in caller input.
    #[error("invalid operation plan: {reason}")]
    InvalidPlan { reason: String },

    /// An adapter call failed; the original error is preserved as the
    /// source and the rest of the plan is aborted.
    #[error("adapter error on connection '{connection}' running '{method}' on '{collection}': {source}")]
    Adapter {
        connection: String,
        collection: String,
        method: QueryMethod,
        #[source]
        source: AdapterError,
    },
}

impl QueryError {
    pub fn unknown_collection(identity: impl Into<String>) -> Self {
        QueryError::UnknownCollection {
            identity: identity.into(),
        }
    }

    pub fn malformed_integrator_input(reason: impl Into<String>) -> Self {
        QueryError::MalformedIntegratorInput {
            reason: reason.into(),
        }
    }

    pub fn invalid_plan(reason: impl Into<String>) -> Self {
        QueryError::InvalidPlan {
            reason: reason.into(),
        }
    }

    pub fn adapter(
        connection: impl Into<String>,
        collection: impl Into<String>,
        method: QueryMethod,
        source: AdapterError,
    ) -> Self {
        QueryError::Adapter {
            connection: connection.into(),
            collection: collection.into(),
            method,
            source,
        }
    }
}
