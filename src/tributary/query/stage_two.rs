//! The stage-two query: the validated descriptor handed to the planner.

use super::criteria::Criteria;
use super::join::JoinInstruction;
use crate::tributary::record::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The adapter method a query (or one physical operation of it) runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryMethod {
    Find,
    FindOne,
    Join,
    Create,
    Update,
    Destroy,
}

impl fmt::Display for QueryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryMethod::Find => "find",
            QueryMethod::FindOne => "findOne",
            QueryMethod::Join => "join",
            QueryMethod::Create => "create",
            QueryMethod::Update => "update",
            QueryMethod::Destroy => "destroy",
        };
        write!(f, "{}", name)
    }
}

/// A normalized, validated query: method, target collection, pushed-down
/// criteria, join instructions for populates, and opaque metadata.
///
/// Upstream normalization guarantees the criteria are well-formed; this
/// layer never re-validates shapes, only topology (collections,
/// connections, join-chain depth).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTwoQuery {
    pub method: QueryMethod,
    pub using: String,
    pub criteria: Criteria,
    pub joins: Vec<JoinInstruction>,
    pub meta: HashMap<String, Value>,
}

impl StageTwoQuery {
    pub fn new(method: QueryMethod, using: impl Into<String>) -> Self {
        StageTwoQuery {
            method,
            using: using.into(),
            criteria: Criteria::all(),
            joins: Vec::new(),
            meta: HashMap::new(),
        }
    }

    pub fn find(using: impl Into<String>) -> Self {
        Self::new(QueryMethod::Find, using)
    }

    pub fn find_one(using: impl Into<String>) -> Self {
        Self::new(QueryMethod::FindOne, using)
    }

    pub fn with_criteria(mut self, criteria: Criteria) -> Self {
        self.criteria = criteria;
        self
    }

    /// Append one join instruction.
    pub fn populate(mut self, join: JoinInstruction) -> Self {
        self.joins.push(join);
        self
    }

    /// Append a many-to-many populate: the junction hop is appended right
    /// after its first hop so plan-time ordering invariants hold.
    pub fn populate_through(
        mut self,
        first_hop: JoinInstruction,
        second_hop: JoinInstruction,
    ) -> Self {
        self.joins.push(first_hop);
        self.joins.push(second_hop.as_junction_hop());
        self
    }
}
