//! Join instructions: the descriptors stating that child rows equal-matching
//! on a key pair should be attached to parent rows under an alias.

use super::criteria::Criteria;
use serde::{Deserialize, Serialize};

/// One hop of an association populate.
///
/// A plural or singular 1..N / N..1 association is a single instruction. A
/// many-to-many association is a pair of instructions sharing an `alias`:
/// the first hops from the parent to the junction collection, the second
/// (flagged `junction`) hops from the junction to the far child. Chains
/// deeper than two hops are rejected at plan time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinInstruction {
    /// Collection the joined rows attach to.
    pub parent: String,
    /// Column on the parent rows providing the join value.
    pub parent_key: String,
    /// Collection the joined rows come from.
    pub child: String,
    /// Column on the child rows matched against `parent_key` values.
    pub child_key: String,
    /// Field name the joined rows are attached under.
    pub alias: String,
    /// Attach a single object (`Null` when unmatched) instead of an array.
    pub singular: bool,
    /// This instruction is the second hop of a many-to-many association;
    /// its `parent` is a junction collection fetched by the preceding
    /// instruction with the same alias.
    pub junction: bool,
    /// Projection applied to the attached child objects.
    pub select: Option<Vec<String>>,
    /// User criteria scoped to the association (where/sort/skip/limit).
    pub criteria: Option<Criteria>,
}

impl JoinInstruction {
    pub fn new(
        parent: impl Into<String>,
        parent_key: impl Into<String>,
        child: impl Into<String>,
        child_key: impl Into<String>,
        alias: impl Into<String>,
    ) -> Self {
        JoinInstruction {
            parent: parent.into(),
            parent_key: parent_key.into(),
            child: child.into(),
            child_key: child_key.into(),
            alias: alias.into(),
            singular: false,
            junction: false,
            select: None,
            criteria: None,
        }
    }

    pub fn as_singular(mut self) -> Self {
        self.singular = true;
        self
    }

    /// Mark this instruction as the second hop of a junction pair.
    pub fn as_junction_hop(mut self) -> Self {
        self.junction = true;
        self
    }

    pub fn with_select(mut self, fields: Vec<String>) -> Self {
        self.select = Some(fields);
        self
    }

    pub fn with_criteria(mut self, criteria: Criteria) -> Self {
        self.criteria = Some(criteria);
        self
    }

    /// Whether the association carries pagination that a single `IN` query
    /// cannot express per parent.
    pub fn is_paginated(&self) -> bool {
        self.criteria
            .as_ref()
            .is_some_and(|c| c.limit.is_some() || c.skip > 0)
    }
}
