//! The stage-two query model.
//!
//! A stage-two query is the normalized, validated descriptor this layer
//! consumes: a method, a target collection, pushed-down criteria, and zero
//! or more join instructions describing association populates. Criteria
//! normalization itself happens upstream; everything here is assumed
//! well-formed.

pub mod criteria;
pub mod join;
pub mod stage_two;

pub use criteria::{Comparison, Criteria, SortDirection, SortDirective, WhereClause};
pub use join::JoinInstruction;
pub use stage_two::{QueryMethod, StageTwoQuery};
