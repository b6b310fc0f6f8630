//! Criteria: the pushed-down portion of a query, plus the single in-memory
//! evaluator used by the reference adapter and post-integration refinement.

use crate::tributary::record::{Record, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

/// Comparison operators for range predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

/// A where-clause tree.
///
/// `Values` is the "bare array supplied as where" shorthand produced by the
/// upstream normalization pipeline; the plan builder rewrites it into an
/// `In` predicate against the target collection's primary key before any
/// adapter or evaluator ever sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WhereClause {
    And(Vec<WhereClause>),
    Or(Vec<WhereClause>),
    Equals(String, Value),
    NotEquals(String, Value),
    In(String, Vec<Value>),
    Compare(String, Comparison, Value),
    Values(Vec<Value>),
}

impl WhereClause {
    /// The empty conjunction: matches every record.
    pub fn all() -> WhereClause {
        WhereClause::And(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, WhereClause::And(children) if children.is_empty())
    }

    /// Conjoin two clauses, flattening away empty sides.
    pub fn and(self, other: WhereClause) -> WhereClause {
        if self.is_empty() {
            other
        } else if other.is_empty() {
            self
        } else {
            WhereClause::And(vec![self, other])
        }
    }

    /// Evaluate this clause against a record. Missing fields behave as
    /// `Value::Null`.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            WhereClause::And(children) => children.iter().all(|c| c.matches(record)),
            WhereClause::Or(children) => children.iter().any(|c| c.matches(record)),
            WhereClause::Equals(field, value) => {
                record.get(field).unwrap_or(&Value::Null) == value
            }
            WhereClause::NotEquals(field, value) => {
                record.get(field).unwrap_or(&Value::Null) != value
            }
            WhereClause::In(field, values) => {
                let actual = record.get(field).unwrap_or(&Value::Null);
                values.iter().any(|v| v == actual)
            }
            WhereClause::Compare(field, op, value) => {
                let actual = record.get(field).unwrap_or(&Value::Null);
                if actual.is_null() || value.is_null() {
                    return false;
                }
                match (actual, value) {
                    // Only same-kind (or numeric) pairs are comparable
                    (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_))
                    | (Value::String(_), Value::String(_))
                    | (Value::Timestamp(_), Value::Timestamp(_))
                    | (Value::Boolean(_), Value::Boolean(_)) => {
                        let ordering = actual.compare(value);
                        match op {
                            Comparison::LessThan => ordering == Ordering::Less,
                            Comparison::LessThanOrEqual => ordering != Ordering::Greater,
                            Comparison::GreaterThan => ordering == Ordering::Greater,
                            Comparison::GreaterThanOrEqual => ordering != Ordering::Less,
                        }
                    }
                    _ => false,
                }
            }
            // Rewritten against the primary key at plan time; a raw Values
            // clause carries no field to test, so it constrains nothing.
            WhereClause::Values(_) => true,
        }
    }

    /// Drop every predicate that names one of the given fields.
    ///
    /// Used by post-integration refinement to re-apply a top-level where
    /// minus the join-only (alias) keys that no single adapter could honor.
    pub fn without_fields(&self, fields: &HashSet<String>) -> WhereClause {
        match self {
            WhereClause::And(children) => WhereClause::And(
                children
                    .iter()
                    .map(|c| c.without_fields(fields))
                    .filter(|c| !c.is_empty())
                    .collect(),
            ),
            WhereClause::Or(children) => {
                let kept: Vec<_> = children
                    .iter()
                    .map(|c| c.without_fields(fields))
                    .filter(|c| !c.is_empty())
                    .collect();
                if kept.is_empty() {
                    WhereClause::all()
                } else {
                    WhereClause::Or(kept)
                }
            }
            WhereClause::Equals(field, _)
            | WhereClause::NotEquals(field, _)
            | WhereClause::In(field, _)
            | WhereClause::Compare(field, _, _) => {
                if fields.contains(field) {
                    WhereClause::all()
                } else {
                    self.clone()
                }
            }
            WhereClause::Values(_) => self.clone(),
        }
    }
}

impl Default for WhereClause {
    fn default() -> Self {
        WhereClause::all()
    }
}

/// Sort direction for one comparator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Ascending => write!(f, "ASC"),
            SortDirection::Descending => write!(f, "DESC"),
        }
    }
}

/// One sort comparator: a field and a direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortDirective {
    pub field: String,
    pub direction: SortDirection,
}

impl SortDirective {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// The pushed-down portion of a query: filter, projection, pagination and
/// ordering. `where_clause` is always present (the empty conjunction stands
/// in for "no filter").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criteria {
    pub where_clause: WhereClause,
    pub select: Option<Vec<String>>,
    pub omit: Vec<String>,
    pub limit: Option<usize>,
    pub skip: usize,
    pub sort: Vec<SortDirective>,
}

impl Default for Criteria {
    fn default() -> Self {
        Criteria::all()
    }
}

impl Criteria {
    /// Unconstrained criteria: match everything, project nothing away.
    pub fn all() -> Self {
        Criteria {
            where_clause: WhereClause::all(),
            select: None,
            omit: Vec::new(),
            limit: None,
            skip: 0,
            sort: Vec::new(),
        }
    }

    pub fn filtered(where_clause: WhereClause) -> Self {
        Criteria {
            where_clause,
            ..Criteria::all()
        }
    }

    pub fn with_select(mut self, fields: Vec<String>) -> Self {
        self.select = Some(fields);
        self
    }

    pub fn with_sort(mut self, sort: Vec<SortDirective>) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.where_clause.matches(record)
    }

    /// Apply the full criteria pipeline in memory:
    /// filter, stable sort, skip/limit, then select/omit projection.
    pub fn apply(&self, rows: Vec<Record>) -> Vec<Record> {
        let mut rows: Vec<Record> = rows.into_iter().filter(|r| self.matches(r)).collect();

        if !self.sort.is_empty() {
            rows.sort_by(|a, b| compare_by(a, b, &self.sort));
        }
        if self.skip > 0 {
            rows = rows.into_iter().skip(self.skip).collect();
        }
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }

        if let Some(select) = &self.select {
            rows = rows.iter().map(|r| r.project(select)).collect();
        }
        if !self.omit.is_empty() {
            rows = rows.iter().map(|r| r.without(&self.omit)).collect();
        }
        rows
    }
}

/// Chain the sort comparators; missing fields sort as `Null`.
pub fn compare_by(a: &Record, b: &Record, sort: &[SortDirective]) -> Ordering {
    for directive in sort {
        let left = a.get(&directive.field).unwrap_or(&Value::Null);
        let right = b.get(&directive.field).unwrap_or(&Value::Null);
        let ordering = match directive.direction {
            SortDirection::Ascending => left.compare(right),
            SortDirection::Descending => right.compare(left),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
