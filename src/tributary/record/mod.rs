//! Core row data types.
//!
//! This module contains the fundamental data types passed between adapters
//! and the query engine:
//! - [`Value`] - the field value type system
//! - [`Record`] - the raw row format adapters produce and the integrator
//!   reassembles

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A value in a record field.
///
/// Covers the scalar types adapters exchange plus the compound shapes the
/// integrator attaches for populated aliases (`Array` of `Struct` for plural
/// associations, a bare `Struct` for singular ones).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// SQL-style NULL / absent value
    Null,
    /// Boolean value
    Boolean(bool),
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit floating point number
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Timestamp (no timezone; adapters normalize before handing rows over)
    Timestamp(NaiveDateTime),
    /// Ordered list of values
    Array(Vec<Value>),
    /// Structured data with named fields
    Struct(HashMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Rank used to order values of different types; within a rank the
    /// type's own ordering applies.
    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Integer(_) | Value::Float(_) => 2,
            Value::String(_) => 3,
            Value::Timestamp(_) => 4,
            Value::Array(_) => 5,
            Value::Struct(_) => 6,
        }
    }

    /// Total ordering across all values, used by sort comparators.
    ///
    /// Integers and floats compare numerically against each other; all other
    /// cross-type comparisons fall back to a fixed type rank so sorting is
    /// always total and deterministic.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Integer(a), Value::Float(b)) => (*a as f64).total_cmp(b),
            (Value::Float(a), Value::Integer(b)) => a.total_cmp(&(*b as f64)),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.compare(y) {
                        Ordering::Equal => {}
                        other => return other,
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Struct(a), Value::Struct(b)) => {
                let mut left: Vec<_> = a.iter().collect();
                let mut right: Vec<_> = b.iter().collect();
                left.sort_by(|x, y| x.0.cmp(y.0));
                right.sort_by(|x, y| x.0.cmp(y.0));
                for ((ka, va), (kb, vb)) in left.iter().zip(right.iter()) {
                    match ka.cmp(kb).then_with(|| va.compare(vb)) {
                        Ordering::Equal => {}
                        other => return other,
                    }
                }
                left.len().cmp(&right.len())
            }
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }

    /// Convert from a `serde_json` value. Numbers become `Integer` when they
    /// fit in `i64`, otherwise `Float`.
    pub fn from_json(value: serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Struct(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            // Bit equality keeps Eq reflexive for NaN
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Struct(a), Value::Struct(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_rank().hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::Timestamp(t) => t.hash(state),
            Value::Array(items) => {
                for item in items {
                    item.hash(state);
                }
            }
            Value::Struct(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                for (key, value) in entries {
                    key.hash(state);
                    value.hash(state);
                }
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
            Value::Timestamp(t) => write!(f, "{}", t),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Struct(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// A raw row as produced by an adapter and consumed by the join engine.
///
/// Populated aliases are attached as extra fields: a `Value::Array` of
/// `Value::Struct` for plural associations, or a single `Value::Struct`
/// (`Value::Null` when unmatched) for singular ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Record {
    pub fields: HashMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Keep only the named fields.
    pub fn project(&self, fields: &[String]) -> Record {
        Record {
            fields: self
                .fields
                .iter()
                .filter(|(k, _)| fields.iter().any(|f| f == *k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// Remove the named fields.
    pub fn without(&self, fields: &[String]) -> Record {
        Record {
            fields: self
                .fields
                .iter()
                .filter(|(k, _)| !fields.iter().any(|f| f == *k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// Build a record from a JSON object. Returns `None` for non-objects.
    pub fn from_json(value: serde_json::Value) -> Option<Record> {
        match Value::from_json(value) {
            Value::Struct(fields) => Some(Record { fields }),
            _ => None,
        }
    }
}

impl From<HashMap<String, Value>> for Record {
    fn from(fields: HashMap<String, Value>) -> Self {
        Record { fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_cross_type_comparison() {
        assert_eq!(
            Value::Integer(2).compare(&Value::Float(2.5)),
            Ordering::Less
        );
        assert_eq!(
            Value::Float(3.0).compare(&Value::Integer(2)),
            Ordering::Greater
        );
    }

    #[test]
    fn null_sorts_before_everything() {
        assert_eq!(Value::Null.compare(&Value::Integer(-100)), Ordering::Less);
        assert_eq!(
            Value::String("a".into()).compare(&Value::Null),
            Ordering::Greater
        );
    }

    #[test]
    fn float_equality_is_reflexive_for_nan() {
        let nan = Value::Float(f64::NAN);
        assert_eq!(nan, nan.clone());
    }

    #[test]
    fn record_from_json_object() {
        let record = Record::from_json(serde_json::json!({
            "id": 1,
            "name": "fin",
            "weight": 4.5,
        }))
        .expect("object fixture");
        assert_eq!(record.get("id"), Some(&Value::Integer(1)));
        assert_eq!(record.get("name"), Some(&Value::String("fin".into())));
        assert_eq!(record.get("weight"), Some(&Value::Float(4.5)));
        assert!(Record::from_json(serde_json::json!([1, 2])).is_none());
    }

    #[test]
    fn projection_keeps_and_drops_named_fields() {
        let record = Record::from_json(serde_json::json!({"a": 1, "b": 2, "c": 3})).unwrap();
        let kept = record.project(&["a".into(), "c".into()]);
        assert_eq!(kept.fields.len(), 2);
        assert!(kept.contains("a") && kept.contains("c"));
        let dropped = record.without(&["b".into()]);
        assert!(!dropped.contains("b"));
        assert_eq!(dropped.fields.len(), 2);
    }
}
