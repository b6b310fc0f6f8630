//! Pure equality hash-join of two in-memory row sets.

use crate::tributary::record::{Record, Value};
use std::collections::HashMap;

/// A merged row flowing through a join chain.
///
/// `fields` is the left row's fields merged with the matched right row's
/// fields, right-hand side taking precedence on name collision.
/// `parent_pk` carries the originating parent row's linking value
/// out-of-band, so a child column that happens to share the parent key's
/// name can never sever the parent linkage the populator relies on.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow {
    pub parent_pk: Value,
    pub fields: HashMap<String, Value>,
}

impl JoinedRow {
    /// Lift parent records into the join chain, recording each row's
    /// linking value.
    pub fn seed(rows: &[Record], parent_pk_field: &str) -> Vec<JoinedRow> {
        rows.iter()
            .map(|row| JoinedRow {
                parent_pk: row.get(parent_pk_field).cloned().unwrap_or(Value::Null),
                fields: row.fields.clone(),
            })
            .collect()
    }
}

/// Inputs for one equality hash-join.
pub struct JoinParams<'a> {
    pub left: Vec<JoinedRow>,
    pub right: &'a [Record],
    /// Key looked up on the left rows' merged fields.
    pub left_key: &'a str,
    /// Key looked up on the right records.
    pub right_key: &'a str,
}

/// For every left row, find all right rows whose `right_key` value equals
/// the left row's `left_key` value, and emit one merged row per match.
/// Null keys never match; left rows without a match are dropped (the
/// populator supplies the empty-association shape).
pub fn left_outer_join(params: JoinParams<'_>) -> Vec<JoinedRow> {
    let mut index: HashMap<&Value, Vec<&Record>> = HashMap::new();
    for row in params.right {
        if let Some(key) = row.get(params.right_key) {
            if !key.is_null() {
                index.entry(key).or_default().push(row);
            }
        }
    }

    let mut joined = Vec::new();
    for left in &params.left {
        let Some(key) = left.fields.get(params.left_key) else {
            continue;
        };
        if key.is_null() {
            continue;
        }
        let Some(matches) = index.get(key) else {
            continue;
        };
        for right in matches {
            let mut fields = left.fields.clone();
            for (name, value) in &right.fields {
                fields.insert(name.clone(), value.clone());
            }
            joined.push(JoinedRow {
                parent_pk: left.parent_pk.clone(),
                fields,
            });
        }
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(json: serde_json::Value) -> Record {
        Record::from_json(json).expect("object fixture")
    }

    #[test]
    fn matches_emit_one_merged_row_each() {
        let left = JoinedRow::seed(
            &[row(serde_json::json!({"id": 1})), row(serde_json::json!({"id": 2}))],
            "id",
        );
        let right = [
            row(serde_json::json!({"id": 10, "owner": 1})),
            row(serde_json::json!({"id": 11, "owner": 1})),
            row(serde_json::json!({"id": 12, "owner": 3})),
        ];
        let joined = left_outer_join(JoinParams {
            left,
            right: &right,
            left_key: "id",
            right_key: "owner",
        });
        assert_eq!(joined.len(), 2);
        assert!(joined.iter().all(|j| j.parent_pk == Value::Integer(1)));
    }

    #[test]
    fn right_fields_take_precedence_but_linkage_survives() {
        let left = JoinedRow::seed(&[row(serde_json::json!({"id": 1, "name": "ann"}))], "id");
        let right = [row(serde_json::json!({"id": 10, "owner": 1}))];
        let joined = left_outer_join(JoinParams {
            left,
            right: &right,
            left_key: "id",
            right_key: "owner",
        });
        assert_eq!(joined[0].fields.get("id"), Some(&Value::Integer(10)));
        assert_eq!(joined[0].parent_pk, Value::Integer(1));
    }

    #[test]
    fn null_keys_never_match() {
        let left = JoinedRow::seed(&[row(serde_json::json!({"id": null}))], "id");
        let right = [row(serde_json::json!({"id": 7, "owner": null}))];
        let joined = left_outer_join(JoinParams {
            left,
            right: &right,
            left_key: "id",
            right_key: "owner",
        });
        assert!(joined.is_empty());
    }
}
