//! Denormalizer: attach joined rows onto the correct alias field of each
//! parent row.

use super::left_outer_join::JoinedRow;
use crate::tributary::record::{Record, Value};

/// For each result row, the joined rows whose parent linkage equals the
/// row's `results_pk` value become `row[alias]`: a (possibly empty) array
/// for plural associations, or the first match (`Null` when unmatched) for
/// singular ones. The attached objects are projected through `select` when
/// one is given.
///
/// One-shot per alias per call: invoking it twice for the same alias
/// overwrites the previous attachment with rows that no longer join.
pub fn populate(
    results: &mut [Record],
    alias: &str,
    joined: Vec<JoinedRow>,
    results_pk: &str,
    select: Option<&[String]>,
    singular: bool,
) {
    for row in results.iter_mut() {
        let pk = row.get(results_pk).cloned().unwrap_or(Value::Null);
        let mut matches: Vec<Value> = Vec::new();
        if !pk.is_null() {
            for j in &joined {
                if j.parent_pk == pk {
                    matches.push(Value::Struct(projected(j, select)));
                }
            }
        }
        let attached = if singular {
            matches.into_iter().next().unwrap_or(Value::Null)
        } else {
            Value::Array(matches)
        };
        row.set(alias, attached);
    }
}

fn projected(
    row: &JoinedRow,
    select: Option<&[String]>,
) -> std::collections::HashMap<String, Value> {
    match select {
        Some(fields) => row
            .fields
            .iter()
            .filter(|(name, _)| fields.iter().any(|f| f == *name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect(),
        None => row.fields.clone(),
    }
}
