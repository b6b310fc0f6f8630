//! Post-integration refinement.
//!
//! The integrator guarantees correct membership only. Predicates over
//! joined aliases cannot be pushed to any single adapter, and
//! many-to-many pagination cannot be expressed adapter-side either, so
//! after integration the finder re-applies the original top-level where
//! (minus the join-only keys) against the denormalized rows, and
//! re-applies sort/skip/limit to junction-joined aliases in memory.

use crate::tributary::query::{Criteria, JoinInstruction, StageTwoQuery};
use crate::tributary::record::{Record, Value};
use std::collections::{HashMap, HashSet};

/// Re-apply the parts of the query no single adapter could honor.
pub fn refine(results: Vec<Record>, query: &StageTwoQuery) -> Vec<Record> {
    let aliases: HashSet<String> = query.joins.iter().map(|j| j.alias.clone()).collect();
    let stripped = query.criteria.where_clause.without_fields(&aliases);
    let mut results: Vec<Record> = results
        .into_iter()
        .filter(|row| stripped.matches(row))
        .collect();

    // Junction aliases: per-parent pagination happens here, in memory.
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for join in &query.joins {
        *counts.entry(join.alias.as_str()).or_default() += 1;
    }
    for join in &query.joins {
        if !join.junction || counts.get(join.alias.as_str()) != Some(&2) {
            continue;
        }
        if let Some(criteria) = &join.criteria {
            paginate_alias(&mut results, &join.alias, criteria);
        }
    }

    results
}

/// Apply every association's sort/skip/limit to its attached rows. Used by
/// adapters implementing a native join over in-memory state, where nothing
/// was paginated at fetch time.
pub fn paginate_aliases(results: &mut [Record], joins: &[JoinInstruction]) {
    for join in joins {
        if let Some(criteria) = &join.criteria {
            paginate_alias(results, &join.alias, criteria);
        }
    }
}

/// Sort, skip and limit one alias's attached array on every parent row.
fn paginate_alias(results: &mut [Record], alias: &str, criteria: &Criteria) {
    if criteria.sort.is_empty() && criteria.limit.is_none() && criteria.skip == 0 {
        return;
    }
    let window = Criteria {
        sort: criteria.sort.clone(),
        limit: criteria.limit,
        skip: criteria.skip,
        ..Criteria::all()
    };
    for row in results.iter_mut() {
        let Some(Value::Array(items)) = row.get(alias).cloned() else {
            continue;
        };
        let attached: Vec<Record> = items
            .into_iter()
            .filter_map(|item| match item {
                Value::Struct(fields) => Some(Record::from(fields)),
                _ => None,
            })
            .collect();
        let windowed = window.apply(attached);
        row.set(
            alias,
            Value::Array(
                windowed
                    .into_iter()
                    .map(|r| Value::Struct(r.fields))
                    .collect(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tributary::query::SortDirective;

    fn row(json: serde_json::Value) -> Record {
        Record::from_json(json).expect("object fixture")
    }

    #[test]
    fn paginate_alias_windows_each_parent_independently() {
        let mut results = vec![row(serde_json::json!({
            "id": 1,
            "roles": [
                {"id": 20, "rank": 2},
                {"id": 10, "rank": 1},
                {"id": 30, "rank": 3},
            ],
        }))];
        let criteria = Criteria::all()
            .with_sort(vec![SortDirective::ascending("rank")])
            .with_limit(2);
        paginate_alias(&mut results, "roles", &criteria);

        match results[0].get("roles") {
            Some(Value::Array(items)) => {
                assert_eq!(items.len(), 2);
                match &items[0] {
                    Value::Struct(fields) => {
                        assert_eq!(fields.get("id"), Some(&Value::Integer(10)));
                    }
                    other => panic!("expected struct, got {:?}", other),
                }
            }
            other => panic!("expected array, got {:?}", other),
        }
    }
}
