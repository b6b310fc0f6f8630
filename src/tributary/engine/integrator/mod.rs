//! The in-memory join engine.
//!
//! Given a populated cache and the join-instruction list, produces the
//! fully joined parent rows using only in-memory operations: a pure hash
//! left-outer-join per hop, then per-alias population. A two-instruction
//! alias composes two joins through the junction collection, reproducing a
//! relational three-way join.

pub mod left_outer_join;
pub mod populate;

pub use left_outer_join::{left_outer_join, JoinParams, JoinedRow};
pub use populate::populate;

use super::cache::QueryCache;
use crate::tributary::error::QueryError;
use crate::tributary::query::JoinInstruction;
use crate::tributary::record::Record;
use log::debug;

/// Join the cached child rows onto the cached parent rows, alias by alias.
///
/// Clones the parent rows, attaches every alias, and returns them. The
/// parent entry is left in place so a self-referential alias
/// (`child == parent`) can read it as the child side of its join.
/// Aliases with one instruction are direct 1..N / N..1
/// joins; aliases with two instructions go through a junction collection;
/// any other chain length is unsupported. Population is one-shot per alias:
/// integrating the same instructions twice against the same rows is not
/// idempotent.
pub fn integrate(
    cache: &mut QueryCache,
    joins: &[JoinInstruction],
) -> Result<Vec<Record>, QueryError> {
    let Some(first) = joins.first() else {
        return Err(QueryError::malformed_integrator_input(
            "join instruction list is empty",
        ));
    };
    let parent = first.parent.as_str();
    let results_pk = first.parent_key.as_str();
    if !cache.contains(parent) {
        return Err(QueryError::malformed_integrator_input(format!(
            "parent collection '{}' is missing from the cache",
            parent
        )));
    }

    let mut results = cache.rows(parent).to_vec();

    for (alias, instructions) in group_by_alias(joins) {
        let joined = match instructions[..] {
            [join] => left_outer_join(JoinParams {
                left: JoinedRow::seed(&results, results_pk),
                right: cache.rows(&join.child),
                left_key: &join.parent_key,
                right_key: &join.child_key,
            }),
            [through, join] => {
                let stage = left_outer_join(JoinParams {
                    left: JoinedRow::seed(&results, results_pk),
                    right: cache.rows(&through.child),
                    left_key: &through.parent_key,
                    right_key: &through.child_key,
                });
                left_outer_join(JoinParams {
                    left: stage,
                    right: cache.rows(&join.child),
                    left_key: &join.parent_key,
                    right_key: &join.child_key,
                })
            }
            _ => {
                return Err(QueryError::UnsupportedJoinDepth {
                    alias: alias.to_string(),
                    depth: instructions.len(),
                })
            }
        };
        debug!("alias '{}': {} joined rows", alias, joined.len());

        let last = instructions[instructions.len() - 1];
        populate(
            &mut results,
            alias,
            joined,
            results_pk,
            last.select.as_deref(),
            instructions[0].singular,
        );
    }

    Ok(results)
}

/// Group instructions by alias, preserving first-appearance order.
fn group_by_alias(joins: &[JoinInstruction]) -> Vec<(&str, Vec<&JoinInstruction>)> {
    let mut groups: Vec<(&str, Vec<&JoinInstruction>)> = Vec::new();
    for join in joins {
        match groups.iter_mut().find(|(alias, _)| *alias == join.alias) {
            Some((_, instructions)) => instructions.push(join),
            None => groups.push((join.alias.as_str(), vec![join])),
        }
    }
    groups
}
