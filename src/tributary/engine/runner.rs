//! Plan execution.
//!
//! Runs the compiled operation plan against the adapters: parent operation
//! first, then one task per independent alias branch. Branches run
//! concurrently with no throttling (adapters own their pools and
//! backpressure); operations inside a junction's two-hop chain run
//! strictly in series. Each branch returns cache deltas which are folded
//! into the owned [`QueryCache`] after the concurrent join, so no task
//! ever aliases the cache; the junction rewrite is a whole-entry
//! replacement delta. The first adapter error cancels outstanding sibling
//! branches and aborts the run.

use super::cache::QueryCache;
use super::plan::{Operation, OperationPayload, OperationPlan};
use crate::tributary::adapter::Adapter;
use crate::tributary::datastore::Datastore;
use crate::tributary::error::QueryError;
use crate::tributary::query::{
    Criteria, JoinInstruction, QueryMethod, StageTwoQuery, WhereClause,
};
use crate::tributary::record::{Record, Value};
use futures::future::try_join_all;
use log::debug;
use std::collections::HashSet;
use std::sync::Arc;

/// What a finished run hands back: the per-collection cache, and whether a
/// native adapter join already produced the fully nested shape (in which
/// case the integrator must be skipped).
#[derive(Debug)]
pub struct RunResult {
    pub combined: bool,
    pub cache: QueryCache,
}

/// How a branch's fetched rows enter the cache.
enum CacheDelta {
    /// Merge rows, de-duplicating by the collection's primary key.
    Merge { collection: String, rows: Vec<Record> },
    /// Overwrite the entry (the junction rewrite).
    Replace { collection: String, rows: Vec<Record> },
}

/// One independent alias branch: a child operation, optionally chained to
/// the junction second hop that depends on it.
struct Branch<'p> {
    first: &'p Operation,
    second: Option<&'p Operation>,
}

/// A compiled plan bound to the datastore it will run against.
pub struct Operations<'a> {
    context: &'a Datastore,
    query: &'a StageTwoQuery,
    plan: OperationPlan,
}

impl<'a> Operations<'a> {
    /// Compile the query into a plan, validating collections and
    /// connections up front.
    pub fn new(context: &'a Datastore, query: &'a StageTwoQuery) -> Result<Self, QueryError> {
        let plan = OperationPlan::build(context, query)?;
        Ok(Operations {
            context,
            query,
            plan,
        })
    }

    pub fn plan(&self) -> &OperationPlan {
        &self.plan
    }

    /// Execute the plan. The parent operation always completes before any
    /// child is issued; an empty parent result short-circuits so no child
    /// ever runs an unconstrained fetch.
    pub async fn run(&self) -> Result<RunResult, QueryError> {
        let registry = self.context.registry();
        let mut cache = QueryCache::seeded(registry);

        let parent_op = self
            .plan
            .operations
            .first()
            .ok_or_else(|| QueryError::invalid_plan("operation plan is empty"))?;
        let parent_rows = self.run_parent(parent_op).await?;
        debug!(
            "parent operation on '{}' returned {} rows",
            parent_op.collection,
            parent_rows.len()
        );
        cache.replace(&self.query.using, parent_rows);

        if self.plan.pre_combined {
            return Ok(RunResult {
                combined: true,
                cache,
            });
        }
        if cache.rows(&self.query.using).is_empty() {
            return Ok(RunResult {
                combined: false,
                cache,
            });
        }

        let parent_rows = cache.rows(&self.query.using).to_vec();
        let branches = self.branches()?;
        let deltas = try_join_all(
            branches
                .iter()
                .map(|branch| self.run_branch(branch, &parent_rows)),
        )
        .await?;

        for delta in deltas.into_iter().flatten() {
            match delta {
                CacheDelta::Replace { collection, rows } => cache.replace(collection, rows),
                CacheDelta::Merge { collection, rows } => {
                    let primary_key = registry.primary_key(&collection)?.to_string();
                    cache.merge(&collection, rows, &primary_key);
                }
            }
        }

        Ok(RunResult {
            combined: false,
            cache,
        })
    }

    async fn run_parent(&self, op: &Operation) -> Result<Vec<Record>, QueryError> {
        let adapter = self.context.adapter(&op.connection)?;
        match &op.payload {
            OperationPayload::NativeJoin { criteria, joins } => adapter
                .join(&op.collection, criteria, joins)
                .await
                .map_err(|e| self.adapter_failure(op, e)),
            OperationPayload::Criteria(criteria) => match op.method {
                QueryMethod::FindOne => Ok(adapter
                    .find_one(&op.collection, criteria)
                    .await
                    .map_err(|e| self.adapter_failure(op, e))?
                    .into_iter()
                    .collect()),
                _ => adapter
                    .find(&op.collection, criteria)
                    .await
                    .map_err(|e| self.adapter_failure(op, e)),
            },
            OperationPayload::Join(_) => Err(QueryError::invalid_plan(
                "parent operation carries a child join payload",
            )),
        }
    }

    /// Pair each junction second hop with the first hop it depends on. The
    /// plan's ordering invariant (no forward references) makes a single
    /// forward scan sufficient.
    fn branches(&self) -> Result<Vec<Branch<'_>>, QueryError> {
        let mut branches: Vec<Branch<'_>> = Vec::new();
        for op in self.plan.operations.iter().skip(1) {
            match op.parent {
                None => branches.push(Branch {
                    first: op,
                    second: None,
                }),
                Some(dependency) => {
                    let branch = branches
                        .iter_mut()
                        .find(|b| b.first.id == dependency)
                        .ok_or_else(|| {
                            QueryError::invalid_plan(format!(
                                "operation {} depends on unknown operation {}",
                                op.id, dependency
                            ))
                        })?;
                    branch.second = Some(op);
                }
            }
        }
        Ok(branches)
    }

    /// Execute one alias branch strictly in series: first hop, then (for
    /// junction pairs) the second hop, then the junction rewrite.
    async fn run_branch(
        &self,
        branch: &Branch<'_>,
        parent_rows: &[Record],
    ) -> Result<Vec<CacheDelta>, QueryError> {
        let first_join = join_payload(branch.first)?;
        let second_join = branch.second.map(join_payload).transpose()?;

        let keys = distinct_key_values(parent_rows, &first_join.parent_key);
        if keys.is_empty() {
            // A branch with no parent-key values contributes no operation.
            return Ok(Vec::new());
        }

        // The far-side foreign key must survive any projection on the
        // junction fetch, or the second hop has nothing to chase.
        let carry: Vec<&str> = second_join
            .map(|j| vec![j.parent_key.as_str()])
            .unwrap_or_default();
        let first_rows = self
            .fetch_join_rows(branch.first, first_join, keys, &carry, branch.second.is_none())
            .await?;

        let Some(second_op) = branch.second else {
            return Ok(vec![CacheDelta::Merge {
                collection: first_join.child.clone(),
                rows: first_rows,
            }]);
        };
        let second_join = join_payload(second_op)?;

        let far_keys = distinct_key_values(&first_rows, &second_join.parent_key);
        let second_rows = if far_keys.is_empty() {
            Vec::new()
        } else {
            self.fetch_join_rows(second_op, second_join, far_keys, &[], false)
                .await?
        };

        // The junction rows were fetched broadly; once the far side is
        // known, only the rows it actually references stay relevant.
        let referenced: HashSet<&Value> = second_rows
            .iter()
            .filter_map(|r| r.get(&second_join.child_key))
            .filter(|v| !v.is_null())
            .collect();
        let total = first_rows.len();
        let junction_rows: Vec<Record> = first_rows
            .into_iter()
            .filter(|row| {
                row.get(&second_join.parent_key)
                    .is_some_and(|v| referenced.contains(v))
            })
            .collect();
        debug!(
            "junction rewrite for '{}': retained {} of {} rows",
            first_join.child,
            junction_rows.len(),
            total
        );

        Ok(vec![
            CacheDelta::Replace {
                collection: first_join.child.clone(),
                rows: junction_rows,
            },
            CacheDelta::Merge {
                collection: second_join.child.clone(),
                rows: second_rows,
            },
        ])
    }

    /// Fetch the child rows for one join instruction.
    ///
    /// The default shape is a single `child_key IN (...)` query merged with
    /// the association's own criteria. When the association carries
    /// skip/limit, a single IN-query cannot honor per-parent pagination, so
    /// the fetch fans out into one operation per distinct parent key, each
    /// carrying a single-value where plus the skip/limit. Junction second
    /// hops never fan out: their pagination is re-applied in memory after
    /// integration.
    async fn fetch_join_rows(
        &self,
        op: &Operation,
        join: &JoinInstruction,
        keys: Vec<Value>,
        carry_fields: &[&str],
        fan_out_allowed: bool,
    ) -> Result<Vec<Record>, QueryError> {
        let adapter = self.context.adapter(&op.connection)?;
        let child_pk = self
            .context
            .registry()
            .primary_key(&join.child)?
            .to_string();

        if join.is_paginated() && fan_out_allowed {
            debug!(
                "association '{}' is paginated; fanning out {} per-parent operations",
                join.alias,
                keys.len()
            );
            let fetches = keys.into_iter().map(|key| {
                let criteria = child_criteria(
                    join,
                    &child_pk,
                    WhereClause::Equals(join.child_key.clone(), key),
                    carry_fields,
                    true,
                );
                let adapter: Arc<dyn Adapter> = Arc::clone(&adapter);
                let collection = op.collection.clone();
                async move { adapter.find(&collection, &criteria).await }
            });
            let batches = try_join_all(fetches)
                .await
                .map_err(|e| self.adapter_failure(op, e))?;
            Ok(batches.into_iter().flatten().collect())
        } else {
            let criteria = child_criteria(
                join,
                &child_pk,
                WhereClause::In(join.child_key.clone(), keys),
                carry_fields,
                false,
            );
            adapter
                .find(&op.collection, &criteria)
                .await
                .map_err(|e| self.adapter_failure(op, e))
        }
    }

    fn adapter_failure(&self, op: &Operation, source: crate::tributary::adapter::AdapterError) -> QueryError {
        QueryError::adapter(&op.connection, &op.collection, op.method, source)
    }
}

/// Distinct, non-null values of `key` across the rows, in first-seen order.
fn distinct_key_values(rows: &[Record], key: &str) -> Vec<Value> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for row in rows {
        if let Some(value) = row.get(key) {
            if !value.is_null() && seen.insert(value.clone()) {
                out.push(value.clone());
            }
        }
    }
    out
}

fn join_payload(op: &Operation) -> Result<&JoinInstruction, QueryError> {
    match &op.payload {
        OperationPayload::Join(join) => Ok(join),
        _ => Err(QueryError::invalid_plan(format!(
            "child operation {} does not carry a join payload",
            op.id
        ))),
    }
}

/// Build the physical criteria for a child fetch: the key anchor conjoined
/// with the association's own where (a bare value list is re-expressed
/// against the child's primary key), the association's sort, and, only in
/// per-parent mode, its skip/limit. Any select is widened so the join
/// keys survive the projection.
fn child_criteria(
    join: &JoinInstruction,
    child_pk: &str,
    anchor: WhereClause,
    carry_fields: &[&str],
    per_parent: bool,
) -> Criteria {
    let user = join.criteria.clone().unwrap_or_default();
    let user_where = match user.where_clause {
        WhereClause::Values(values) => WhereClause::In(child_pk.to_string(), values),
        other => other,
    };

    let select = user.select.map(|mut fields| {
        for required in [join.child_key.as_str(), child_pk]
            .into_iter()
            .chain(carry_fields.iter().copied())
        {
            if !fields.iter().any(|f| f == required) {
                fields.push(required.to_string());
            }
        }
        fields
    });

    Criteria {
        where_clause: anchor.and(user_where),
        select,
        omit: user.omit,
        limit: if per_parent { user.limit } else { None },
        skip: if per_parent { user.skip } else { 0 },
        sort: user.sort,
    }
}
