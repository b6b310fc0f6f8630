//! Plan compilation: stage-two query + connection topology → an ordered
//! list of physical adapter operations.
//!
//! Plan invariants:
//! - the parent operation is always index 0
//! - no operation references a dependency appearing later in the list;
//!   junction second hops point *backwards* via `parent`
//! - a plan is marked `pre_combined` only when a single native `join`
//!   operation will produce the fully nested shape, in which case the
//!   integrator is skipped entirely

use crate::tributary::datastore::Datastore;
use crate::tributary::error::QueryError;
use crate::tributary::query::{Criteria, JoinInstruction, QueryMethod, StageTwoQuery};
use log::debug;
use std::collections::{HashMap, HashSet};

/// What one physical operation sends to its adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationPayload {
    /// Pushed-down criteria (parent operation, or the sole operation of a
    /// join-less query).
    Criteria(Criteria),
    /// The entire original criteria plus the join instructions, for a
    /// native adapter join.
    NativeJoin {
        criteria: Criteria,
        joins: Vec<JoinInstruction>,
    },
    /// A child operation serving one join instruction; its criteria are
    /// derived at run time from the parent operation's rows.
    Join(JoinInstruction),
}

/// One physical adapter call.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Position in the plan; also the value `parent` pointers refer to.
    pub id: usize,
    /// Named connection whose adapter runs this operation.
    pub connection: String,
    /// Collection the operation targets.
    pub collection: String,
    pub method: QueryMethod,
    pub payload: OperationPayload,
    /// Index of the operation whose results this one depends on. Only
    /// junction second hops carry a dependency; everything else depends
    /// solely on the parent operation at index 0.
    pub parent: Option<usize>,
}

/// Joins grouped per physical connection, used while compiling the plan
/// and for the native-join eligibility check.
#[derive(Debug, Clone, Default)]
pub struct ConnectionDescriptor {
    /// Every collection this connection touches for the query.
    pub collections: HashSet<String>,
    /// The joined (child) collections on this connection.
    pub children: HashSet<String>,
    /// Join instructions this connection serves, in execution order.
    pub joins: Vec<JoinInstruction>,
}

/// The compiled, ordered operation list.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationPlan {
    pub operations: Vec<Operation>,
    /// A native join will produce the fully nested shape; skip the
    /// integrator.
    pub pre_combined: bool,
}

impl OperationPlan {
    /// Compile a stage-two query against the datastore's registry and
    /// connection topology.
    pub fn build(context: &Datastore, query: &StageTwoQuery) -> Result<OperationPlan, QueryError> {
        let registry = context.registry();
        let parent_schema = registry.expect(&query.using)?;
        let parent_connection = parent_schema.connection_for(query.method).to_string();
        // Fail fast on configuration holes, before anything executes.
        context.adapter(&parent_connection)?;

        if query.joins.is_empty() {
            return Ok(OperationPlan {
                operations: vec![Operation {
                    id: 0,
                    connection: parent_connection,
                    collection: query.using.clone(),
                    method: query.method,
                    payload: OperationPayload::Criteria(query.criteria.clone()),
                    parent: None,
                }],
                pre_combined: false,
            });
        }

        validate_alias_depths(&query.joins)?;
        let groups = group_by_connection(context, query)?;

        if native_join_eligible(context, query, &parent_connection)? {
            debug!(
                "query on '{}' is eligible for a native join on connection '{}'",
                query.using, parent_connection
            );
            return Ok(OperationPlan {
                operations: vec![Operation {
                    id: 0,
                    connection: parent_connection,
                    collection: query.using.clone(),
                    method: QueryMethod::Join,
                    payload: OperationPayload::NativeJoin {
                        criteria: query.criteria.clone(),
                        joins: query.joins.clone(),
                    },
                    parent: None,
                }],
                pre_combined: true,
            });
        }

        // The adapter must never receive directives it can't honor: the
        // join instructions stay behind as child operations, and predicates
        // naming a populated alias are stripped from the pushed-down where
        // (the alias field does not exist until integration).
        let aliases: HashSet<String> = query.joins.iter().map(|j| j.alias.clone()).collect();
        let mut parent_criteria = query.criteria.clone();
        parent_criteria.where_clause = parent_criteria.where_clause.without_fields(&aliases);
        let mut operations = vec![Operation {
            id: 0,
            connection: parent_connection,
            collection: query.using.clone(),
            method: query.method,
            payload: OperationPayload::Criteria(parent_criteria),
            parent: None,
        }];

        for (_, descriptor) in groups {
            for join in descriptor.joins {
                let dependency = if join.junction {
                    Some(first_hop_operation(&operations, &join)?)
                } else {
                    None
                };
                let connection = registry
                    .connection_for(&join.child, QueryMethod::Find)?
                    .to_string();
                context.adapter(&connection)?;
                let id = operations.len();
                operations.push(Operation {
                    id,
                    connection,
                    collection: join.child.clone(),
                    method: QueryMethod::Find,
                    payload: OperationPayload::Join(join),
                    parent: dependency,
                });
            }
        }

        debug!(
            "compiled plan for '{}': {} operations",
            query.using,
            operations.len()
        );
        Ok(OperationPlan {
            operations,
            pre_combined: false,
        })
    }
}

/// Only one- and two-hop alias chains are recognized; anything longer is a
/// hard, documented limit.
fn validate_alias_depths(joins: &[JoinInstruction]) -> Result<(), QueryError> {
    let mut depths: HashMap<&str, usize> = HashMap::new();
    for join in joins {
        *depths.entry(join.alias.as_str()).or_default() += 1;
    }
    for (alias, depth) in depths {
        if depth > 2 {
            return Err(QueryError::UnsupportedJoinDepth {
                alias: alias.to_string(),
                depth,
            });
        }
    }
    Ok(())
}

/// Group join instructions by the connection that will serve them. A
/// junction second hop is not a new branch: it is appended to the group of
/// its first hop so execution order is preserved no matter where the far
/// child lives.
fn group_by_connection(
    context: &Datastore,
    query: &StageTwoQuery,
) -> Result<Vec<(String, ConnectionDescriptor)>, QueryError> {
    let registry = context.registry();
    let mut groups: Vec<(String, ConnectionDescriptor)> = Vec::new();

    for join in &query.joins {
        registry.expect(&join.parent)?;
        registry.expect(&join.child)?;

        if join.junction {
            let group = groups
                .iter_mut()
                .find(|(_, g)| g.joins.iter().any(|j| j.alias == join.alias))
                .ok_or_else(|| QueryError::InvalidJoinChain {
                    alias: join.alias.clone(),
                    reason: "junction hop appeared before its first hop".to_string(),
                })?;
            group.1.collections.insert(join.child.clone());
            group.1.children.insert(join.child.clone());
            group.1.joins.push(join.clone());
            continue;
        }

        let connection = registry
            .connection_for(&join.child, QueryMethod::Find)?
            .to_string();
        let group = match groups.iter_mut().find(|(name, _)| *name == connection) {
            Some(existing) => &mut existing.1,
            None => {
                groups.push((connection.clone(), ConnectionDescriptor::default()));
                &mut groups
                    .last_mut()
                    .ok_or_else(|| QueryError::invalid_plan("connection group vanished"))?
                    .1
            }
        };
        group.collections.insert(join.parent.clone());
        group.collections.insert(join.child.clone());
        group.children.insert(join.child.clone());
        group.joins.push(join.clone());
    }

    Ok(groups)
}

/// Native-join eligibility: the primary connection's adapter advertises
/// joins and every joined collection resolves to that same connection.
fn native_join_eligible(
    context: &Datastore,
    query: &StageTwoQuery,
    parent_connection: &str,
) -> Result<bool, QueryError> {
    if !context.adapter(parent_connection)?.has_join() {
        return Ok(false);
    }
    let registry = context.registry();
    for join in &query.joins {
        if registry.connection_for(&join.child, QueryMethod::Find)? != parent_connection
            || registry.connection_for(&join.parent, QueryMethod::Find)? != parent_connection
        {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Locate the already-staged first hop a junction hop depends on.
fn first_hop_operation(
    operations: &[Operation],
    junction_hop: &JoinInstruction,
) -> Result<usize, QueryError> {
    operations
        .iter()
        .find_map(|op| match &op.payload {
            OperationPayload::Join(j)
                if j.alias == junction_hop.alias && j.child == junction_hop.parent =>
            {
                Some(op.id)
            }
            _ => None,
        })
        .ok_or_else(|| QueryError::InvalidJoinChain {
            alias: junction_hop.alias.clone(),
            reason: format!(
                "no staged operation fetches junction collection '{}'",
                junction_hop.parent
            ),
        })
}
