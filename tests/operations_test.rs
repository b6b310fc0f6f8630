//! Planner/runner tests: plan shapes, short-circuits, cache behavior and
//! error propagation.

mod common;

use common::{fixture_registry, pets_join, roles_joins, row, FailingAdapter, RecordingAdapter};
use std::collections::HashSet;
use tributary::{
    Criteria, Datastore, JoinInstruction, MemoryAdapter, OperationPayload, Operations,
    QueryError, QueryMethod, StageTwoQuery, Value, WhereClause,
};

async fn seeded_single_connection() -> (Datastore, std::sync::Arc<RecordingAdapter>) {
    let adapter = RecordingAdapter::new(MemoryAdapter::new());
    adapter
        .seed(
            "user",
            vec![
                row(serde_json::json!({"id": 1, "name": "ann"})),
                row(serde_json::json!({"id": 2, "name": "bo"})),
            ],
        )
        .await;
    adapter
        .seed(
            "pet",
            vec![
                row(serde_json::json!({"id": 10, "owner": 1})),
                row(serde_json::json!({"id": 11, "owner": 1})),
                row(serde_json::json!({"id": 12, "owner": 2})),
            ],
        )
        .await;
    let datastore = Datastore::new(fixture_registry("mem", "mem"))
        .with_connection("mem", adapter.clone());
    (datastore, adapter)
}

#[tokio::test]
async fn joinless_query_issues_exactly_one_call_with_criteria_intact() {
    let (datastore, adapter) = seeded_single_connection().await;
    let criteria = Criteria::filtered(WhereClause::Equals("name".into(), "ann".into()))
        .with_limit(5);
    let query = StageTwoQuery::find("user").with_criteria(criteria.clone());

    let operations = Operations::new(&datastore, &query).expect("plan");
    assert_eq!(operations.plan().operations.len(), 1);
    assert!(!operations.plan().pre_combined);

    operations.run().await.expect("run");
    let calls = adapter.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, QueryMethod::Find);
    assert_eq!(calls[0].criteria, criteria);
}

#[tokio::test]
async fn parent_operation_is_always_first_and_strips_joins() {
    let (datastore, _) = seeded_single_connection().await;
    let query = StageTwoQuery::find("user").populate(pets_join());
    let operations = Operations::new(&datastore, &query).expect("plan");
    let plan = operations.plan();

    assert_eq!(plan.operations.len(), 2);
    assert_eq!(plan.operations[0].collection, "user");
    assert!(matches!(
        plan.operations[0].payload,
        OperationPayload::Criteria(_)
    ));
    assert!(matches!(
        plan.operations[1].payload,
        OperationPayload::Join(_)
    ));
    for op in &plan.operations {
        if let Some(parent) = op.parent {
            assert!(parent < op.id, "no forward dependency references");
        }
    }
}

#[tokio::test]
async fn native_join_plan_is_a_single_pre_combined_operation() {
    let adapter = RecordingAdapter::new(MemoryAdapter::with_native_join());
    adapter
        .seed("user", vec![row(serde_json::json!({"id": 1}))])
        .await;
    adapter
        .seed("pet", vec![row(serde_json::json!({"id": 10, "owner": 1}))])
        .await;
    let datastore = Datastore::new(fixture_registry("mem", "mem"))
        .with_connection("mem", adapter.clone());
    let query = StageTwoQuery::find("user").populate(pets_join());

    let operations = Operations::new(&datastore, &query).expect("plan");
    assert!(operations.plan().pre_combined);
    assert_eq!(operations.plan().operations.len(), 1);
    assert_eq!(operations.plan().operations[0].method, QueryMethod::Join);

    let result = operations.run().await.expect("run");
    assert!(result.combined);
    let calls = adapter.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, QueryMethod::Join);
}

#[tokio::test]
async fn spanning_connections_disables_the_native_join_path() {
    // The user connection supports joins, but pets live elsewhere.
    let users = RecordingAdapter::new(MemoryAdapter::with_native_join());
    users
        .seed("user", vec![row(serde_json::json!({"id": 1}))])
        .await;
    let pets = RecordingAdapter::new(MemoryAdapter::new());
    pets.seed("pet", vec![row(serde_json::json!({"id": 10, "owner": 1}))])
        .await;
    let datastore = Datastore::new(fixture_registry("users_db", "pets_db"))
        .with_connection("users_db", users)
        .with_connection("pets_db", pets);

    let query = StageTwoQuery::find("user").populate(pets_join());
    let operations = Operations::new(&datastore, &query).expect("plan");
    assert!(!operations.plan().pre_combined);
    assert_eq!(operations.plan().operations.len(), 2);
}

#[tokio::test]
async fn parent_error_aborts_before_any_child_operation() {
    let pets = RecordingAdapter::new(MemoryAdapter::new());
    pets.seed("pet", vec![row(serde_json::json!({"id": 10, "owner": 1}))])
        .await;
    let datastore = Datastore::new(fixture_registry("broken", "pets_db"))
        .with_connection("broken", FailingAdapter::new("disk on fire"))
        .with_connection("pets_db", pets.clone());

    let query = StageTwoQuery::find("user").populate(pets_join());
    let operations = Operations::new(&datastore, &query).expect("plan");
    let err = operations.run().await.unwrap_err();

    assert!(matches!(err, QueryError::Adapter { .. }));
    assert!(pets.calls().is_empty(), "no child operation may run");
}

#[tokio::test]
async fn empty_parent_results_short_circuit_child_operations() {
    let (datastore, adapter) = seeded_single_connection().await;
    let query = StageTwoQuery::find("user")
        .with_criteria(Criteria::filtered(WhereClause::Equals(
            "name".into(),
            "nobody".into(),
        )))
        .populate(pets_join());

    let result = Operations::new(&datastore, &query)
        .expect("plan")
        .run()
        .await
        .expect("run");
    assert!(!result.combined);
    assert!(result.cache.rows("user").is_empty());
    assert!(adapter.calls_for("pet").is_empty());
}

#[tokio::test]
async fn rerunning_a_plan_yields_identical_cache_contents() {
    let (datastore, _) = seeded_single_connection().await;
    let query = StageTwoQuery::find("user").populate(pets_join());
    let operations = Operations::new(&datastore, &query).expect("plan");

    let first = operations.run().await.expect("first run");
    let second = operations.run().await.expect("second run");
    assert_eq!(first.cache, second.cache);
}

#[tokio::test]
async fn overlapping_child_rows_across_branches_are_deduplicated_by_pk() {
    // Two aliases target the pet collection: plural ownership and a
    // singular favorite. Pet 10 satisfies both and must appear once.
    let adapter = RecordingAdapter::new(MemoryAdapter::new());
    adapter
        .seed(
            "user",
            vec![row(serde_json::json!({"id": 1, "favorite": 10}))],
        )
        .await;
    adapter
        .seed(
            "pet",
            vec![
                row(serde_json::json!({"id": 10, "owner": 1})),
                row(serde_json::json!({"id": 11, "owner": 1})),
            ],
        )
        .await;
    let datastore = Datastore::new(fixture_registry("mem", "mem"))
        .with_connection("mem", adapter);

    let query = StageTwoQuery::find("user")
        .populate(pets_join())
        .populate(
            JoinInstruction::new("user", "favorite", "pet", "id", "favorite_pet").as_singular(),
        );
    let result = Operations::new(&datastore, &query)
        .expect("plan")
        .run()
        .await
        .expect("run");

    let pks: Vec<&Value> = result
        .cache
        .rows("pet")
        .iter()
        .filter_map(|r| r.get("id"))
        .collect();
    let unique: HashSet<&Value> = pks.iter().copied().collect();
    assert_eq!(pks.len(), unique.len(), "each pk appears exactly once");
    assert_eq!(pks.len(), 2);
}

#[tokio::test]
async fn junction_cache_is_rewritten_to_the_referenced_subset() {
    let adapter = RecordingAdapter::new(MemoryAdapter::new());
    adapter
        .seed(
            "user",
            vec![row(serde_json::json!({"id": 1})), row(serde_json::json!({"id": 2}))],
        )
        .await;
    adapter
        .seed(
            "role",
            vec![row(serde_json::json!({"id": 10})), row(serde_json::json!({"id": 20}))],
        )
        .await;
    adapter
        .seed(
            "user_roles",
            vec![
                row(serde_json::json!({"id": 1, "user": 1, "role": 10})),
                row(serde_json::json!({"id": 2, "user": 1, "role": 20})),
                // Dangling link: role 99 does not exist.
                row(serde_json::json!({"id": 3, "user": 2, "role": 99})),
            ],
        )
        .await;
    let datastore = Datastore::new(fixture_registry("mem", "mem"))
        .with_connection("mem", adapter);

    let (first, second) = roles_joins();
    let query = StageTwoQuery::find("user").populate_through(first, second);
    let result = Operations::new(&datastore, &query)
        .expect("plan")
        .run()
        .await
        .expect("run");

    let links = result.cache.rows("user_roles");
    assert_eq!(links.len(), 2, "only links referencing fetched roles stay");
    assert!(links
        .iter()
        .all(|l| l.get("role") != Some(&Value::Integer(99))));
}

#[tokio::test]
async fn unknown_collection_is_a_plan_time_error() {
    let (datastore, _) = seeded_single_connection().await;
    let query = StageTwoQuery::find("ghost");
    let Err(err) = Operations::new(&datastore, &query) else {
        panic!("planning against an unknown collection must fail");
    };
    assert!(matches!(err, QueryError::UnknownCollection { .. }));
}

#[tokio::test]
async fn unknown_connection_is_a_plan_time_error() {
    let mut registry = fixture_registry("mem", "mem");
    registry.register(tributary::CollectionSchema::new("orphan", "id", "nowhere"));
    let datastore =
        Datastore::new(registry).with_connection("mem", RecordingAdapter::new(MemoryAdapter::new()));
    let query = StageTwoQuery::find("orphan");
    let Err(err) = Operations::new(&datastore, &query) else {
        panic!("planning against an unbound connection must fail");
    };
    assert!(matches!(err, QueryError::UnknownConnection { .. }));
}

#[tokio::test]
async fn junction_hop_without_first_hop_is_rejected() {
    let (datastore, _) = seeded_single_connection().await;
    let query = StageTwoQuery::find("user").populate(
        JoinInstruction::new("user_roles", "role", "role", "id", "roles").as_junction_hop(),
    );
    let Err(err) = Operations::new(&datastore, &query) else {
        panic!("an orphaned junction hop must fail to plan");
    };
    assert!(matches!(err, QueryError::InvalidJoinChain { .. }));
}
