use strata::error::CompileError;
use strata::join::{find_join_keys, plan_join};
use strata::manifest::model::*;
use strata::manifest::Manifest;
use strata::sql::dialect::Dialect;

fn entity(name: &str, entity_type: EntityType, expr: Option<&str>) -> Entity {
    Entity {
        name: name.into(),
        entity_type,
        expr: expr.map(str::to_owned),
        description: None,
        role: None,
        label: None,
    }
}

fn model(name: &str, entities: Vec<Entity>) -> SemanticModel {
    SemanticModel {
        name: name.into(),
        description: None,
        node_relation: NodeRelation::default(),
        primary_entity: None,
        entities,
        dimensions: vec![],
        measures: vec![],
        label: None,
    }
}

fn manifest(models: Vec<SemanticModel>) -> Manifest {
    Manifest {
        semantic_models: models,
        metrics: vec![],
        project_configuration: ProjectConfiguration::default(),
    }
}

#[test]
fn test_foreign_to_primary_edge() {
    let order = model(
        "order",
        vec![entity("customer_id", EntityType::Foreign, Some("cust_id"))],
    );
    let customer = model(
        "customer",
        vec![entity("customer_id", EntityType::Primary, Some("id"))],
    );

    let step = find_join_keys(&order, &customer).unwrap();
    assert_eq!(step.left, "order");
    assert_eq!(step.right, "customer");
    assert_eq!(step.keys, vec![("cust_id".to_owned(), "id".to_owned())]);
}

#[test]
fn test_edge_orientation_flips_when_primary_is_first() {
    let customer = model(
        "customer",
        vec![entity("customer_id", EntityType::Primary, Some("id"))],
    );
    let order = model(
        "order",
        vec![entity("customer_id", EntityType::Foreign, Some("cust_id"))],
    );

    let step = find_join_keys(&customer, &order).unwrap();
    assert_eq!(step.left, "order");
    assert_eq!(step.right, "customer");
}

#[test]
fn test_two_model_spine_sql() {
    let m = manifest(vec![
        model(
            "order",
            vec![entity("customer_id", EntityType::Foreign, Some("cust_id"))],
        ),
        model(
            "customer",
            vec![entity("customer_id", EntityType::Primary, Some("id"))],
        ),
    ]);

    let spine = plan_join(&m, &["order".into(), "customer".into()]).unwrap();
    assert_eq!(spine.table_names(), vec!["order", "customer"]);
    let mut sql = String::from("FROM ");
    sql.push_str(&spine.from.to_tokens_for_dialect(Dialect::DuckDb).serialize(Dialect::DuckDb));
    for join in &spine.joins {
        sql.push(' ');
        sql.push_str(&join.to_tokens_for_dialect(Dialect::DuckDb).serialize(Dialect::DuckDb));
    }
    assert_eq!(
        sql,
        "FROM order LEFT JOIN customer ON order.cust_id = customer.id"
    );
}

#[test]
fn test_composite_keys_join_with_and() {
    let m = manifest(vec![
        model(
            "daily",
            vec![
                entity("acct_no", EntityType::Foreign, None),
                entity("ymd", EntityType::Foreign, None),
            ],
        ),
        model(
            "source",
            vec![
                entity("acct_no", EntityType::Primary, None),
                entity("ymd", EntityType::Primary, None),
            ],
        ),
    ]);

    let spine = plan_join(&m, &["daily".into(), "source".into()]).unwrap();
    assert_eq!(spine.joins.len(), 1);
    let on = spine.joins[0].on.as_ref().unwrap();
    assert_eq!(
        on.sql_text(),
        "daily.acct_no = source.acct_no AND daily.ymd = source.ymd"
    );
    // One conjunct per matching entity pair.
    assert_eq!(spine.on_columns().len(), 4);
}

#[test]
fn test_three_model_chain_spans_component() {
    let m = manifest(vec![
        model(
            "a",
            vec![entity("b_id", EntityType::Foreign, None)],
        ),
        model(
            "b",
            vec![
                entity("b_id", EntityType::Primary, None),
                entity("c_id", EntityType::Foreign, None),
            ],
        ),
        model(
            "c",
            vec![entity("c_id", EntityType::Primary, None)],
        ),
    ]);

    let spine = plan_join(&m, &["a".into(), "b".into(), "c".into()]).unwrap();
    assert_eq!(spine.table_names(), vec!["a", "b", "c"]);
    assert!(spine.joins.iter().all(|j| j.kind == strata::sql::query::JoinKind::Left));
}

#[test]
fn test_disconnected_models_raise_join_error() {
    let m = manifest(vec![
        model("a", vec![entity("x", EntityType::Primary, None)]),
        model("b", vec![entity("y", EntityType::Primary, None)]),
        model("c", vec![entity("z", EntityType::Primary, None)]),
    ]);

    let err = plan_join(&m, &["a".into(), "b".into(), "c".into()]).unwrap_err();
    match err {
        CompileError::Join(join_error) => {
            assert_eq!(
                join_error.model_sets,
                vec![
                    vec!["a".to_owned()],
                    vec!["b".to_owned()],
                    vec!["c".to_owned()]
                ]
            );
        }
        other => panic!("expected JoinError, got {other}"),
    }
}

#[test]
fn test_partial_overlap_lists_components_exactly() {
    let m = manifest(vec![
        model("a", vec![entity("k", EntityType::Foreign, None)]),
        model("b", vec![entity("k", EntityType::Primary, None)]),
        model("c", vec![entity("z", EntityType::Primary, None)]),
    ]);

    let err = plan_join(&m, &["a".into(), "b".into(), "c".into()]).unwrap_err();
    match err {
        CompileError::Join(join_error) => {
            assert_eq!(join_error.model_sets.len(), 2);
            assert_eq!(join_error.model_sets[0], vec!["a".to_owned(), "b".to_owned()]);
            assert_eq!(join_error.model_sets[1], vec!["c".to_owned()]);
        }
        other => panic!("expected JoinError, got {other}"),
    }
}

#[test]
fn test_single_model_is_plain_from() {
    let m = manifest(vec![model("only", vec![])]);
    let spine = plan_join(&m, &["only".into()]).unwrap();
    assert!(spine.joins.is_empty());
    assert_eq!(spine.from.reference_name(), "only");
}

#[test]
fn test_unknown_model_is_manifest_violation() {
    let m = manifest(vec![]);
    let err = plan_join(&m, &["ghost".into(), "other".into()]).unwrap_err();
    assert!(matches!(err, CompileError::ManifestViolation(_)));
}
