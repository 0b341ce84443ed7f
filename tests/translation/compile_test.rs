use strata::compile::{compile_smq, compile_smq_partitioned};
use strata::config::CompileConfig;
use strata::error::CompileError;
use strata::manifest::model::*;
use strata::manifest::Manifest;
use strata::smq::Smq;
use strata::sql::dialect::Dialect;

fn node_relation(table: &str) -> NodeRelation {
    NodeRelation {
        alias: Some(table.into()),
        schema_name: Some("sales".into()),
        database: Some("warehouse".into()),
        relation_name: None,
    }
}

fn measure(name: &str) -> Measure {
    Measure {
        name: name.into(),
        data_type: Some(DataType::Decimal),
        agg: Some("sum".into()),
        expr: None,
        description: None,
        label: None,
    }
}

fn dimension(name: &str) -> Dimension {
    Dimension {
        name: name.into(),
        data_type: DataType::Varchar,
        expr: None,
        description: None,
        label: None,
    }
}

fn metric(name: &str, expr: &str) -> Metric {
    Metric {
        name: name.into(),
        metric_type: MetricType::Simple,
        data_type: None,
        description: None,
        label: None,
        expr: Some(expr.into()),
        type_params: None,
    }
}

fn single_model_manifest() -> Manifest {
    Manifest {
        semantic_models: vec![SemanticModel {
            name: "orders".into(),
            description: None,
            node_relation: node_relation("ORDERS"),
            primary_entity: None,
            entities: vec![],
            dimensions: vec![dimension("region")],
            measures: vec![measure("amount"), measure("qty")],
            label: None,
        }],
        metrics: vec![
            metric("total_amount", "SUM(orders__amount)"),
            metric("total_qty", "SUM(orders__qty)"),
            metric("ratio", "total_amount / total_qty"),
        ],
        project_configuration: ProjectConfiguration::default(),
    }
}

fn join_manifest() -> Manifest {
    Manifest {
        semantic_models: vec![
            SemanticModel {
                name: "order".into(),
                description: None,
                node_relation: node_relation("ORDERS"),
                primary_entity: None,
                entities: vec![Entity {
                    name: "customer_id".into(),
                    entity_type: EntityType::Foreign,
                    expr: Some("cust_id".into()),
                    description: None,
                    role: None,
                    label: None,
                }],
                dimensions: vec![],
                measures: vec![measure("amount")],
                label: None,
            },
            SemanticModel {
                name: "customer".into(),
                description: None,
                node_relation: node_relation("CUSTOMER"),
                primary_entity: None,
                entities: vec![Entity {
                    name: "customer_id".into(),
                    entity_type: EntityType::Primary,
                    expr: Some("id".into()),
                    description: None,
                    role: None,
                    label: None,
                }],
                dimensions: vec![dimension("segment")],
                measures: vec![],
                label: None,
            },
        ],
        metrics: vec![metric("total_amount", "SUM(order__amount)")],
        project_configuration: ProjectConfiguration::default(),
    }
}

#[test]
fn test_single_model_aggregation_end_to_end() {
    let manifest = single_model_manifest();
    let smq = Smq {
        metrics: vec!["total_amount".into()],
        group_by: vec!["orders__region".into()],
        ..Smq::default()
    };

    let output = compile_smq(&smq, &manifest, &CompileConfig::default()).unwrap();
    assert_eq!(
        output.sql,
        "WITH orders AS (SELECT amount, region FROM warehouse.sales.ORDERS) \
         SELECT region, SUM(amount) AS total_amount FROM orders GROUP BY region"
    );

    assert_eq!(output.metadata.len(), 2);
    assert_eq!(output.metadata[0].column, "region");
    assert_eq!(output.metadata[0].data_type, "varchar");
    assert_eq!(output.metadata[1].column, "total_amount");
    assert_eq!(output.metadata[1].data_type, "decimal");
}

#[test]
fn test_derived_metric_with_division() {
    let manifest = single_model_manifest();
    let smq = Smq {
        metrics: vec!["ratio".into()],
        ..Smq::default()
    };

    let output = compile_smq(&smq, &manifest, &CompileConfig::default()).unwrap();
    assert_eq!(
        output.sql,
        "WITH orders AS (SELECT amount, qty FROM warehouse.sales.ORDERS), \
         agg AS (SELECT SUM(orders.amount) AS total_amount, SUM(orders.qty) AS total_qty FROM orders) \
         SELECT total_amount / total_qty AS ratio FROM agg"
    );

    assert_eq!(output.metadata.len(), 1);
    assert_eq!(output.metadata[0].column, "ratio");
    assert_eq!(output.metadata[0].data_type, "decimal");
}

#[test]
fn test_default_join_synthesized() {
    let manifest = join_manifest();
    let smq = Smq {
        metrics: vec!["total_amount".into()],
        group_by: vec!["customer__segment".into()],
        ..Smq::default()
    };

    let output = compile_smq(&smq, &manifest, &CompileConfig::default()).unwrap();
    assert_eq!(
        output.sql,
        "WITH order AS (SELECT amount, cust_id FROM warehouse.sales.ORDERS), \
         customer AS (SELECT segment, id FROM warehouse.sales.CUSTOMER) \
         SELECT customer.segment, SUM(order.amount) AS total_amount \
         FROM order LEFT JOIN customer ON order.cust_id = customer.id \
         GROUP BY customer.segment"
    );
    assert_eq!(output.metadata.len(), 2);
}

#[test]
fn test_cycle_detection_end_to_end() {
    let manifest = Manifest {
        semantic_models: vec![],
        metrics: vec![metric("a", "b + 1"), metric("b", "a + 1")],
        project_configuration: ProjectConfiguration::default(),
    };
    let smq = Smq {
        metrics: vec!["a".into()],
        ..Smq::default()
    };

    let err = compile_smq(&smq, &manifest, &CompileConfig::default()).unwrap_err();
    match err {
        CompileError::ExpansionLimit { path } => {
            assert_eq!(path, vec!["a".to_owned(), "b".to_owned(), "a".to_owned()]);
        }
        other => panic!("expected ExpansionLimit, got {other}"),
    }
}

fn disjoint_manifest() -> Manifest {
    let model = |name: &str, table: &str, m: &str| SemanticModel {
        name: name.into(),
        description: None,
        node_relation: node_relation(table),
        primary_entity: None,
        entities: vec![],
        dimensions: vec![],
        measures: vec![measure(m)],
        label: None,
    };
    Manifest {
        semantic_models: vec![
            model("m1", "M1", "a"),
            model("m2", "M2", "b"),
            model("m3", "M3", "c"),
        ],
        metrics: vec![],
        project_configuration: ProjectConfiguration::default(),
    }
}

#[test]
fn test_disjoint_models_raise_join_error() {
    let manifest = disjoint_manifest();
    let smq = Smq {
        metrics: vec!["SUM(m1__a)".into(), "SUM(m2__b)".into(), "SUM(m3__c)".into()],
        ..Smq::default()
    };

    let err = compile_smq(&smq, &manifest, &CompileConfig::default()).unwrap_err();
    match err {
        CompileError::Join(join_error) => {
            assert_eq!(
                join_error.model_sets,
                vec![
                    vec!["m1".to_owned()],
                    vec!["m2".to_owned()],
                    vec!["m3".to_owned()]
                ]
            );
        }
        other => panic!("expected JoinError, got {other}"),
    }
}

#[test]
fn test_partitioned_compile_splits_the_query() {
    let manifest = disjoint_manifest();
    let smq = Smq {
        metrics: vec!["SUM(m1__a)".into(), "SUM(m2__b)".into(), "SUM(m3__c)".into()],
        ..Smq::default()
    };

    let outputs = compile_smq_partitioned(&smq, &manifest, &CompileConfig::default()).unwrap();
    assert_eq!(outputs.len(), 3);
    assert_eq!(
        outputs[0].sql,
        "WITH m1 AS (SELECT a FROM warehouse.sales.M1) SELECT SUM(a) FROM m1"
    );
    assert!(outputs[1].sql.contains("SUM(b)"));
    assert!(outputs[2].sql.contains("SUM(c)"));
}

#[test]
fn test_qualify_placement_for_window_filter() {
    let manifest = single_model_manifest();
    let smq = Smq {
        metrics: vec!["total_amount".into()],
        group_by: vec!["orders__region".into()],
        filters: vec!["ROW_NUMBER() OVER (ORDER BY total_amount DESC) = 1".into()],
        ..Smq::default()
    };

    let output = compile_smq(&smq, &manifest, &CompileConfig::default()).unwrap();
    assert!(
        output
            .sql
            .contains("QUALIFY ROW_NUMBER() OVER (ORDER BY total_amount DESC) = 1"),
        "{}",
        output.sql
    );
    assert!(!output.sql.contains("WHERE ROW_NUMBER"), "{}", output.sql);
}

#[test]
fn test_compilation_is_deterministic() {
    let manifest = join_manifest();
    let smq = Smq {
        metrics: vec!["total_amount".into()],
        group_by: vec!["customer__segment".into()],
        filters: vec!["customer__segment = 'retail'".into()],
        order_by: vec!["-total_amount".into()],
        limit: Some(100),
        ..Smq::default()
    };
    let config = CompileConfig::default();

    let first = compile_smq(&smq, &manifest, &config).unwrap();
    let second = compile_smq(&smq, &manifest, &config).unwrap();
    assert_eq!(first.sql, second.sql);
    assert_eq!(first.metadata, second.metadata);
}

#[test]
fn test_metadata_matches_select_list_width() {
    let manifest = single_model_manifest();
    let smq = Smq {
        metrics: vec!["total_amount".into(), "total_qty".into()],
        group_by: vec!["orders__region".into()],
        ..Smq::default()
    };

    let output = compile_smq(&smq, &manifest, &CompileConfig::default()).unwrap();
    // region + two metrics.
    assert_eq!(output.metadata.len(), 3);
}

#[test]
fn test_empty_metrics_rejected() {
    let manifest = single_model_manifest();
    let err = compile_smq(&Smq::default(), &manifest, &CompileConfig::default()).unwrap_err();
    assert!(matches!(err, CompileError::InputValidation(_)));
}

#[test]
fn test_two_user_joins_rejected() {
    let manifest = join_manifest();
    let smq = Smq {
        metrics: vec!["total_amount".into()],
        joins: vec!["FROM a".into(), "FROM b".into()],
        ..Smq::default()
    };
    let err = compile_smq(&smq, &manifest, &CompileConfig::default()).unwrap_err();
    assert!(matches!(err, CompileError::InputValidation(_)));
}

#[test]
fn test_bigquery_special_characters_rewritten() {
    let manifest = single_model_manifest();
    let smq = Smq {
        metrics: vec!["SUM(orders__amount) AS \"매출/원\"".into()],
        ..Smq::default()
    };
    let config = CompileConfig::new(Dialect::BigQuery);

    let output = compile_smq(&smq, &manifest, &config).unwrap();
    assert!(output.sql.contains("`매출_원`"), "{}", output.sql);
    assert!(!output.sql.contains("매출/원"), "{}", output.sql);
}

#[test]
fn test_user_join_respected_over_planner() {
    let manifest = join_manifest();
    let smq = Smq {
        metrics: vec!["total_amount".into()],
        group_by: vec!["customer__segment".into()],
        joins: vec!["FROM order LEFT JOIN customer ON order.cust_id = customer.id".into()],
        ..Smq::default()
    };

    let output = compile_smq(&smq, &manifest, &CompileConfig::default()).unwrap();
    assert!(
        output
            .sql
            .contains("FROM order LEFT JOIN customer ON order.cust_id = customer.id"),
        "{}",
        output.sql
    );
}
