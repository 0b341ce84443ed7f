use strata::compose::Composer;
use strata::config::CompileConfig;
use strata::manifest::model::*;
use strata::manifest::Manifest;
use strata::smq::parse::SmqParser;
use strata::smq::Smq;
use strata::sql::dialect::Dialect;

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

fn manifest() -> Manifest {
    Manifest {
        semantic_models: vec![SemanticModel {
            name: "orders".into(),
            description: None,
            node_relation: NodeRelation {
                alias: Some("ORDERS".into()),
                schema_name: Some("sales".into()),
                database: Some("warehouse".into()),
                relation_name: None,
            },
            primary_entity: None,
            entities: vec![],
            dimensions: vec![Dimension {
                name: "region".into(),
                data_type: DataType::Varchar,
                expr: None,
                description: None,
                label: None,
            }],
            measures: vec![measure("amount"), measure("qty")],
            label: None,
        }],
        metrics: vec![
            metric("total_amount", "SUM(orders__amount)"),
            metric("ratio", "total_amount / total_qty"),
            metric("total_qty", "SUM(orders__qty)"),
        ],
        project_configuration: ProjectConfiguration::default(),
    }
}

fn compose(smq: &Smq, dialect: Dialect) -> String {
    let manifest = manifest();
    let config = CompileConfig::new(dialect);
    let parser = SmqParser::new(&manifest, &config);
    let mut ir = parser.parse(smq).unwrap();
    let composer = Composer::new(&manifest, &config);
    composer
        .compose(&mut ir, smq)
        .unwrap()
        .to_sql(config.dialect)
}

#[test]
fn test_single_model_aggregation() {
    let smq = Smq {
        metrics: vec!["total_amount".into()],
        group_by: vec!["orders__region".into()],
        ..Smq::default()
    };
    assert_eq!(
        compose(&smq, Dialect::DuckDb),
        "WITH orders AS (SELECT amount, region FROM warehouse.sales.ORDERS) \
         SELECT region, SUM(amount) AS total_amount FROM orders GROUP BY region"
    );
}

#[test]
fn test_derived_metric_builds_three_layers() {
    let smq = Smq {
        metrics: vec!["ratio".into()],
        ..Smq::default()
    };
    assert_eq!(
        compose(&smq, Dialect::DuckDb),
        "WITH orders AS (SELECT amount, qty FROM warehouse.sales.ORDERS), \
         agg AS (SELECT SUM(orders.amount) AS total_amount, SUM(orders.qty) AS total_qty FROM orders) \
         SELECT total_amount / total_qty AS ratio FROM agg"
    );
}

#[test]
fn test_group_select_parity_completes_groups() {
    // region appears in the select list without aggregation and without a
    // user-written group; the composer adds the GROUP BY entry.
    let smq = Smq {
        metrics: vec!["orders__region".into(), "total_amount".into()],
        ..Smq::default()
    };
    let sql = compose(&smq, Dialect::DuckDb);
    assert!(sql.contains("GROUP BY region"), "{sql}");
}

#[test]
fn test_anonymous_function_resolved() {
    let smq = Smq {
        metrics: vec!["average(orders__amount)".into()],
        ..Smq::default()
    };
    let sql = compose(&smq, Dialect::DuckDb);
    assert!(sql.contains("AVG(amount)"), "{sql}");
    assert!(!sql.to_lowercase().contains("average("), "{sql}");
}

#[test]
fn test_aggregate_pushed_down_from_deriv() {
    let smq = Smq {
        metrics: vec!["SUM(orders__qty) / total_amount".into()],
        ..Smq::default()
    };
    let sql = compose(&smq, Dialect::DuckDb);
    // The aggregate moved into agg under a synthesized alias...
    assert!(sql.contains("SUM(orders.qty) AS qty_합계"), "{sql}");
    // ...and the deriv expression references that alias.
    assert!(sql.contains("qty_합계 / total_amount"), "{sql}");
}

#[test]
fn test_filter_pushdown_into_projection_cte() {
    let smq = Smq {
        metrics: vec!["total_amount".into()],
        filters: vec!["orders__region = 'seoul'".into()],
        ..Smq::default()
    };
    let sql = compose(&smq, Dialect::DuckDb);
    // The filter column is surfaced into the CTE's select list too.
    assert!(
        sql.contains(
            "WITH orders AS (SELECT amount, region FROM warehouse.sales.ORDERS WHERE region = 'seoul')"
        ),
        "{sql}"
    );
}

#[test]
fn test_window_filter_routed_to_qualify() {
    let smq = Smq {
        metrics: vec!["total_amount".into()],
        group_by: vec!["orders__region".into()],
        filters: vec!["ROW_NUMBER() OVER (ORDER BY total_amount DESC) = 1".into()],
        ..Smq::default()
    };
    let sql = compose(&smq, Dialect::DuckDb);
    assert!(
        sql.contains("QUALIFY ROW_NUMBER() OVER (ORDER BY total_amount DESC) = 1"),
        "{sql}"
    );
    assert!(!sql.contains("WHERE ROW_NUMBER"), "{sql}");
}

#[test]
fn test_or_filter_parenthesized() {
    let smq = Smq {
        metrics: vec!["total_amount".into()],
        filters: vec!["orders__region = 'seoul' OR orders__region = 'busan'".into()],
        ..Smq::default()
    };
    let sql = compose(&smq, Dialect::DuckDb);
    assert!(
        sql.contains("WHERE (region = 'seoul' OR region = 'busan')"),
        "{sql}"
    );
}

#[test]
fn test_limit_and_order_reach_final_select() {
    let smq = Smq {
        metrics: vec!["total_amount".into()],
        order_by: vec!["-total_amount".into()],
        limit: Some(10),
        ..Smq::default()
    };
    let sql = compose(&smq, Dialect::DuckDb);
    assert!(sql.ends_with("ORDER BY total_amount DESC LIMIT 10"), "{sql}");
}

#[test]
fn test_bigquery_quotes_final_identifiers() {
    let smq = Smq {
        metrics: vec!["total_amount".into()],
        group_by: vec!["orders__region".into()],
        ..Smq::default()
    };
    let sql = compose(&smq, Dialect::BigQuery);
    assert!(sql.contains("`total_amount`"), "{sql}");
    assert!(sql.contains("`region`"), "{sql}");
    // The physical table reference is quoted too.
    assert!(sql.contains("`warehouse`.`sales`.`ORDERS`"), "{sql}");
}

#[test]
fn test_compose_is_idempotent() {
    let manifest = manifest();
    let config = CompileConfig::default();
    let smq = Smq {
        metrics: vec!["ratio".into()],
        group_by: vec!["orders__region".into()],
        ..Smq::default()
    };
    let parser = SmqParser::new(&manifest, &config);
    let mut ir = parser.parse(&smq).unwrap();
    let composer = Composer::new(&manifest, &config);

    let first = composer.compose(&mut ir, &smq).unwrap().to_sql(config.dialect);
    let second = composer.compose(&mut ir, &smq).unwrap().to_sql(config.dialect);
    assert_eq!(first, second);
}
