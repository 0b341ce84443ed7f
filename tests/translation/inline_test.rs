use strata::compile::compile_smq;
use strata::config::CompileConfig;
use strata::manifest::model::*;
use strata::manifest::Manifest;
use strata::smq::Smq;

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
            measures: vec![
                Measure {
                    name: "amount".into(),
                    data_type: Some(DataType::Decimal),
                    agg: Some("sum".into()),
                    expr: None,
                    description: None,
                    label: None,
                },
                Measure {
                    name: "qty".into(),
                    data_type: Some(DataType::Decimal),
                    agg: Some("sum".into()),
                    expr: None,
                    description: None,
                    label: None,
                },
            ],
            label: None,
        }],
        metrics: vec![
            Metric {
                name: "total_amount".into(),
                metric_type: MetricType::Simple,
                data_type: None,
                description: None,
                label: None,
                expr: Some("SUM(orders__amount)".into()),
                type_params: None,
            },
            Metric {
                name: "total_qty".into(),
                metric_type: MetricType::Simple,
                data_type: None,
                description: None,
                label: None,
                expr: Some("SUM(orders__qty)".into()),
                type_params: None,
            },
            Metric {
                name: "ratio".into(),
                metric_type: MetricType::Ratio,
                data_type: None,
                description: None,
                label: None,
                expr: Some("total_amount / total_qty".into()),
                type_params: None,
            },
        ],
        project_configuration: ProjectConfiguration::default(),
    }
}

#[test]
fn test_inline_mode_flattens_single_cte() {
    let manifest = manifest();
    let smq = Smq {
        metrics: vec!["total_amount".into()],
        group_by: vec!["orders__region".into()],
        ..Smq::default()
    };
    let config = CompileConfig::default().with_inline_ctes(true);

    let output = compile_smq(&smq, &manifest, &config).unwrap();
    assert_eq!(
        output.sql,
        "SELECT region, SUM(amount) AS total_amount \
         FROM (SELECT amount, region FROM warehouse.sales.ORDERS) AS orders \
         GROUP BY region"
    );
}

#[test]
fn test_inline_mode_nests_chained_ctes() {
    let manifest = manifest();
    let smq = Smq {
        metrics: vec!["ratio".into()],
        ..Smq::default()
    };
    let config = CompileConfig::default().with_inline_ctes(true);

    let output = compile_smq(&smq, &manifest, &config).unwrap();
    assert_eq!(
        output.sql,
        "SELECT total_amount / total_qty AS ratio FROM (\
         SELECT SUM(orders.amount) AS total_amount, SUM(orders.qty) AS total_qty FROM (\
         SELECT amount, qty FROM warehouse.sales.ORDERS) AS orders) AS agg"
    );
}

#[test]
fn test_inline_and_cte_modes_agree_on_content() {
    let manifest = manifest();
    let smq = Smq {
        metrics: vec!["ratio".into()],
        group_by: vec!["orders__region".into()],
        ..Smq::default()
    };

    let with_ctes = compile_smq(&smq, &manifest, &CompileConfig::default()).unwrap();
    let inlined = compile_smq(
        &smq,
        &manifest,
        &CompileConfig::default().with_inline_ctes(true),
    )
    .unwrap();

    assert!(with_ctes.sql.starts_with("WITH "));
    assert!(!inlined.sql.contains("WITH "));
    // Same layers, same expressions, same metadata.
    for fragment in [
        "SELECT amount, qty, region FROM warehouse.sales.ORDERS",
        "SUM(orders.amount) AS total_amount",
        "total_amount / total_qty AS ratio",
    ] {
        assert!(with_ctes.sql.contains(fragment), "cte: {}", with_ctes.sql);
        assert!(inlined.sql.contains(fragment), "inline: {}", inlined.sql);
    }
    assert_eq!(with_ctes.metadata, inlined.metadata);
}
