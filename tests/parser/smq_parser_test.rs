use strata::config::CompileConfig;
use strata::error::CompileError;
use strata::manifest::model::*;
use strata::manifest::Manifest;
use strata::smq::parse::SmqParser;
use strata::smq::{LayerId, Smq};

fn dimension(name: &str, data_type: DataType) -> Dimension {
    Dimension {
        name: name.into(),
        data_type,
        expr: None,
        description: None,
        label: None,
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

fn model(name: &str, dimensions: Vec<Dimension>, measures: Vec<Measure>) -> SemanticModel {
    SemanticModel {
        name: name.into(),
        description: None,
        node_relation: NodeRelation {
            alias: Some(name.to_uppercase()),
            schema_name: Some("sales".into()),
            database: Some("warehouse".into()),
            relation_name: None,
        },
        primary_entity: None,
        entities: vec![],
        dimensions,
        measures,
        label: None,
    }
}

fn manifest() -> Manifest {
    Manifest {
        semantic_models: vec![model(
            "orders",
            vec![dimension("region", DataType::Varchar)],
            vec![measure("amount")],
        )],
        metrics: vec![
            metric("total_amount", "SUM(orders__amount)"),
            metric("avg_amount", "AVG(orders__amount)"),
            metric("ratio", "total_amount / avg_amount"),
        ],
        project_configuration: ProjectConfiguration::default(),
    }
}

fn parse(smq: &Smq) -> strata::smq::QueryIr {
    let manifest = manifest();
    let config = CompileConfig::default();
    SmqParser::new(&manifest, &config).parse(smq).unwrap()
}

#[test]
fn test_metric_entry_expands_into_layers() {
    let ir = parse(&Smq {
        metrics: vec!["total_amount".into()],
        ..Smq::default()
    });

    let agg = ir.body(&LayerId::Agg).unwrap();
    assert_eq!(agg.metrics.len(), 1);
    assert_eq!(agg.metrics[0].sql_text(), "SUM(amount) AS total_amount");

    let proj = ir.body(&LayerId::projection("orders")).unwrap();
    assert_eq!(proj.metrics[0].sql_text(), "amount");
}

#[test]
fn test_qualified_reference_goes_to_projection_layer() {
    let ir = parse(&Smq {
        metrics: vec!["orders__region".into()],
        ..Smq::default()
    });

    let proj = ir.body(&LayerId::projection("orders")).unwrap();
    assert_eq!(proj.metrics[0].sql_text(), "region");
    assert!(!ir.contains(&LayerId::Deriv));
}

#[test]
fn test_derived_metric_lands_in_deriv() {
    let ir = parse(&Smq {
        metrics: vec!["ratio".into()],
        ..Smq::default()
    });

    let deriv = ir.body(&LayerId::Deriv).unwrap();
    assert_eq!(deriv.metrics.len(), 1);
    assert_eq!(
        deriv.metrics[0].sql_text(),
        "total_amount / avg_amount AS ratio"
    );

    let agg = ir.body(&LayerId::Agg).unwrap();
    let aliases: Vec<_> = agg
        .metrics
        .iter()
        .filter_map(|m| m.alias_name())
        .collect();
    assert!(aliases.contains(&"total_amount"));
    assert!(aliases.contains(&"avg_amount"));
}

#[test]
fn test_group_by_requires_layer_prefix() {
    let ir = parse(&Smq {
        metrics: vec!["total_amount".into()],
        group_by: vec!["orders__region".into()],
        ..Smq::default()
    });

    let agg = ir.body(&LayerId::Agg).unwrap();
    assert_eq!(agg.groups.len(), 1);
    assert_eq!(agg.groups[0].sql_text(), "orders.region");
}

#[test]
fn test_single_model_filter_pushes_down() {
    let ir = parse(&Smq {
        metrics: vec!["total_amount".into()],
        filters: vec!["orders__region = 'seoul'".into()],
        ..Smq::default()
    });

    let proj = ir.body(&LayerId::projection("orders")).unwrap();
    assert_eq!(proj.filters.len(), 1);
    assert_eq!(proj.filters[0].sql_text(), "region = 'seoul'");
}

#[test]
fn test_metric_filter_stays_in_deriv() {
    let ir = parse(&Smq {
        metrics: vec!["total_amount".into()],
        filters: vec!["total_amount > 1000".into()],
        ..Smq::default()
    });

    let deriv = ir.body(&LayerId::Deriv).unwrap();
    assert_eq!(deriv.filters.len(), 1);
    assert_eq!(deriv.filters[0].sql_text(), "total_amount > 1000");
}

#[test]
fn test_unknown_filter_reference_fails() {
    let manifest = manifest();
    let config = CompileConfig::default();
    let result = SmqParser::new(&manifest, &config).parse(&Smq {
        metrics: vec!["total_amount".into()],
        filters: vec!["orders__missing = 1".into()],
        ..Smq::default()
    });
    assert!(matches!(result, Err(CompileError::ManifestViolation(_))));
}

#[test]
fn test_metric_with_model_prefix_in_filter_is_explained() {
    let manifest = manifest();
    let config = CompileConfig::default();
    let err = SmqParser::new(&manifest, &config)
        .parse(&Smq {
            metrics: vec!["total_amount".into()],
            filters: vec!["orders__total_amount > 10".into()],
            ..Smq::default()
        })
        .unwrap_err();
    assert!(err.to_string().contains("without a model prefix"));
}

#[test]
fn test_descending_order_prefix() {
    let ir = parse(&Smq {
        metrics: vec!["total_amount".into()],
        order_by: vec!["-total_amount".into()],
        ..Smq::default()
    });

    let deriv = ir.body(&LayerId::Deriv).unwrap();
    assert_eq!(deriv.orders.len(), 1);
    assert!(deriv.orders[0].desc);
    assert_eq!(deriv.orders[0].expr.sql_text(), "total_amount");
}

#[test]
fn test_qualified_order_strips_model() {
    let ir = parse(&Smq {
        metrics: vec!["total_amount".into()],
        order_by: vec!["orders__region".into()],
        ..Smq::default()
    });

    let deriv = ir.body(&LayerId::Deriv).unwrap();
    assert!(!deriv.orders[0].desc);
    assert_eq!(deriv.orders[0].expr.sql_text(), "region");
}

#[test]
fn test_limit_lands_in_deriv() {
    let ir = parse(&Smq {
        metrics: vec!["total_amount".into()],
        limit: Some(50),
        ..Smq::default()
    });
    assert_eq!(ir.body(&LayerId::Deriv).unwrap().limit, Some(50));
}

#[test]
fn test_user_join_surfaces_on_columns() {
    let two_model_manifest = Manifest {
        semantic_models: vec![
            model("orders", vec![], vec![measure("amount")]),
            model("customer", vec![dimension("segment", DataType::Varchar)], vec![]),
        ],
        metrics: vec![metric("total_amount", "SUM(orders__amount)")],
        project_configuration: ProjectConfiguration::default(),
    };
    let config = CompileConfig::default();
    let ir = SmqParser::new(&two_model_manifest, &config)
        .parse(&Smq {
            metrics: vec!["total_amount".into()],
            joins: vec!["FROM orders LEFT JOIN customer ON orders.cust_id = customer.id".into()],
            ..Smq::default()
        })
        .unwrap();

    let agg = ir.body(&LayerId::Agg).unwrap();
    let spine = agg.join.as_ref().unwrap();
    assert_eq!(spine.table_names(), vec!["orders", "customer"]);

    let orders = ir.body(&LayerId::projection("orders")).unwrap();
    assert!(orders.metrics.iter().any(|m| m.sql_text() == "cust_id"));
    let customer = ir.body(&LayerId::projection("customer")).unwrap();
    assert!(customer.metrics.iter().any(|m| m.sql_text() == "id"));
}

#[test]
fn test_cycle_detection_reports_path() {
    let cyclic = Manifest {
        semantic_models: vec![],
        metrics: vec![metric("a", "b + 1"), metric("b", "a + 1")],
        project_configuration: ProjectConfiguration::default(),
    };
    let config = CompileConfig::default();
    let err = SmqParser::new(&cyclic, &config)
        .parse(&Smq {
            metrics: vec!["a".into()],
            ..Smq::default()
        })
        .unwrap_err();
    match err {
        CompileError::ExpansionLimit { path } => {
            assert_eq!(path, vec!["a".to_owned(), "b".to_owned(), "a".to_owned()]);
        }
        other => panic!("expected ExpansionLimit, got {other}"),
    }
}

#[test]
fn test_duplicate_entries_appear_once() {
    let ir = parse(&Smq {
        metrics: vec!["orders__region".into(), "orders__region".into()],
        ..Smq::default()
    });
    let proj = ir.body(&LayerId::projection("orders")).unwrap();
    assert_eq!(proj.metrics.len(), 1);
}
