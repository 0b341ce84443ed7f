use std::fs;
use std::path::Path;

use strata::manifest::{assemble_manifest, ManifestError};

fn write_project(dir: &Path, model_yaml: &str) {
    fs::write(
        dir.join("sources.yml"),
        "sources:\n  - name: warehouse_src\n    database: warehouse\n    schema: sales\n    tables:\n      - name: ORDERS\n      - name: CUSTOMER\n",
    )
    .unwrap();
    let sem_dir = dir.join("semantic_models");
    fs::create_dir_all(&sem_dir).unwrap();
    fs::write(sem_dir.join("orders.yml"), model_yaml).unwrap();
}

const ORDERS_YAML: &str = r#"semantic_models:
  - name: orders
    table: warehouse_src('ORDERS')
    entities:
      - name: customer_id
        type: foreign
        expr: cust_id
    dimensions:
      - name: region
        type: varchar
    measures:
      - name: amount
        type: decimal
        agg: sum
metrics:
  - name: total_amount
    metric_type: simple
    expr: SUM(orders__amount)
"#;

#[test]
fn test_assembles_valid_project() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path(), ORDERS_YAML);

    let manifest = assemble_manifest(dir.path()).unwrap();
    assert_eq!(manifest.semantic_models.len(), 1);
    assert_eq!(manifest.metrics.len(), 1);

    let orders = manifest.model("orders").unwrap();
    assert_eq!(orders.node_relation.alias.as_deref(), Some("ORDERS"));
    assert_eq!(orders.node_relation.schema_name.as_deref(), Some("sales"));
    assert_eq!(orders.node_relation.database.as_deref(), Some("warehouse"));
    assert_eq!(orders.entities[0].expr_or_name(), "cust_id");

    let metric = manifest.metric("total_amount").unwrap();
    assert_eq!(metric.expression(), Some("SUM(orders__amount)"));
}

#[test]
fn test_missing_sources_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("semantic_models")).unwrap();

    let err = assemble_manifest(dir.path()).unwrap_err();
    assert!(matches!(err, ManifestError::MissingInput { .. }));
}

#[test]
fn test_unknown_source_table() {
    let dir = tempfile::tempdir().unwrap();
    write_project(
        dir.path(),
        "semantic_models:\n  - name: orders\n    table: warehouse_src('NOPE')\n",
    );

    let err = assemble_manifest(dir.path()).unwrap_err();
    match err {
        ManifestError::UnknownSource { model, table, .. } => {
            assert_eq!(model, "orders");
            assert_eq!(table, "NOPE");
        }
        other => panic!("expected UnknownSource, got {other}"),
    }
}

#[test]
fn test_invalid_table_reference() {
    let dir = tempfile::tempdir().unwrap();
    write_project(
        dir.path(),
        "semantic_models:\n  - name: orders\n    table: just_a_table\n",
    );

    let err = assemble_manifest(dir.path()).unwrap_err();
    assert!(matches!(err, ManifestError::InvalidTableReference { .. }));
}

#[test]
fn test_duplicate_dimension_names_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_project(
        dir.path(),
        "semantic_models:\n  - name: orders\n    table: warehouse_src('ORDERS')\n    dimensions:\n      - name: region\n        type: varchar\n      - name: region\n        type: varchar\n",
    );

    let err = assemble_manifest(dir.path()).unwrap_err();
    assert!(matches!(err, ManifestError::DuplicateDimensions { .. }));
}

#[test]
fn test_dimension_measure_overlap_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_project(
        dir.path(),
        "semantic_models:\n  - name: orders\n    table: warehouse_src('ORDERS')\n    dimensions:\n      - name: amount\n        type: varchar\n    measures:\n      - name: amount\n        type: decimal\n",
    );

    let err = assemble_manifest(dir.path()).unwrap_err();
    assert!(matches!(err, ManifestError::OverlappingNames { .. }));
}

#[test]
fn test_duplicate_metric_names_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_project(
        dir.path(),
        "semantic_models:\n  - name: orders\n    table: warehouse_src('ORDERS')\nmetrics:\n  - name: total\n    metric_type: simple\n    expr: SUM(orders__amount)\n  - name: total\n    metric_type: simple\n    expr: SUM(orders__amount)\n",
    );

    let err = assemble_manifest(dir.path()).unwrap_err();
    assert!(matches!(err, ManifestError::DuplicateMetrics(_)));
}

#[test]
fn test_invalid_dimension_type_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_project(
        dir.path(),
        "semantic_models:\n  - name: orders\n    table: warehouse_src('ORDERS')\n    dimensions:\n      - name: region\n        type: text\n",
    );

    let err = assemble_manifest(dir.path()).unwrap_err();
    assert!(matches!(err, ManifestError::InvalidEnum { field: "type", .. }));
}

#[test]
fn test_invalid_metric_type_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_project(
        dir.path(),
        "semantic_models:\n  - name: orders\n    table: warehouse_src('ORDERS')\nmetrics:\n  - name: total\n    metric_type: simpel\n    expr: SUM(orders__amount)\n",
    );

    let err = assemble_manifest(dir.path()).unwrap_err();
    assert!(matches!(
        err,
        ManifestError::InvalidEnum {
            field: "metric_type",
            ..
        }
    ));
}

#[test]
fn test_missing_required_field_reported_with_context() {
    let dir = tempfile::tempdir().unwrap();
    write_project(
        dir.path(),
        "semantic_models:\n  - name: orders\n    table: warehouse_src('ORDERS')\n    dimensions:\n      - name: region\n",
    );

    let err = assemble_manifest(dir.path()).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("'type'"));
    assert!(message.contains("dimension[0] (region)"));
}

#[test]
fn test_fingerprint_stable_across_assemblies() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path(), ORDERS_YAML);

    let first = assemble_manifest(dir.path()).unwrap();
    let second = assemble_manifest(dir.path()).unwrap();
    assert_eq!(first.fingerprint(), second.fingerprint());
}

#[test]
fn test_simple_metric_input_measures_default() {
    let dir = tempfile::tempdir().unwrap();
    write_project(
        dir.path(),
        "semantic_models:\n  - name: orders\n    table: warehouse_src('ORDERS')\n    measures:\n      - name: amount\n        type: decimal\nmetrics:\n  - name: total\n    metric_type: simple\n    type_params:\n      measure: amount\n      expr: SUM(orders__amount)\n",
    );

    let manifest = assemble_manifest(dir.path()).unwrap();
    let metric = manifest.metric("total").unwrap();
    let tp = metric.type_params.as_ref().unwrap();
    assert_eq!(tp.input_measures.len(), 1);
    assert_eq!(tp.input_measures[0].name, "amount");
    assert_eq!(metric.expression(), Some("SUM(orders__amount)"));
}
