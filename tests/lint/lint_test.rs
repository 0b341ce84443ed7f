use std::fs;
use std::path::Path;

use strata::lint::{lint, LintReport, Severity};

const SOURCES: &str = "sources:\n  - name: warehouse_src\n    database: warehouse\n    schema: sales\n    tables:\n      - name: ORDERS\n      - name: CUSTOMER\n";

const DDL: &str = "-- mysql\nCREATE TABLE ORDERS (\n  cust_id BIGINT,\n  amount DECIMAL(18, 2),\n  region VARCHAR(32)\n);\n";

fn write_project(dir: &Path, files: &[(&str, &str)]) {
    fs::write(dir.join("sources.yml"), SOURCES).unwrap();
    fs::write(dir.join("ddl.sql"), DDL).unwrap();
    let sem_dir = dir.join("semantic_models");
    fs::create_dir_all(&sem_dir).unwrap();
    for (name, content) in files {
        fs::write(sem_dir.join(name), content).unwrap();
    }
}

fn codes(report: &LintReport) -> Vec<&str> {
    report.issues.iter().map(|i| i.code.as_str()).collect()
}

fn has_code(report: &LintReport, code: &str) -> bool {
    codes(report).iter().any(|c| c.starts_with(code))
}

const CLEAN_MODEL: &str = r#"semantic_models:
  - name: orders
    table: warehouse_src('ORDERS')
    entities:
      - name: customer_id
        type: primary
        expr: cust_id
    dimensions:
      - name: region
        type: varchar
        expr: region
    measures:
      - name: amount
        type: decimal
        agg: sum
        expr: amount
metrics:
  - name: total_amount
    metric_type: simple
    expr: SUM(orders__amount)
"#;

#[test]
fn test_clean_project_has_ddl_coverage_only() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path(), &[("orders.yml", CLEAN_MODEL)]);

    let report = lint(dir.path());
    assert!(report.success, "unexpected issues: {:?}", report.issues);
    assert_eq!(report.error_count, 0);
    // cust_id exists in DDL but no dimension/measure expr uses it.
    assert!(has_code(&report, "SEM600"));
}

#[test]
fn test_every_error_has_file_and_line() {
    let dir = tempfile::tempdir().unwrap();
    write_project(
        dir.path(),
        &[(
            "orders.yml",
            "semantic_models:\n  - name: orders\n    table: warehouse_src('ORDERS')\n    dimensions:\n      - name: region\n        type: text\n",
        )],
    );

    let report = lint(dir.path());
    for issue in report.issues.iter().filter(|i| i.severity == Severity::Error) {
        assert!(!issue.file.is_empty());
        assert!(issue.line >= 1);
    }
}

#[test]
fn test_duplicate_metric_names_sem002() {
    let dir = tempfile::tempdir().unwrap();
    write_project(
        dir.path(),
        &[(
            "orders.yml",
            "semantic_models:\n  - name: orders\n    table: warehouse_src('ORDERS')\nmetrics:\n  - name: total\n    metric_type: simple\n    expr: SUM(orders__amount)\n  - name: total\n    metric_type: simple\n    expr: SUM(orders__amount)\n",
        )],
    );

    let report = lint(dir.path());
    assert!(!report.success);
    assert!(has_code(&report, "SEM002"));
}

#[test]
fn test_undefined_reference_sem005() {
    let dir = tempfile::tempdir().unwrap();
    write_project(
        dir.path(),
        &[(
            "orders.yml",
            "semantic_models:\n  - name: orders\n    table: warehouse_src('ORDERS')\n    measures:\n      - name: amount\n        type: decimal\nmetrics:\n  - name: total\n    metric_type: simple\n    expr: SUM(orders__missing)\n",
        )],
    );

    let report = lint(dir.path());
    assert!(has_code(&report, "SEM005"));
    let issue = report
        .issues
        .iter()
        .find(|i| i.code.starts_with("SEM005"))
        .unwrap();
    assert!(issue.message.contains("orders__missing"));
    // The line points at the expr.
    assert!(issue.line >= 1);
}

#[test]
fn test_column_not_in_ddl_sem006() {
    let dir = tempfile::tempdir().unwrap();
    write_project(
        dir.path(),
        &[(
            "orders.yml",
            "semantic_models:\n  - name: orders\n    table: warehouse_src('ORDERS')\n    dimensions:\n      - name: region\n        type: varchar\n        expr: missing_col\n",
        )],
    );

    let report = lint(dir.path());
    assert!(has_code(&report, "SEM006"));
}

#[test]
fn test_duplicate_names_sem007_sem008_sem009() {
    let dir = tempfile::tempdir().unwrap();
    write_project(
        dir.path(),
        &[(
            "orders.yml",
            "semantic_models:\n  - name: orders\n    table: warehouse_src('ORDERS')\n    dimensions:\n      - name: region\n        type: varchar\n      - name: region\n        type: varchar\n      - name: amount\n        type: varchar\n    measures:\n      - name: amount\n        type: decimal\n      - name: amount\n        type: decimal\n",
        )],
    );

    let report = lint(dir.path());
    assert!(has_code(&report, "SEM007"));
    assert!(has_code(&report, "SEM008"));
    assert!(has_code(&report, "SEM009"));
}

#[test]
fn test_unique_names_never_fire_duplicate_rules() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path(), &[("orders.yml", CLEAN_MODEL)]);

    let report = lint(dir.path());
    assert!(!has_code(&report, "SEM007"));
    assert!(!has_code(&report, "SEM008"));
    assert!(!has_code(&report, "SEM009"));
}

#[test]
fn test_invalid_types_sem012_sem013_sem021() {
    let dir = tempfile::tempdir().unwrap();
    write_project(
        dir.path(),
        &[(
            "orders.yml",
            "semantic_models:\n  - name: orders\n    table: warehouse_src('ORDERS')\n    entities:\n      - name: customer_id\n        type: external\n    dimensions:\n      - name: region\n        type: text\n    measures:\n      - name: amount\n        type: money\n",
        )],
    );

    let report = lint(dir.path());
    assert!(has_code(&report, "SEM012"));
    assert!(has_code(&report, "SEM013"));
    assert!(has_code(&report, "SEM021"));
}

#[test]
fn test_missing_required_field_suggests_typo() {
    let dir = tempfile::tempdir().unwrap();
    write_project(
        dir.path(),
        &[(
            "orders.yml",
            "semantic_models:\n  - name: orders\n    tabel: warehouse_src('ORDERS')\n",
        )],
    );

    let report = lint(dir.path());
    let issue = report
        .issues
        .iter()
        .find(|i| i.code.starts_with("SEM014"))
        .unwrap();
    assert!(issue.message.contains("Did you mean: 'tabel'?"), "{}", issue.message);
}

#[test]
fn test_filename_mismatch_sem501() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path(), &[("CustomerData.yml", CLEAN_MODEL)]);

    let report = lint(dir.path());
    let issue = report
        .issues
        .iter()
        .find(|i| i.code.starts_with("SEM501"))
        .unwrap();
    assert_eq!(issue.severity, Severity::Warn);
    assert!(issue.message.contains("orders"));
}

#[test]
fn test_orphan_foreign_entity_sem502() {
    let dir = tempfile::tempdir().unwrap();
    write_project(
        dir.path(),
        &[(
            "orders.yml",
            "semantic_models:\n  - name: orders\n    table: warehouse_src('ORDERS')\n    entities:\n      - name: nobody_id\n        type: foreign\n",
        )],
    );

    let report = lint(dir.path());
    let issue = report
        .issues
        .iter()
        .find(|i| i.code.starts_with("SEM502"))
        .unwrap();
    assert_eq!(issue.severity, Severity::Warn);
}

#[test]
fn test_unused_ddl_column_sem600_fires_only_for_unreferenced() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path(), &[("orders.yml", CLEAN_MODEL)]);

    let report = lint(dir.path());
    let issue = report
        .issues
        .iter()
        .find(|i| i.code.starts_with("SEM600"))
        .unwrap();
    // amount and region are referenced by exprs; cust_id is not.
    assert!(issue.message.contains("cust_id"));
    assert!(!issue.message.contains("'amount'"));
    assert!(!issue.message.contains("'region'"));
}

#[test]
fn test_missing_ddl_reports_sem000_but_keeps_linting() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path(), &[("orders.yml", CLEAN_MODEL)]);
    fs::remove_file(dir.path().join("ddl.sql")).unwrap();

    let report = lint(dir.path());
    assert!(has_code(&report, "SEM000"));
    // No SEM006/SEM600 without DDL, but name rules still ran.
    assert!(!has_code(&report, "SEM600"));
}

#[test]
fn test_unknown_top_level_field_sem015() {
    let dir = tempfile::tempdir().unwrap();
    write_project(
        dir.path(),
        &[(
            "orders.yml",
            "semantic_models:\n  - name: orders\n    table: warehouse_src('ORDERS')\nmetricz:\n  - name: total\n",
        )],
    );

    let report = lint(dir.path());
    let issue = report
        .issues
        .iter()
        .find(|i| i.code.starts_with("SEM015"))
        .unwrap();
    assert_eq!(issue.line, 4);
}

#[test]
fn test_counts_match_issues() {
    let dir = tempfile::tempdir().unwrap();
    write_project(
        dir.path(),
        &[(
            "orders.yml",
            "semantic_models:\n  - name: orders\n    table: warehouse_src('ORDERS')\n    dimensions:\n      - name: region\n        type: text\n",
        )],
    );

    let report = lint(dir.path());
    let errors = report
        .issues
        .iter()
        .filter(|i| i.severity == Severity::Error)
        .count();
    let warnings = report
        .issues
        .iter()
        .filter(|i| i.severity == Severity::Warn)
        .count();
    assert_eq!(report.error_count, errors);
    assert_eq!(report.warning_count, warnings);
    assert_eq!(report.success, errors == 0);
}
