//! Static analysis over the manifest inputs: typed issues with file and
//! line locations instead of hard failures.
//!
//! The linter never aborts; it accumulates every issue it can find and
//! reports success when no ERROR-level issue exists.

mod exprs;
mod fields;
mod names;
pub mod schema;
pub mod similarity;
mod types;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::manifest::assembler::scan_sources;
use crate::manifest::raw::{load_metrics_with_files, load_models_with_files};
use crate::sql::catalog::{CatalogError, DdlCatalog, TableCatalog};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    #[serde(rename = "ERROR")]
    Error,
    #[serde(rename = "WARN")]
    Warn,
}

/// One rule violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintIssue {
    pub severity: Severity,
    pub file: String,
    pub line: usize,
    pub code: String,
    pub message: String,
}

/// The accumulated lint outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintReport {
    pub success: bool,
    pub issues: Vec<LintIssue>,
    pub error_count: usize,
    pub warning_count: usize,
}

pub(crate) fn make_error(file: String, line: usize, code: &str, message: String) -> LintIssue {
    LintIssue {
        severity: Severity::Error,
        file,
        line,
        code: code.to_owned(),
        message,
    }
}

pub(crate) fn make_warn(file: String, line: usize, code: &str, message: String) -> LintIssue {
    LintIssue {
        severity: Severity::Warn,
        file,
        line,
        code: code.to_owned(),
        message,
    }
}

fn make_report(issues: Vec<LintIssue>) -> LintReport {
    let error_count = issues
        .iter()
        .filter(|i| i.severity == Severity::Error)
        .count();
    let warning_count = issues
        .iter()
        .filter(|i| i.severity == Severity::Warn)
        .count();
    LintReport {
        success: error_count == 0,
        issues,
        error_count,
        warning_count,
    }
}

/// 1-based line of the first line containing `expr`, else of the `name:`
/// line carrying `name`, else line 1.
pub(crate) fn find_line_number(
    lines: &[String],
    expr: Option<&str>,
    name: Option<&str>,
) -> usize {
    if let Some(expr) = expr {
        for (idx, line) in lines.iter().enumerate() {
            if line.contains(expr) {
                return idx + 1;
            }
        }
    }
    if let Some(name) = name {
        for (idx, line) in lines.iter().enumerate() {
            if line.contains("name:") && line.contains(name) {
                return idx + 1;
            }
        }
    }
    1
}

pub(crate) fn relative_path(file: &Path, base_dir: &Path) -> String {
    file.strip_prefix(base_dir)
        .map(PathBuf::from)
        .unwrap_or_else(|_| file.to_path_buf())
        .display()
        .to_string()
}

/// Lint `<base>/semantic_models/*.yml`, `<base>/sources.yml` and
/// `<base>/ddl.sql` as one project.
#[tracing::instrument(skip_all, fields(base_dir = %base_dir.display()))]
pub fn lint(base_dir: &Path) -> LintReport {
    let mut issues: Vec<LintIssue> = Vec::new();

    // DDL (missing or broken DDL only disables the DDL-backed rules).
    let ddl_path = base_dir.join("ddl.sql");
    let catalog = match DdlCatalog::from_file(&ddl_path) {
        Ok(catalog) => Some(catalog),
        Err(CatalogError::NotFound(path)) => {
            issues.push(make_error(
                "ddl.sql".into(),
                1,
                "SEM000_DDL_NOT_FOUND",
                format!("DDL file not found: {path}"),
            ));
            None
        }
        Err(err) => {
            issues.push(make_error(
                "ddl.sql".into(),
                1,
                "SEM018_DDL_DIALECT",
                err.to_string(),
            ));
            None
        }
    };

    // sources.yml.
    let sources = match scan_sources(&base_dir.join("sources.yml")) {
        Ok(sources) => Some(sources),
        Err(err) => {
            issues.push(make_error(
                "sources.yml".into(),
                1,
                "SEM001_SOURCES_INVALID",
                format!("failed to parse sources.yml: {err}"),
            ));
            None
        }
    };

    let sem_dir = base_dir.join("semantic_models");
    issues.extend(fields::lint_top_level_field_names(&sem_dir, base_dir));

    let sm_contexts = match load_models_with_files(&sem_dir) {
        Ok(contexts) => contexts,
        Err(err) => {
            issues.push(make_error(
                sem_dir.display().to_string(),
                1,
                "SEM999_LINT_ERROR",
                format!("failed to read semantic models: {err}"),
            ));
            return make_report(issues);
        }
    };
    let metric_contexts = match load_metrics_with_files(&sem_dir) {
        Ok(contexts) => contexts,
        Err(err) => {
            issues.push(make_error(
                sem_dir.display().to_string(),
                1,
                "SEM999_LINT_ERROR",
                format!("failed to read metrics: {err}"),
            ));
            return make_report(issues);
        }
    };

    // Name- and schema-level rules run regardless of DDL/sources state.
    issues.extend(fields::lint_required_fields(&sm_contexts, base_dir));
    issues.extend(fields::lint_metric_field_names(&metric_contexts, base_dir));
    issues.extend(names::lint_name_uniqueness(&sm_contexts, base_dir));
    issues.extend(names::lint_filename_consistency(&sm_contexts, base_dir));
    issues.extend(names::lint_foreign_entity_primary_match(&sm_contexts, base_dir));
    issues.extend(types::lint_model_data_types(&sm_contexts, base_dir));
    issues.extend(types::lint_entity_types(&sm_contexts, base_dir));
    issues.extend(names::lint_metric_uniqueness(&metric_contexts, base_dir));
    issues.extend(types::lint_metric_enums(&metric_contexts, base_dir));
    issues.extend(fields::lint_field_typos(&sm_contexts, base_dir));
    issues.extend(fields::lint_metric_field_typos(&metric_contexts, base_dir));
    issues.extend(exprs::lint_metric_expr_references(
        &metric_contexts,
        &sm_contexts,
        base_dir,
    ));

    // DDL-backed rules.
    if let (Some(catalog), Some(sources)) = (catalog, sources) {
        issues.extend(exprs::lint_ddl_columns(
            &sm_contexts,
            &sources,
            catalog.qualified_columns(),
            catalog.short_columns(),
            base_dir,
        ));
    }

    let report = make_report(issues);
    tracing::info!(
        errors = report.error_count,
        warnings = report.warning_count,
        "lint finished"
    );
    report
}
