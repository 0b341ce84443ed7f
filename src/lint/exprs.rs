//! Expression-backed rules: undefined references in metric expressions,
//! columns missing from DDL, unused DDL columns.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::manifest::assembler::{parse_table_reference, SourceRelation};
use crate::manifest::raw::{yaml_expr_text, Located, RawMetric, RawSemanticModel};
use crate::sql::lower::parse_expr;

use super::{find_line_number, make_error, make_warn, relative_path, LintIssue};

/// Candidate reference names inside an expression: column and identifier
/// tokens, numeric tokens skipped.
fn candidate_names(expr_text: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let trimmed = expr_text.trim();
    if trimmed.is_empty() {
        return names;
    }

    // A bare column name never needs the parser.
    const STRUCTURE_CHARS: &[char] = &[
        ' ', '(', ')', '+', '-', '*', '/', ',', '=', '<', '>', '\'', '"',
    ];
    let simple = !trimmed.contains(STRUCTURE_CHARS);
    if simple {
        names.insert(trimmed.to_owned());
        return names;
    }

    if let Ok(parsed) = parse_expr(trimmed) {
        for name in crate::smq::parse::referenced_names(&parsed) {
            if name.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            names.insert(name);
        }
    } else {
        tracing::debug!(expr = trimmed, "failed to parse expr during lint");
    }
    names
}

/// SEM005: every reference in a metric expr must resolve to a metric, a
/// measure, or a dimension.
pub(super) fn lint_metric_expr_references(
    metric_contexts: &[Located<RawMetric>],
    sm_contexts: &[Located<RawSemanticModel>],
    base_dir: &Path,
) -> Vec<LintIssue> {
    // Per-model and global name sets.
    let mut model_dims: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut model_measures: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut allowed: BTreeSet<String> = BTreeSet::new();

    for located in sm_contexts {
        let Some(model) = located.record.name.clone() else {
            continue;
        };
        for dim in &located.record.dimensions {
            if let Some(name) = dim.name.clone() {
                allowed.insert(name.clone());
                model_dims.entry(model.clone()).or_default().insert(name);
            }
        }
        for measure in &located.record.measures {
            if let Some(name) = measure.name.clone() {
                allowed.insert(name.clone());
                model_measures.entry(model.clone()).or_default().insert(name);
            }
        }
    }
    for located in metric_contexts {
        if let Some(name) = located.record.name.clone() {
            allowed.insert(name);
        }
    }

    let mut issues = Vec::new();
    for located in metric_contexts {
        let Some(metric_name) = located.record.name.as_deref() else {
            continue;
        };
        let rel_file = relative_path(&located.file, base_dir);

        let mut check_expr = |expr_text: &str, issues: &mut Vec<LintIssue>| {
            for token in candidate_names(expr_text) {
                let resolves = match token.split_once("__") {
                    Some((model, column)) => {
                        model_dims
                            .get(model)
                            .is_some_and(|dims| dims.contains(column))
                            || model_measures
                                .get(model)
                                .is_some_and(|measures| measures.contains(column))
                    }
                    None => allowed.contains(&token),
                };
                if resolves {
                    continue;
                }
                let line = find_line_number(&located.lines, Some(expr_text), Some(metric_name));
                issues.push(make_error(
                    rel_file.clone(),
                    line,
                    "SEM005_UNDEFINED_MEASURE_IN_EXPR",
                    format!(
                        "Reference '{token}' used in expr of metric '{metric_name}' is not a \
                         known metric, measure, or dimension."
                    ),
                ));
            }
        };

        let mut check_name_ref = |reference: &str, issues: &mut Vec<LintIssue>| {
            if allowed.contains(reference) {
                return;
            }
            let line = find_line_number(&located.lines, Some(reference), Some(metric_name));
            issues.push(make_error(
                rel_file.clone(),
                line,
                "SEM005_UNDEFINED_MEASURE_IN_EXPR",
                format!(
                    "Reference '{reference}' in metric '{metric_name}' is not a known metric, \
                     measure, or dimension."
                ),
            ));
        };

        if let Some(tp) = &located.record.type_params {
            if let Some(expr) = tp.expr.as_ref().and_then(yaml_expr_text) {
                check_expr(&expr, &mut issues);
            }
            if let Some(measure) = &tp.measure {
                match measure {
                    serde_yaml::Value::String(name) => check_name_ref(name, &mut issues),
                    serde_yaml::Value::Mapping(map) => {
                        if let Some(name) = map.get("name").and_then(|v| v.as_str()) {
                            check_name_ref(name, &mut issues);
                        }
                    }
                    _ => {}
                }
            }
            for reference in [&tp.numerator, &tp.denominator].into_iter().flatten() {
                check_name_ref(reference, &mut issues);
            }
            for value in tp.metrics.iter().chain(tp.input_measures.iter()) {
                match value {
                    serde_yaml::Value::String(name) => check_name_ref(name, &mut issues),
                    serde_yaml::Value::Mapping(map) => {
                        if let Some(name) = map.get("name").and_then(|v| v.as_str()) {
                            check_name_ref(name, &mut issues);
                        }
                    }
                    _ => {}
                }
            }
        } else if let Some(expr) = located.record.expr.as_ref().and_then(yaml_expr_text) {
            check_expr(&expr, &mut issues);
        }
    }
    issues
}

fn strip_model_prefix(name: &str) -> &str {
    name.split_once("__").map(|(_, column)| column).unwrap_or(name)
}

/// Columns in an expression missing from the DDL column set.
pub(crate) fn find_invalid_columns_in_expr(
    expr_text: &str,
    ddl_columns: &BTreeSet<String>,
) -> BTreeSet<String> {
    candidate_names(expr_text)
        .into_iter()
        .map(|name| strip_model_prefix(&name).to_owned())
        .filter(|name| !ddl_columns.contains(name))
        .collect()
}

/// Columns in an expression that do exist in the DDL column set.
pub(crate) fn extract_used_columns(
    expr_text: &str,
    ddl_columns: &BTreeSet<String>,
) -> BTreeSet<String> {
    candidate_names(expr_text)
        .into_iter()
        .map(|name| strip_model_prefix(&name).to_owned())
        .filter(|name| ddl_columns.contains(name))
        .collect()
}

/// SEM010/SEM011 table resolution, SEM006 columns missing from DDL,
/// SEM600 DDL columns no dimension or measure references.
pub(super) fn lint_ddl_columns(
    sm_contexts: &[Located<RawSemanticModel>],
    sources: &BTreeMap<(String, String), SourceRelation>,
    qualified_columns: BTreeMap<(String, String, String), BTreeSet<String>>,
    short_columns: BTreeMap<String, BTreeSet<String>>,
    base_dir: &Path,
) -> Vec<LintIssue> {
    let mut issues = Vec::new();

    for located in sm_contexts {
        let sm = &located.record;
        let model_name = sm.name.as_deref().unwrap_or("unknown");
        let rel_file = relative_path(&located.file, base_dir);

        let Some(table_field) = sm.table.as_deref() else {
            // Missing table is already a SEM014.
            continue;
        };
        let Some((source_name, source_table)) = parse_table_reference(table_field) else {
            let line = find_line_number(&located.lines, Some(table_field), Some(model_name));
            issues.push(make_error(
                rel_file.clone(),
                line,
                "SEM010_INVALID_TABLE_REFERENCE",
                format!(
                    "Invalid table reference '{table_field}' in semantic model '{model_name}'."
                ),
            ));
            continue;
        };
        let Some(relation) = sources.get(&(source_name.clone(), source_table.clone())) else {
            let line = find_line_number(&located.lines, Some(table_field), Some(model_name));
            issues.push(make_error(
                rel_file.clone(),
                line,
                "SEM011_SOURCE_NOT_FOUND",
                format!(
                    "Source '{source_name}.{source_table}' referenced by semantic model \
                     '{model_name}' is not defined in sources.yml."
                ),
            ));
            continue;
        };

        let database = relation.database.clone().unwrap_or_default();
        let schema = relation.schema.clone().unwrap_or_default();
        let table = relation.table.clone();
        let ddl_columns = qualified_columns
            .get(&(database.clone(), schema.clone(), table.clone()))
            .or_else(|| short_columns.get(&table));
        let Some(ddl_columns) = ddl_columns else {
            // The DDL does not describe this table; skip column checks.
            continue;
        };

        let mut used: BTreeSet<String> = BTreeSet::new();
        let mut check_record = |name: Option<&str>, expr: Option<String>, kind: &str,
                                issues: &mut Vec<LintIssue>| {
            let record_name = name.unwrap_or("unknown");
            let Some(expr) = expr else {
                return;
            };
            used.extend(extract_used_columns(&expr, ddl_columns));
            for column in find_invalid_columns_in_expr(&expr, ddl_columns) {
                let line = find_line_number(&located.lines, Some(&expr), Some(record_name));
                issues.push(make_error(
                    rel_file.clone(),
                    line,
                    "SEM006_COLUMN_NOT_IN_DDL",
                    format!(
                        "Column '{column}' used in expr of {kind} '{record_name}' is not \
                         defined in DDL table '{database}.{schema}.{table}'."
                    ),
                ));
            }
        };

        for dim in &sm.dimensions {
            check_record(
                dim.name.as_deref(),
                dim.expr.as_ref().and_then(yaml_expr_text),
                "dimension",
                &mut issues,
            );
        }
        for measure in &sm.measures {
            check_record(
                measure.name.as_deref(),
                measure.expr.as_ref().and_then(yaml_expr_text),
                "measure",
                &mut issues,
            );
        }

        let unused: Vec<&String> = ddl_columns.iter().filter(|c| !used.contains(*c)).collect();
        if !unused.is_empty() {
            let line = find_line_number(&located.lines, None, Some(model_name));
            let columns = unused
                .iter()
                .map(|c| format!("'{c}'"))
                .collect::<Vec<_>>()
                .join(", ");
            issues.push(make_warn(
                rel_file.clone(),
                line,
                "SEM600_UNUSED_DDL_COLUMN",
                format!(
                    "Columns {columns} in DDL table '{database}.{schema}.{table}' are not \
                     referenced by any dimension or measure in semantic model '{model_name}'."
                ),
            ));
        }
    }
    issues
}
