//! Field-level rules: unknown fields, missing required fields with
//! suggestions, typo'd optional fields.

use std::path::Path;

use crate::manifest::raw::{Located, RawMetric, RawSemanticModel};
use crate::manifest::validate::find_missing_required_fields;

use super::schema::{
    metric_all_fields, DIMENSION_OPTIONAL_FIELDS, DIMENSION_REQUIRED_FIELDS,
    ENTITY_OPTIONAL_FIELDS, ENTITY_REQUIRED_FIELDS, MEASURE_OPTIONAL_FIELDS,
    MEASURE_REQUIRED_FIELDS, METRIC_OPTIONAL_FIELDS, METRIC_REQUIRED_FIELDS,
    SEMANTIC_MODEL_OPTIONAL_FIELDS, SEMANTIC_MODEL_REQUIRED_FIELDS, VALID_TOP_LEVEL_FIELDS,
};
use super::similarity::{best_match, SUGGESTION_THRESHOLD};
use super::{find_line_number, make_error, make_warn, relative_path, LintIssue};

/// SEM015: unknown top-level fields in a model file.
pub(super) fn lint_top_level_field_names(sem_dir: &Path, base_dir: &Path) -> Vec<LintIssue> {
    let mut issues = Vec::new();
    let files = match crate::manifest::raw::read_model_files(sem_dir) {
        Ok(files) => files,
        Err(_) => return issues,
    };

    for (path, text, file) in files {
        let lines: Vec<String> = text.lines().map(str::to_owned).collect();
        for key in file.extra.keys() {
            let line = lines
                .iter()
                .position(|l| {
                    let trimmed = l.trim_start();
                    trimmed.starts_with(key.as_str())
                        && trimmed[key.len()..].trim_start().starts_with(':')
                })
                .map(|idx| idx + 1)
                .unwrap_or(1);
            issues.push(make_error(
                relative_path(&path, base_dir),
                line,
                "SEM015_INVALID_TOP_LEVEL_FIELD",
                format!(
                    "Invalid top-level field name '{key}'. Valid fields are: {}.",
                    VALID_TOP_LEVEL_FIELDS.join(", ")
                ),
            ));
        }
    }
    issues
}

/// Field names actually present on a record, for suggestion lookups.
fn present_model_fields(sm: &RawSemanticModel) -> Vec<String> {
    let mut fields = Vec::new();
    let mut push_if = |present: bool, name: &str| {
        if present {
            fields.push(name.to_owned());
        }
    };
    push_if(sm.name.is_some(), "name");
    push_if(sm.table.is_some(), "table");
    push_if(sm.description.is_some(), "description");
    push_if(sm.label.is_some(), "label");
    push_if(sm.primary_entity.is_some(), "primary_entity");
    push_if(!sm.entities.is_empty(), "entities");
    push_if(!sm.dimensions.is_empty(), "dimensions");
    push_if(!sm.measures.is_empty(), "measures");
    fields.extend(sm.extra.keys().cloned());
    fields
}

fn nested_record_fields(sm: &RawSemanticModel, context: &str) -> Vec<String> {
    let index = context
        .split(['[', ']'])
        .nth(1)
        .and_then(|s| s.parse::<usize>().ok());
    let Some(index) = index else {
        return Vec::new();
    };

    if context.starts_with("entity") {
        sm.entities
            .get(index)
            .map(|e| {
                let mut fields: Vec<String> = Vec::new();
                if e.name.is_some() {
                    fields.push("name".into());
                }
                if e.entity_type.is_some() {
                    fields.push("type".into());
                }
                fields.extend(e.extra.keys().cloned());
                fields
            })
            .unwrap_or_default()
    } else if context.starts_with("dimension") {
        sm.dimensions
            .get(index)
            .map(|d| {
                let mut fields: Vec<String> = Vec::new();
                if d.name.is_some() {
                    fields.push("name".into());
                }
                if d.data_type.is_some() {
                    fields.push("type".into());
                }
                fields.extend(d.extra.keys().cloned());
                fields
            })
            .unwrap_or_default()
    } else if context.starts_with("measure") {
        sm.measures
            .get(index)
            .map(|m| {
                let mut fields: Vec<String> = Vec::new();
                if m.name.is_some() {
                    fields.push("name".into());
                }
                if m.data_type.is_some() {
                    fields.push("type".into());
                }
                fields.extend(m.extra.keys().cloned());
                fields
            })
            .unwrap_or_default()
    } else {
        Vec::new()
    }
}

/// SEM014: missing required fields, suggesting the typo'd field that was
/// probably meant.
pub(super) fn lint_required_fields(
    sm_contexts: &[Located<RawSemanticModel>],
    base_dir: &Path,
) -> Vec<LintIssue> {
    let mut issues = Vec::new();
    for located in sm_contexts {
        let sm = &located.record;
        let model_name = sm.name.as_deref().unwrap_or("unknown");
        let rel_file = relative_path(&located.file, base_dir);

        for (field, context) in find_missing_required_fields(sm) {
            let (line, actual_fields) = if context == "semantic_model" {
                (
                    find_line_number(&located.lines, None, Some(model_name)),
                    present_model_fields(sm),
                )
            } else {
                let search = context
                    .split(['(', ')'])
                    .nth(1)
                    .unwrap_or(field.as_str())
                    .to_owned();
                (
                    find_line_number(&located.lines, None, Some(&search)),
                    nested_record_fields(sm, &context),
                )
            };

            let suggestion = best_match(
                &field,
                actual_fields.iter().map(String::as_str),
                SUGGESTION_THRESHOLD,
            )
            .filter(|s| *s != field);

            let location = if context == "semantic_model" {
                format!("semantic model '{model_name}'")
            } else {
                format!("{context} of semantic model '{model_name}'")
            };
            let message = match suggestion {
                Some(suggested) => format!(
                    "Missing required field '{field}' in {location}. Did you mean: '{suggested}'?"
                ),
                None => format!("Missing required field '{field}' in {location}."),
            };
            issues.push(make_error(
                rel_file.clone(),
                line,
                "SEM014_MISSING_REQUIRED_FIELD",
                message,
            ));
        }
    }
    issues
}

/// SEM020: unknown field names on metrics.
pub(super) fn lint_metric_field_names(
    metric_contexts: &[Located<RawMetric>],
    base_dir: &Path,
) -> Vec<LintIssue> {
    let mut issues = Vec::new();
    let valid = metric_all_fields();
    for located in metric_contexts {
        let metric_name = located.record.name.as_deref().unwrap_or("unknown");
        for key in located.record.extra.keys() {
            let line = find_line_number(&located.lines, Some(key), Some(metric_name));
            issues.push(make_error(
                relative_path(&located.file, base_dir),
                line,
                "SEM020_INVALID_METRIC_FIELD",
                format!(
                    "Invalid field name '{key}' in metric '{metric_name}'. Valid fields are: {}.",
                    valid.join(", ")
                ),
            ));
        }
    }
    issues
}

fn typo_issue(
    actual: &str,
    owner: &str,
    owner_kind: &str,
    valid_fields: &[&str],
    file: String,
    line: usize,
) -> LintIssue {
    let suggestion = best_match(actual, valid_fields.iter().copied(), SUGGESTION_THRESHOLD);
    let message = match suggestion {
        Some(suggested) => format!(
            "Field '{actual}' in {owner_kind} '{owner}' might be a typo. Did you mean: \
             '{suggested}'?"
        ),
        None => format!(
            "Field '{actual}' in {owner_kind} '{owner}' is not a recognized field."
        ),
    };
    make_warn(file, line, "SEM503_TYPO_IN_FIELD_NAME", message)
}

/// SEM503: typo'd optional fields on models, entities, dimensions and
/// measures.
pub(super) fn lint_field_typos(
    sm_contexts: &[Located<RawSemanticModel>],
    base_dir: &Path,
) -> Vec<LintIssue> {
    let mut issues = Vec::new();
    for located in sm_contexts {
        let sm = &located.record;
        let model_name = sm.name.as_deref().unwrap_or("unknown");
        let rel_file = relative_path(&located.file, base_dir);

        for key in sm.extra.keys() {
            if SEMANTIC_MODEL_REQUIRED_FIELDS.contains(&key.as_str()) {
                continue;
            }
            let line = find_line_number(&located.lines, Some(key), Some(model_name));
            issues.push(typo_issue(
                key,
                model_name,
                "semantic model",
                SEMANTIC_MODEL_OPTIONAL_FIELDS,
                rel_file.clone(),
                line,
            ));
        }

        let mut nested = |name: &str, extra: &std::collections::BTreeMap<String, serde_yaml::Value>,
                          required: &[&str],
                          optional: &[&str],
                          kind: &str| {
            for key in extra.keys() {
                if required.contains(&key.as_str()) {
                    continue;
                }
                let line = find_line_number(&located.lines, Some(key), Some(name));
                issues.push(typo_issue(key, name, kind, optional, rel_file.clone(), line));
            }
        };

        for (idx, entity) in sm.entities.iter().enumerate() {
            let name = entity
                .name
                .clone()
                .unwrap_or_else(|| format!("entity[{idx}]"));
            nested(
                &name,
                &entity.extra,
                ENTITY_REQUIRED_FIELDS,
                ENTITY_OPTIONAL_FIELDS,
                "entity",
            );
        }
        for (idx, dim) in sm.dimensions.iter().enumerate() {
            let name = dim
                .name
                .clone()
                .unwrap_or_else(|| format!("dimension[{idx}]"));
            nested(
                &name,
                &dim.extra,
                DIMENSION_REQUIRED_FIELDS,
                DIMENSION_OPTIONAL_FIELDS,
                "dimension",
            );
        }
        for (idx, measure) in sm.measures.iter().enumerate() {
            let name = measure
                .name
                .clone()
                .unwrap_or_else(|| format!("measure[{idx}]"));
            nested(
                &name,
                &measure.extra,
                MEASURE_REQUIRED_FIELDS,
                MEASURE_OPTIONAL_FIELDS,
                "measure",
            );
        }
    }
    issues
}

/// SEM503 over the metric records.
pub(super) fn lint_metric_field_typos(
    metric_contexts: &[Located<RawMetric>],
    base_dir: &Path,
) -> Vec<LintIssue> {
    let mut issues = Vec::new();
    for located in metric_contexts {
        let metric_name = located.record.name.as_deref().unwrap_or("unknown");
        for key in located.record.extra.keys() {
            if METRIC_REQUIRED_FIELDS.contains(&key.as_str()) {
                continue;
            }
            let line = find_line_number(&located.lines, Some(key), Some(metric_name));
            issues.push(typo_issue(
                key,
                metric_name,
                "metric",
                METRIC_OPTIONAL_FIELDS,
                relative_path(&located.file, base_dir),
                line,
            ));
        }
    }
    issues
}
