//! Name-based rules: duplicates, filename consistency, orphan foreign
//! entities.

use std::collections::BTreeSet;
use std::path::Path;

use inflector::cases::camelcase::to_camel_case;

use crate::manifest::raw::{Located, RawMetric, RawSemanticModel};
use crate::manifest::validate::{find_duplicate_metric_names, find_duplicate_names_in_model};

use super::{find_line_number, make_error, make_warn, relative_path, LintIssue};

/// SEM007/8/9: within-model dimension/measure duplicates and overlaps.
pub(super) fn lint_name_uniqueness(
    sm_contexts: &[Located<RawSemanticModel>],
    base_dir: &Path,
) -> Vec<LintIssue> {
    let mut issues = Vec::new();

    for located in sm_contexts {
        let sm = &located.record;
        let model_name = sm.name.as_deref().unwrap_or("unknown");
        let rel_file = relative_path(&located.file, base_dir);
        let (dup_dims, dup_measures, overlap) = find_duplicate_names_in_model(sm);

        for name in dup_dims {
            let line = find_line_number(&located.lines, None, Some(&name));
            issues.push(make_error(
                rel_file.clone(),
                line,
                "SEM007_DUPLICATE_DIMENSION_NAME",
                format!("Duplicate dimension name '{name}' found in semantic model '{model_name}'."),
            ));
        }
        for name in dup_measures {
            let line = find_line_number(&located.lines, None, Some(&name));
            issues.push(make_error(
                rel_file.clone(),
                line,
                "SEM008_DUPLICATE_MEASURE_NAME",
                format!("Duplicate measure name '{name}' found in semantic model '{model_name}'."),
            ));
        }
        for name in overlap {
            let line = find_line_number(&located.lines, None, Some(&name));
            issues.push(make_error(
                rel_file.clone(),
                line,
                "SEM009_DIMENSION_MEASURE_NAME_CONFLICT",
                format!(
                    "Dimension and measure share the same name '{name}' in semantic model \
                     '{model_name}'."
                ),
            ));
        }
    }
    issues
}

/// SEM002: global metric-name uniqueness.
pub(super) fn lint_metric_uniqueness(
    metric_contexts: &[Located<RawMetric>],
    base_dir: &Path,
) -> Vec<LintIssue> {
    let metrics: Vec<&RawMetric> = metric_contexts.iter().map(|c| &c.record).collect();
    let duplicates: BTreeSet<String> = find_duplicate_metric_names(&metrics).into_iter().collect();

    let mut issues = Vec::new();
    for located in metric_contexts {
        let Some(name) = located.record.name.as_deref() else {
            continue;
        };
        if duplicates.contains(name) {
            let line = find_line_number(&located.lines, None, Some(name));
            issues.push(make_error(
                relative_path(&located.file, base_dir),
                line,
                "SEM002_METRIC_DUPLICATE_NAME",
                format!("Metric name '{name}' is duplicated across metric definitions."),
            ));
        }
    }
    issues
}

/// Name candidates a file name could canonicalize to.
pub(crate) fn model_name_candidates(filename: &str) -> Vec<String> {
    let mut base = filename;
    for ext in [".yml", ".yaml"] {
        if let Some(stripped) = base.strip_suffix(ext) {
            base = stripped;
            break;
        }
    }

    let mut candidates: BTreeSet<String> = BTreeSet::new();
    candidates.insert(base.to_owned());

    if let Some(without_model) = base.strip_suffix("Model") {
        if let Some(first) = without_model.chars().next() {
            if first.is_uppercase() {
                let mut camel = first.to_lowercase().to_string();
                camel.push_str(&without_model[first.len_utf8()..]);
                candidates.insert(camel);
            }
        }
    }
    if base.contains('_') {
        candidates.insert(to_camel_case(base));
    }
    if base.contains('-') {
        candidates.insert(to_camel_case(&base.replace('-', "_")));
    }

    candidates.into_iter().collect()
}

/// SEM501: the model name does not match any canonicalization of the
/// file name.
pub(super) fn lint_filename_consistency(
    sm_contexts: &[Located<RawSemanticModel>],
    base_dir: &Path,
) -> Vec<LintIssue> {
    let mut issues = Vec::new();
    for located in sm_contexts {
        let Some(model_name) = located.record.name.as_deref() else {
            continue;
        };
        let filename = located
            .file
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or_default();
        let candidates = model_name_candidates(filename);
        if candidates.iter().any(|c| c == model_name) {
            continue;
        }

        let line = find_line_number(&located.lines, None, Some(model_name));
        let shown: Vec<&str> = candidates.iter().map(String::as_str).take(3).collect();
        let mut message = format!(
            "Semantic model name '{model_name}' does not match filename '{filename}'. \
             Expected name based on filename: {}",
            shown.join(", ")
        );
        if let Some(first) = candidates.first() {
            message.push_str(&format!(" (suggested: '{first}')"));
        }
        issues.push(make_warn(
            relative_path(&located.file, base_dir),
            line,
            "SEM501_FILENAME_MODEL_NAME_MISMATCH",
            message,
        ));
    }
    issues
}

/// SEM502: a foreign entity with no primary entity of the same name in
/// any semantic model.
pub(super) fn lint_foreign_entity_primary_match(
    sm_contexts: &[Located<RawSemanticModel>],
    base_dir: &Path,
) -> Vec<LintIssue> {
    let primary_names: BTreeSet<&str> = sm_contexts
        .iter()
        .flat_map(|located| located.record.entities.iter())
        .filter(|e| e.entity_type.as_deref() == Some("primary"))
        .filter_map(|e| e.name.as_deref())
        .collect();

    let mut issues = Vec::new();
    for located in sm_contexts {
        let model_name = located.record.name.as_deref().unwrap_or("unknown");
        for (idx, entity) in located.record.entities.iter().enumerate() {
            if entity.entity_type.as_deref() != Some("foreign") {
                continue;
            }
            let entity_name = entity
                .name
                .clone()
                .unwrap_or_else(|| format!("entity[{idx}]"));
            if primary_names.contains(entity_name.as_str()) {
                continue;
            }
            let line = find_line_number(&located.lines, None, Some(&entity_name));
            issues.push(make_warn(
                relative_path(&located.file, base_dir),
                line,
                "SEM502_FOREIGN_ENTITY_NO_PRIMARY_MATCH",
                format!(
                    "Foreign entity '{entity_name}' in semantic model '{model_name}' does not \
                     have a matching primary entity with the same name in any semantic model. \
                     This may cause join path generation to fail."
                ),
            ));
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_name_candidates() {
        assert!(model_name_candidates("card_aply.yml").contains(&"cardAply".to_owned()));
        assert!(model_name_candidates("CoYmdInfoMModel.yml").contains(&"coYmdInfoM".to_owned()));
        assert!(model_name_candidates("orders.yml").contains(&"orders".to_owned()));
    }
}
