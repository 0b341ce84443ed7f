//! Enum-range rules: data types, metric types, entity types.

use std::path::Path;

use crate::manifest::model::{DataType, EntityType, MetricType};
use crate::manifest::raw::{Located, RawMetric, RawSemanticModel};
use crate::manifest::validate::{
    find_invalid_entity_types, find_invalid_enums_in_metrics, find_invalid_types_in_model,
};

use super::{find_line_number, make_error, relative_path, LintIssue};

/// SEM012/SEM013: dimension/measure `type` outside the DataType range.
pub(super) fn lint_model_data_types(
    sm_contexts: &[Located<RawSemanticModel>],
    base_dir: &Path,
) -> Vec<LintIssue> {
    let allowed = DataType::allowed_values();
    let mut issues = Vec::new();

    for located in sm_contexts {
        let model_name = located.record.name.as_deref().unwrap_or("unknown");
        let rel_file = relative_path(&located.file, base_dir);
        let (invalid_dims, invalid_measures) = find_invalid_types_in_model(&located.record);

        for (dim_name, invalid) in invalid_dims {
            let line = find_line_number(&located.lines, Some(&invalid), Some(&dim_name));
            issues.push(make_error(
                rel_file.clone(),
                line,
                "SEM012_INVALID_DIMENSION_TYPE",
                format!(
                    "Dimension '{dim_name}' in semantic model '{model_name}' has invalid type \
                     '{invalid}'. Allowed DataType values are: {allowed}."
                ),
            ));
        }
        for (measure_name, invalid) in invalid_measures {
            let line = find_line_number(&located.lines, Some(&invalid), Some(&measure_name));
            issues.push(make_error(
                rel_file.clone(),
                line,
                "SEM013_INVALID_MEASURE_TYPE",
                format!(
                    "Measure '{measure_name}' in semantic model '{model_name}' has invalid type \
                     '{invalid}'. Allowed DataType values are: {allowed}."
                ),
            ));
        }
    }
    issues
}

/// SEM021: entity `type` outside {primary, foreign}.
pub(super) fn lint_entity_types(
    sm_contexts: &[Located<RawSemanticModel>],
    base_dir: &Path,
) -> Vec<LintIssue> {
    let allowed = EntityType::allowed_values();
    let mut issues = Vec::new();

    for located in sm_contexts {
        let model_name = located.record.name.as_deref().unwrap_or("unknown");
        for (entity_name, invalid) in find_invalid_entity_types(&located.record) {
            let line = find_line_number(&located.lines, Some(&invalid), Some(&entity_name));
            issues.push(make_error(
                relative_path(&located.file, base_dir),
                line,
                "SEM021_INVALID_ENTITY_TYPE",
                format!(
                    "Entity '{entity_name}' in semantic model '{model_name}' has invalid type \
                     '{invalid}'. Allowed EntityType values are: {allowed}."
                ),
            ));
        }
    }
    issues
}

/// SEM003/SEM004: metric_type and metric data type enums.
pub(super) fn lint_metric_enums(
    metric_contexts: &[Located<RawMetric>],
    base_dir: &Path,
) -> Vec<LintIssue> {
    let allowed_metric_types = MetricType::allowed_values();
    let allowed_data_types = DataType::allowed_values();
    let mut issues = Vec::new();

    for located in metric_contexts {
        let Some(name) = located.record.name.as_deref() else {
            continue;
        };
        let rel_file = relative_path(&located.file, base_dir);
        let metrics = [&located.record];
        let (invalid_metric_types, invalid_data_types) = find_invalid_enums_in_metrics(&metrics);

        for (_, invalid) in invalid_metric_types {
            let line = find_line_number(&located.lines, Some(&invalid), Some(name));
            issues.push(make_error(
                rel_file.clone(),
                line,
                "SEM003_INVALID_METRIC_TYPE",
                format!(
                    "Metric '{name}' has invalid metric_type '{invalid}'. Allowed metric_type \
                     values are: {allowed_metric_types}."
                ),
            ));
        }
        for (_, invalid) in invalid_data_types {
            let line = find_line_number(&located.lines, Some(&invalid), Some(name));
            issues.push(make_error(
                rel_file.clone(),
                line,
                "SEM004_INVALID_METRIC_DATA_TYPE",
                format!(
                    "Metric '{name}' has invalid type '{invalid}'. Allowed DataType values \
                     are: {allowed_data_types}."
                ),
            ));
        }
    }
    issues
}
