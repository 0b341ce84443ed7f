//! Validation primitives shared by the manifest assembler (hard failures)
//! and the linter (accumulated issues).

use std::collections::BTreeMap;

use super::model::{DataType, EntityType, MetricType};
use super::raw::{RawMetric, RawSemanticModel};

/// Required fields per record kind; the linter's field-name sets live in
/// [`crate::lint::schema`].
pub const SEMANTIC_MODEL_REQUIRED_FIELDS: &[&str] = &["name", "table"];
pub const ENTITY_REQUIRED_FIELDS: &[&str] = &["name", "type"];
pub const DIMENSION_REQUIRED_FIELDS: &[&str] = &["name", "type"];
pub const MEASURE_REQUIRED_FIELDS: &[&str] = &["name", "type"];
pub const METRIC_REQUIRED_FIELDS: &[&str] = &["name", "metric_type"];

fn normalize(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Duplicate and overlapping dimension/measure names within one model.
///
/// Returns `(duplicate_dimensions, duplicate_measures, overlapping)`.
pub fn find_duplicate_names_in_model(
    sm: &RawSemanticModel,
) -> (Vec<String>, Vec<String>, Vec<String>) {
    let dim_names: Vec<&str> = sm
        .dimensions
        .iter()
        .filter_map(|d| d.name.as_deref())
        .collect();
    let measure_names: Vec<&str> = sm
        .measures
        .iter()
        .filter_map(|m| m.name.as_deref())
        .collect();

    let duplicates = |names: &[&str]| {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for name in names {
            *counts.entry(name).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(name, _)| name.to_owned())
            .collect::<Vec<String>>()
    };

    let overlap: Vec<String> = dim_names
        .iter()
        .filter(|d| measure_names.contains(d))
        .map(|d| (*d).to_owned())
        .collect();

    (duplicates(&dim_names), duplicates(&measure_names), overlap)
}

/// Metric names appearing more than once across all files.
pub fn find_duplicate_metric_names(metrics: &[&RawMetric]) -> Vec<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for mt in metrics {
        if let Some(name) = normalize(mt.name.as_deref()) {
            *counts.entry(name).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(name, _)| name.to_owned())
        .collect()
}

/// Dimension/measure `type` values outside the [`DataType`] enumeration.
///
/// Returns `(invalid_dimensions, invalid_measures)` as `(name, value)` pairs.
pub fn find_invalid_types_in_model(
    sm: &RawSemanticModel,
) -> (Vec<(String, String)>, Vec<(String, String)>) {
    let mut invalid_dims = Vec::new();
    let mut invalid_measures = Vec::new();

    for dim in &sm.dimensions {
        if let Some(t) = normalize(dim.data_type.as_deref()) {
            if DataType::parse(t).is_none() {
                invalid_dims.push((dim.name.clone().unwrap_or_default(), t.to_owned()));
            }
        }
    }
    for ms in &sm.measures {
        if let Some(t) = normalize(ms.data_type.as_deref()) {
            if DataType::parse(t).is_none() {
                invalid_measures.push((ms.name.clone().unwrap_or_default(), t.to_owned()));
            }
        }
    }
    (invalid_dims, invalid_measures)
}

/// `metric_type` / `type` values outside their enumerations.
///
/// Returns `(invalid_metric_types, invalid_data_types)` as `(name, value)`.
pub fn find_invalid_enums_in_metrics(
    metrics: &[&RawMetric],
) -> (Vec<(String, String)>, Vec<(String, String)>) {
    let mut invalid_metric_types = Vec::new();
    let mut invalid_data_types = Vec::new();

    for mt in metrics {
        let name = mt.name.clone().unwrap_or_default();
        if let Some(v) = normalize(mt.metric_type.as_deref()) {
            if MetricType::parse(v).is_none() {
                invalid_metric_types.push((name.clone(), v.to_owned()));
            }
        }
        if let Some(v) = normalize(mt.data_type.as_deref()) {
            if DataType::parse(v).is_none() {
                invalid_data_types.push((name.clone(), v.to_owned()));
            }
        }
    }
    (invalid_metric_types, invalid_data_types)
}

/// Entity `type` values outside {primary, foreign}.
///
/// Returns `(entity_name, value)` pairs.
pub fn find_invalid_entity_types(sm: &RawSemanticModel) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for (idx, ent) in sm.entities.iter().enumerate() {
        if let Some(v) = normalize(ent.entity_type.as_deref()) {
            if EntityType::parse(v).is_none() {
                let name = ent
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("entity[{idx}]"));
                out.push((name, v.to_owned()));
            }
        }
    }
    out
}

/// Missing required fields across a model and its nested records.
///
/// Returns `(field, context)` pairs where context is `semantic_model` or a
/// positional record description like `dimension[1] (region)`.
pub fn find_missing_required_fields(sm: &RawSemanticModel) -> Vec<(String, String)> {
    let mut missing = Vec::new();

    for field in SEMANTIC_MODEL_REQUIRED_FIELDS {
        let present = match *field {
            "name" => normalize(sm.name.as_deref()).is_some(),
            "table" => normalize(sm.table.as_deref()).is_some(),
            _ => true,
        };
        if !present {
            missing.push(((*field).to_owned(), "semantic_model".to_owned()));
        }
    }

    for (idx, ent) in sm.entities.iter().enumerate() {
        let desc = ent
            .name
            .clone()
            .unwrap_or_else(|| format!("entity[{idx}]"));
        for field in ENTITY_REQUIRED_FIELDS {
            let present = match *field {
                "name" => normalize(ent.name.as_deref()).is_some(),
                "type" => normalize(ent.entity_type.as_deref()).is_some(),
                _ => true,
            };
            if !present {
                missing.push(((*field).to_owned(), format!("entity[{idx}] ({desc})")));
            }
        }
    }

    for (idx, dim) in sm.dimensions.iter().enumerate() {
        let desc = dim
            .name
            .clone()
            .unwrap_or_else(|| format!("dimension[{idx}]"));
        for field in DIMENSION_REQUIRED_FIELDS {
            let present = match *field {
                "name" => normalize(dim.name.as_deref()).is_some(),
                "type" => normalize(dim.data_type.as_deref()).is_some(),
                _ => true,
            };
            if !present {
                missing.push(((*field).to_owned(), format!("dimension[{idx}] ({desc})")));
            }
        }
    }

    for (idx, ms) in sm.measures.iter().enumerate() {
        let desc = ms
            .name
            .clone()
            .unwrap_or_else(|| format!("measure[{idx}]"));
        for field in MEASURE_REQUIRED_FIELDS {
            let present = match *field {
                "name" => normalize(ms.name.as_deref()).is_some(),
                "type" => normalize(ms.data_type.as_deref()).is_some(),
                _ => true,
            };
            if !present {
                missing.push(((*field).to_owned(), format!("measure[{idx}] ({desc})")));
            }
        }
    }

    missing
}
