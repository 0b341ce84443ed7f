//! Manifest assembly: `<base>/sources.yml` + `<base>/semantic_models/*.yml`
//! into one validated [`Manifest`].

use std::collections::BTreeMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::model::{
    DataType, Dimension, Entity, EntityType, InputMeasure, Measure, Metric, MetricRef,
    MetricType, MetricTypeParams, NodeRelation, ProjectConfiguration, SemanticModel,
};
use super::raw::{
    yaml_expr_text, read_model_files, RawMetric, RawSemanticModel, RawSourcesFile,
};
use super::Manifest;

/// `SOURCE('TABLE')` references inside the model `table` field.
static TABLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\w+)\(\s*'([^']+)'\s*\)").expect("table reference pattern"));

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("required {what} not found: {path}")]
    MissingInput { what: &'static str, path: String },

    #[error("invalid sources.yml: {0}")]
    InvalidSources(String),

    #[error("missing required fields in semantic model '{model}': {details}")]
    MissingFields { model: String, details: String },

    #[error("invalid table reference '{table}' in semantic model '{model}'")]
    InvalidTableReference { model: String, table: String },

    #[error("source '{source_name}.{table}' referenced by semantic model '{model}' is not defined in sources.yml")]
    UnknownSource {
        model: String,
        source_name: String,
        table: String,
    },

    #[error("duplicate dimension names in semantic model '{model}': {names}")]
    DuplicateDimensions { model: String, names: String },

    #[error("duplicate measure names in semantic model '{model}': {names}")]
    DuplicateMeasures { model: String, names: String },

    #[error("dimensions and measures share names in semantic model '{model}': {names}")]
    OverlappingNames { model: String, names: String },

    #[error("duplicate metric names: {0}. Each metric must have a unique name across all semantic models")]
    DuplicateMetrics(String),

    #[error("invalid '{field}' values in {context}: {details}. Allowed values are: {allowed}")]
    InvalidEnum {
        field: &'static str,
        context: String,
        details: String,
        allowed: String,
    },

    #[error("yaml error in {file}: {error}")]
    Yaml { file: String, error: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Physical relation for one `(source, table)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRelation {
    pub database: Option<String>,
    pub schema: Option<String>,
    pub table: String,
}

/// Read `sources.yml` into a `(source, table) -> relation` map.
pub fn scan_sources(
    path: &Path,
) -> Result<BTreeMap<(String, String), SourceRelation>, ManifestError> {
    if !path.exists() {
        return Err(ManifestError::MissingInput {
            what: "sources.yml",
            path: path.display().to_string(),
        });
    }
    let text = std::fs::read_to_string(path)?;
    let file: RawSourcesFile =
        serde_yaml::from_str(&text).map_err(|e| ManifestError::InvalidSources(e.to_string()))?;
    if file.sources.is_empty() {
        return Err(ManifestError::InvalidSources(
            "no sources declared".into(),
        ));
    }

    let mut mapping = BTreeMap::new();
    for source in &file.sources {
        let source_name = source.name.clone().unwrap_or_default();
        for table in &source.tables {
            let Some(table_name) = table.name.clone() else {
                continue;
            };
            mapping.insert(
                (source_name.clone(), table_name.clone()),
                SourceRelation {
                    database: source.database.clone(),
                    schema: source.schema.clone(),
                    table: table_name,
                },
            );
        }
    }
    Ok(mapping)
}

/// Parse a `SOURCE('TABLE')` reference into `(source, table)`.
pub fn parse_table_reference(field: &str) -> Option<(String, String)> {
    TABLE_RE
        .captures(field)
        .map(|caps| (caps[1].to_owned(), caps[2].to_owned()))
}

/// Assemble and validate the manifest for a model directory.
#[tracing::instrument(skip_all, fields(base_dir = %base_dir.display()))]
pub fn assemble_manifest(base_dir: &Path) -> Result<Manifest, ManifestError> {
    let sources_path = base_dir.join("sources.yml");
    let sem_dir = base_dir.join("semantic_models");

    let source_relations = scan_sources(&sources_path)?;

    let mut raw_models: Vec<RawSemanticModel> = Vec::new();
    let mut raw_metrics: Vec<RawMetric> = Vec::new();
    for (path, text, _) in read_model_files(&sem_dir)? {
        // Re-parse strictly: the assembler fails on broken files where the
        // linter would only skip them.
        let file: super::raw::RawModelFile =
            serde_yaml::from_str(&text).map_err(|e| ManifestError::Yaml {
                file: path.display().to_string(),
                error: e.to_string(),
            })?;
        raw_models.extend(file.semantic_models);
        raw_metrics.extend(file.metrics);
    }

    validate_model_names(&raw_models)?;

    let semantic_models = raw_models
        .iter()
        .map(|sm| transform_semantic_model(sm, &source_relations))
        .collect::<Result<Vec<_>, _>>()?;

    let metric_refs: Vec<&RawMetric> = raw_metrics.iter().collect();
    validate_metric_uniqueness(&metric_refs)?;

    let metrics = raw_metrics
        .iter()
        .map(normalize_metric)
        .collect::<Result<Vec<_>, _>>()?;

    tracing::info!(
        models = semantic_models.len(),
        metrics = metrics.len(),
        "manifest assembled"
    );

    Ok(Manifest {
        semantic_models,
        metrics,
        project_configuration: ProjectConfiguration::default(),
    })
}

fn validate_model_names(models: &[RawSemanticModel]) -> Result<(), ManifestError> {
    for sm in models {
        let model = sm.name.clone().unwrap_or_else(|| "unknown".into());

        let (dup_dims, dup_measures, overlap) =
            super::validate::find_duplicate_names_in_model(sm);
        if !dup_dims.is_empty() {
            return Err(ManifestError::DuplicateDimensions {
                model,
                names: dup_dims.join(", "),
            });
        }
        if !dup_measures.is_empty() {
            return Err(ManifestError::DuplicateMeasures {
                model,
                names: dup_measures.join(", "),
            });
        }
        if !overlap.is_empty() {
            return Err(ManifestError::OverlappingNames {
                model,
                names: overlap.join(", "),
            });
        }

        let (invalid_dims, invalid_measures) = super::validate::find_invalid_types_in_model(sm);
        if !invalid_dims.is_empty() || !invalid_measures.is_empty() {
            let details = invalid_dims
                .iter()
                .chain(invalid_measures.iter())
                .map(|(name, value)| format!("'{name}' -> '{value}'"))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ManifestError::InvalidEnum {
                field: "type",
                context: format!("semantic model '{model}'"),
                details,
                allowed: DataType::allowed_values(),
            });
        }

        let invalid_entities = super::validate::find_invalid_entity_types(sm);
        if !invalid_entities.is_empty() {
            let details = invalid_entities
                .iter()
                .map(|(name, value)| format!("'{name}' -> '{value}'"))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ManifestError::InvalidEnum {
                field: "type",
                context: format!("entities of semantic model '{model}'"),
                details,
                allowed: EntityType::allowed_values(),
            });
        }
    }
    Ok(())
}

fn validate_metric_uniqueness(metrics: &[&RawMetric]) -> Result<(), ManifestError> {
    let duplicates = super::validate::find_duplicate_metric_names(metrics);
    if !duplicates.is_empty() {
        return Err(ManifestError::DuplicateMetrics(duplicates.join(", ")));
    }

    let (invalid_metric_types, invalid_data_types) =
        super::validate::find_invalid_enums_in_metrics(metrics);
    if !invalid_metric_types.is_empty() {
        let details = invalid_metric_types
            .iter()
            .map(|(name, value)| format!("'{name}' -> '{value}'"))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(ManifestError::InvalidEnum {
            field: "metric_type",
            context: "metrics definition".into(),
            details,
            allowed: MetricType::allowed_values(),
        });
    }
    if !invalid_data_types.is_empty() {
        let details = invalid_data_types
            .iter()
            .map(|(name, value)| format!("'{name}' -> '{value}'"))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(ManifestError::InvalidEnum {
            field: "type",
            context: "metrics definition".into(),
            details,
            allowed: DataType::allowed_values(),
        });
    }
    Ok(())
}

fn transform_semantic_model(
    sm: &RawSemanticModel,
    source_relations: &BTreeMap<(String, String), SourceRelation>,
) -> Result<SemanticModel, ManifestError> {
    let missing = super::validate::find_missing_required_fields(sm);
    if !missing.is_empty() {
        let details = missing
            .iter()
            .map(|(field, context)| format!("'{field}' in {context}"))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(ManifestError::MissingFields {
            model: sm.name.clone().unwrap_or_else(|| "unknown".into()),
            details,
        });
    }

    let name = sm.name.clone().expect("validated above");
    let table_field = sm.table.clone().expect("validated above");
    let (source_name, table_name) =
        parse_table_reference(&table_field).ok_or_else(|| ManifestError::InvalidTableReference {
            model: name.clone(),
            table: table_field.clone(),
        })?;
    let relation = source_relations
        .get(&(source_name.clone(), table_name.clone()))
        .ok_or_else(|| ManifestError::UnknownSource {
            model: name.clone(),
            source_name,
            table: table_name.clone(),
        })?;

    let node_relation = NodeRelation {
        alias: Some(table_name),
        schema_name: relation.schema.clone(),
        database: relation.database.clone(),
        relation_name: None,
    };

    let entities = sm
        .entities
        .iter()
        .map(|e| Entity {
            name: e.name.clone().expect("validated above"),
            entity_type: EntityType::parse(e.entity_type.as_deref().expect("validated above"))
                .expect("validated above"),
            expr: e.expr.as_ref().and_then(yaml_expr_text),
            description: e.description.clone(),
            role: e.role.clone(),
            label: e.label.clone(),
        })
        .collect();

    let dimensions = sm
        .dimensions
        .iter()
        .map(|d| Dimension {
            name: d.name.clone().expect("validated above"),
            data_type: DataType::parse(d.data_type.as_deref().expect("validated above"))
                .expect("validated above"),
            expr: d.expr.as_ref().and_then(yaml_expr_text),
            description: d.description.clone(),
            label: d.label.clone(),
        })
        .collect();

    let measures = sm
        .measures
        .iter()
        .map(|m| Measure {
            name: m.name.clone().expect("validated above"),
            data_type: m.data_type.as_deref().and_then(DataType::parse),
            agg: m.agg.clone(),
            expr: m.expr.as_ref().and_then(yaml_expr_text),
            description: m.description.clone(),
            label: m.label.clone(),
        })
        .collect();

    Ok(SemanticModel {
        name,
        description: sm.description.clone(),
        node_relation,
        primary_entity: sm.primary_entity.clone(),
        entities,
        dimensions,
        measures,
        label: sm.label.clone(),
    })
}

/// Fill a raw metric into its normalized typed form, distinguishing the
/// top-level-`expr` shape from the `type_params` shape.
fn normalize_metric(raw: &RawMetric) -> Result<Metric, ManifestError> {
    let name = raw.name.clone().unwrap_or_default();
    let metric_type = raw
        .metric_type
        .as_deref()
        .and_then(MetricType::parse)
        .unwrap_or(MetricType::Simple);

    let type_params = raw.type_params.as_ref().map(|tp| {
        let measure = tp.measure.as_ref().and_then(raw_input_measure);
        let mut input_measures: Vec<InputMeasure> = tp
            .input_measures
            .iter()
            .filter_map(raw_input_measure)
            .collect();
        // Simple metrics default their input_measures from the measure.
        if input_measures.is_empty() {
            if let Some(measure) = &measure {
                input_measures.push(measure.clone());
            }
        }
        MetricTypeParams {
            expr: tp.expr.as_ref().and_then(yaml_expr_text),
            measure,
            numerator: tp.numerator.clone(),
            denominator: tp.denominator.clone(),
            metrics: tp.metrics.iter().filter_map(raw_metric_ref).collect(),
            input_measures,
        }
    });

    Ok(Metric {
        name,
        metric_type,
        data_type: raw.data_type.as_deref().and_then(DataType::parse),
        description: raw.description.clone(),
        label: raw.label.clone(),
        expr: raw.expr.as_ref().and_then(yaml_expr_text),
        type_params,
    })
}

fn raw_input_measure(value: &serde_yaml::Value) -> Option<InputMeasure> {
    match value {
        serde_yaml::Value::String(name) => Some(InputMeasure {
            name: name.clone(),
            filter: None,
            alias: None,
            join_to_timespine: false,
        }),
        serde_yaml::Value::Mapping(map) => {
            let get = |key: &str| map.get(key).and_then(|v| v.as_str()).map(str::to_owned);
            Some(InputMeasure {
                name: get("name")?,
                filter: get("filter"),
                alias: get("alias"),
                join_to_timespine: map
                    .get("join_to_timespine")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
            })
        }
        _ => None,
    }
}

fn raw_metric_ref(value: &serde_yaml::Value) -> Option<MetricRef> {
    match value {
        serde_yaml::Value::String(name) => Some(MetricRef {
            name: name.clone(),
            filter: None,
            alias: None,
        }),
        serde_yaml::Value::Mapping(map) => {
            let get = |key: &str| map.get(key).and_then(|v| v.as_str()).map(str::to_owned);
            Some(MetricRef {
                name: get("name")?,
                filter: get("filter"),
                alias: get("alias"),
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_table_reference() {
        assert_eq!(
            parse_table_reference("rerp_mssql('MIS_PRJ_ACCT')"),
            Some(("rerp_mssql".into(), "MIS_PRJ_ACCT".into()))
        );
        assert_eq!(parse_table_reference("just_a_table"), None);
    }
}
