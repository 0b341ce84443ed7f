//! Raw YAML shapes as they appear on disk, before validation.
//!
//! Required fields are `Option` here so the assembler and the linter can
//! report what is missing instead of failing deserialization; unknown
//! fields are captured for the typo lints.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// One `semantic_models/*.yml` file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawModelFile {
    #[serde(default)]
    pub semantic_models: Vec<RawSemanticModel>,
    #[serde(default)]
    pub metrics: Vec<RawMetric>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSemanticModel {
    pub name: Option<String>,
    pub table: Option<String>,
    pub description: Option<String>,
    pub label: Option<String>,
    pub primary_entity: Option<String>,
    #[serde(default)]
    pub entities: Vec<RawEntity>,
    #[serde(default)]
    pub dimensions: Vec<RawDimension>,
    #[serde(default)]
    pub measures: Vec<RawMeasure>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEntity {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub entity_type: Option<String>,
    pub expr: Option<serde_yaml::Value>,
    pub description: Option<String>,
    pub role: Option<String>,
    pub label: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDimension {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub data_type: Option<String>,
    pub expr: Option<serde_yaml::Value>,
    pub description: Option<String>,
    pub label: Option<String>,
    pub type_params: Option<serde_yaml::Value>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMeasure {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub data_type: Option<String>,
    pub agg: Option<String>,
    pub expr: Option<serde_yaml::Value>,
    pub description: Option<String>,
    pub label: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMetric {
    pub name: Option<String>,
    pub metric_type: Option<String>,
    #[serde(rename = "type")]
    pub data_type: Option<String>,
    pub description: Option<String>,
    pub label: Option<String>,
    pub expr: Option<serde_yaml::Value>,
    pub type_params: Option<RawMetricTypeParams>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMetricTypeParams {
    pub expr: Option<serde_yaml::Value>,
    pub measure: Option<serde_yaml::Value>,
    pub numerator: Option<String>,
    pub denominator: Option<String>,
    #[serde(default)]
    pub metrics: Vec<serde_yaml::Value>,
    #[serde(default)]
    pub input_measures: Vec<serde_yaml::Value>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// `sources.yml` shape.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSourcesFile {
    #[serde(default)]
    pub sources: Vec<RawSource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSource {
    pub name: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    #[serde(default)]
    pub tables: Vec<RawSourceTable>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSourceTable {
    pub name: Option<String>,
}

/// Scalar YAML values (numbers included) rendered as expression text.
pub fn yaml_expr_text(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A record paired with where it came from, for diagnostics.
#[derive(Debug, Clone)]
pub struct Located<T> {
    pub record: T,
    pub file: PathBuf,
    pub lines: Vec<String>,
}

/// Load every semantic model under `semantic_models/`, keeping the source
/// file and its lines alongside each record.
pub fn load_models_with_files(
    sem_dir: &Path,
) -> std::io::Result<Vec<Located<RawSemanticModel>>> {
    let mut out = Vec::new();
    for (path, text, file) in read_model_files(sem_dir)? {
        let lines: Vec<String> = text.lines().map(str::to_owned).collect();
        for sm in file.semantic_models {
            out.push(Located {
                record: sm,
                file: path.clone(),
                lines: lines.clone(),
            });
        }
    }
    Ok(out)
}

/// Load every metric under `semantic_models/` with source context.
pub fn load_metrics_with_files(sem_dir: &Path) -> std::io::Result<Vec<Located<RawMetric>>> {
    let mut out = Vec::new();
    for (path, text, file) in read_model_files(sem_dir)? {
        let lines: Vec<String> = text.lines().map(str::to_owned).collect();
        for mt in file.metrics {
            out.push(Located {
                record: mt,
                file: path.clone(),
                lines: lines.clone(),
            });
        }
    }
    Ok(out)
}

/// Parse every `*.yml`/`*.yaml` file in the directory. Files that fail to
/// parse are skipped with a warning; the field linters inspect the raw
/// text separately.
pub fn read_model_files(
    sem_dir: &Path,
) -> std::io::Result<Vec<(PathBuf, String, RawModelFile)>> {
    let mut out = Vec::new();
    if !sem_dir.is_dir() {
        return Ok(out);
    }
    let mut entries: Vec<PathBuf> = std::fs::read_dir(sem_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("yml") | Some("yaml")
            )
        })
        .collect();
    entries.sort();

    for path in entries {
        let text = std::fs::read_to_string(&path)?;
        match serde_yaml::from_str::<RawModelFile>(&text) {
            Ok(file) => out.push((path, text, file)),
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "skipping unparseable semantic model file");
            }
        }
    }
    Ok(out)
}
