//! Valid field-name sets per YAML record kind, shared by the field and
//! typo lints.

pub const VALID_TOP_LEVEL_FIELDS: &[&str] = &["semantic_models", "metrics"];

pub const SEMANTIC_MODEL_REQUIRED_FIELDS: &[&str] = &["name", "table"];
pub const SEMANTIC_MODEL_OPTIONAL_FIELDS: &[&str] = &[
    "description",
    "entities",
    "dimensions",
    "measures",
    "label",
    "config",
    "node_relation",
    "primary_entity",
];

pub const ENTITY_REQUIRED_FIELDS: &[&str] = &["name", "type"];
pub const ENTITY_OPTIONAL_FIELDS: &[&str] = &["expr", "description", "role", "label"];

pub const DIMENSION_REQUIRED_FIELDS: &[&str] = &["name", "type"];
pub const DIMENSION_OPTIONAL_FIELDS: &[&str] = &["label", "description", "expr", "type_params"];

pub const MEASURE_REQUIRED_FIELDS: &[&str] = &["name", "type"];
pub const MEASURE_OPTIONAL_FIELDS: &[&str] = &["label", "description", "expr", "agg"];

pub const METRIC_REQUIRED_FIELDS: &[&str] = &["name", "metric_type"];
pub const METRIC_OPTIONAL_FIELDS: &[&str] = &["description", "type", "label", "expr", "type_params"];

pub fn metric_all_fields() -> Vec<&'static str> {
    let mut fields: Vec<&'static str> = METRIC_REQUIRED_FIELDS
        .iter()
        .chain(METRIC_OPTIONAL_FIELDS.iter())
        .copied()
        .collect();
    fields.sort_unstable();
    fields
}
