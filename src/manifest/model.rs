//! Typed semantic-layer records: models, entities, dimensions, measures,
//! metrics.
//!
//! These are the validated shapes the compiler consumes. Raw YAML input
//! lives in [`super::raw`]; the assembler converts raw to typed after
//! validation.

use serde::{Deserialize, Serialize};

// =============================================================================
// Enumerations
// =============================================================================

/// Data types a dimension, measure or metric may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Integer,
    Number,
    Float,
    Decimal,
    Varchar,
    Date,
    Datetime,
    Array,
    Map,
    Boolean,
}

impl DataType {
    pub const ALL: &'static [DataType] = &[
        DataType::Integer,
        DataType::Number,
        DataType::Float,
        DataType::Decimal,
        DataType::Varchar,
        DataType::Date,
        DataType::Datetime,
        DataType::Array,
        DataType::Map,
        DataType::Boolean,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Integer => "integer",
            DataType::Number => "number",
            DataType::Float => "float",
            DataType::Decimal => "decimal",
            DataType::Varchar => "varchar",
            DataType::Date => "date",
            DataType::Datetime => "datetime",
            DataType::Array => "array",
            DataType::Map => "map",
            DataType::Boolean => "boolean",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == s)
    }

    /// Sorted list of the accepted spellings, for diagnostics.
    pub fn allowed_values() -> String {
        let mut names: Vec<&str> = Self::ALL.iter().map(|t| t.as_str()).collect();
        names.sort_unstable();
        names.join(", ")
    }
}

/// Entity join role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Primary,
    Foreign,
}

impl EntityType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Primary => "primary",
            EntityType::Foreign => "foreign",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "primary" => Some(EntityType::Primary),
            "foreign" => Some(EntityType::Foreign),
            _ => None,
        }
    }

    pub fn allowed_values() -> String {
        "foreign, primary".into()
    }
}

/// Metric classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Simple,
    Ratio,
    Derived,
    Conversion,
    Cumulative,
}

impl MetricType {
    pub const ALL: &'static [MetricType] = &[
        MetricType::Simple,
        MetricType::Ratio,
        MetricType::Derived,
        MetricType::Conversion,
        MetricType::Cumulative,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricType::Simple => "simple",
            MetricType::Ratio => "ratio",
            MetricType::Derived => "derived",
            MetricType::Conversion => "conversion",
            MetricType::Cumulative => "cumulative",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == s)
    }

    pub fn allowed_values() -> String {
        let mut names: Vec<&str> = Self::ALL.iter().map(|t| t.as_str()).collect();
        names.sort_unstable();
        names.join(", ")
    }
}

// =============================================================================
// Records
// =============================================================================

/// Physical table binding for a semantic model.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeRelation {
    pub alias: Option<String>,
    pub schema_name: Option<String>,
    pub database: Option<String>,
    pub relation_name: Option<String>,
}

/// A joinable attribute of a semantic model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub expr: Option<String>,
    pub description: Option<String>,
    pub role: Option<String>,
    pub label: Option<String>,
}

impl Entity {
    /// The physical column backing this entity.
    pub fn expr_or_name(&self) -> &str {
        self.expr.as_deref().unwrap_or(&self.name)
    }
}

/// A non-aggregated attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    pub expr: Option<String>,
    pub description: Option<String>,
    pub label: Option<String>,
}

/// An aggregatable attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measure {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: Option<DataType>,
    pub agg: Option<String>,
    pub expr: Option<String>,
    pub description: Option<String>,
    pub label: Option<String>,
}

/// A named collection of entities, dimensions and measures over one
/// physical table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticModel {
    pub name: String,
    pub description: Option<String>,
    pub node_relation: NodeRelation,
    pub primary_entity: Option<String>,
    pub entities: Vec<Entity>,
    pub dimensions: Vec<Dimension>,
    pub measures: Vec<Measure>,
    pub label: Option<String>,
}

impl SemanticModel {
    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    pub fn measure(&self, name: &str) -> Option<&Measure> {
        self.measures.iter().find(|m| m.name == name)
    }

    pub fn primary_entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities
            .iter()
            .filter(|e| e.entity_type == EntityType::Primary)
    }

    pub fn foreign_entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities
            .iter()
            .filter(|e| e.entity_type == EntityType::Foreign)
    }
}

/// Reference to another metric inside `type_params.metrics`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricRef {
    pub name: String,
    pub filter: Option<String>,
    pub alias: Option<String>,
}

/// A measure input inside `type_params`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputMeasure {
    pub name: String,
    pub filter: Option<String>,
    pub alias: Option<String>,
    #[serde(default)]
    pub join_to_timespine: bool,
}

/// Shared optional-field container for the `type_params` metric shape.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MetricTypeParams {
    pub expr: Option<String>,
    pub measure: Option<InputMeasure>,
    pub numerator: Option<String>,
    pub denominator: Option<String>,
    #[serde(default)]
    pub metrics: Vec<MetricRef>,
    #[serde(default)]
    pub input_measures: Vec<InputMeasure>,
}

/// A globally named computation over measures and other metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub metric_type: MetricType,
    #[serde(rename = "type")]
    pub data_type: Option<DataType>,
    pub description: Option<String>,
    pub label: Option<String>,
    /// Top-level expression - the simplified metric shape.
    pub expr: Option<String>,
    /// Nested parameters - the structured metric shape.
    pub type_params: Option<MetricTypeParams>,
}

impl Metric {
    /// The metric's expression regardless of which of the two legal shapes
    /// carried it.
    pub fn expression(&self) -> Option<&str> {
        self.expr
            .as_deref()
            .or_else(|| self.type_params.as_ref().and_then(|tp| tp.expr.as_deref()))
    }
}

/// Time-spine metadata, optional.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectConfiguration {
    #[serde(default)]
    pub time_spines: Vec<TimeSpine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpine {
    pub node_relation: NodeRelation,
    pub column: String,
    pub granularity: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_round_trip() {
        for t in DataType::ALL {
            assert_eq!(DataType::parse(t.as_str()), Some(*t));
        }
        assert_eq!(DataType::parse("text"), None);
    }

    #[test]
    fn test_metric_expression_both_shapes() {
        let flat = Metric {
            name: "total".into(),
            metric_type: MetricType::Simple,
            data_type: None,
            description: None,
            label: None,
            expr: Some("SUM(m__a)".into()),
            type_params: None,
        };
        assert_eq!(flat.expression(), Some("SUM(m__a)"));

        let nested = Metric {
            expr: None,
            type_params: Some(MetricTypeParams {
                expr: Some("a / b".into()),
                ..MetricTypeParams::default()
            }),
            ..flat
        };
        assert_eq!(nested.expression(), Some("a / b"));
    }
}
