//! Result-column metadata: name, inferred type, display label for every
//! expression of the final SELECT list.

use serde::{Deserialize, Serialize};

use crate::manifest::Manifest;
use crate::sql::expr::Expr;
use crate::sql::query::Select;

/// Metadata for one output column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub column: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub label: String,
}

enum Row {
    /// A column carried up from the agg layer.
    Agg { model: Option<String>, name: String, output: String },
    /// A computed derivation-layer expression.
    Deriv { name: String, dependencies: Vec<String>, expr: Expr },
}

/// Collect metadata for the final SELECT. One entry per projection, in
/// select-list order.
pub fn collect_metadata(select: &Select, manifest: &Manifest) -> Vec<ColumnMeta> {
    select
        .projections
        .iter()
        .map(|projection| describe(classify(projection), manifest))
        .collect()
}

fn classify(projection: &Expr) -> Row {
    match projection {
        Expr::Column { table, name } => Row::Agg {
            model: table.as_ref().map(|t| t.text.clone()),
            name: name.text.clone(),
            output: name.text.clone(),
        },
        Expr::Alias { expr, alias } => match &**expr {
            Expr::Column { table, name } => Row::Agg {
                model: table.as_ref().map(|t| t.text.clone()),
                name: name.text.clone(),
                output: alias.text.clone(),
            },
            other => Row::Deriv {
                name: alias.text.clone(),
                dependencies: other.column_names(),
                expr: other.clone(),
            },
        },
        other => Row::Deriv {
            name: other.sql_text(),
            dependencies: other.column_names(),
            expr: other.clone(),
        },
    }
}

fn describe(row: Row, manifest: &Manifest) -> ColumnMeta {
    match row {
        Row::Agg { model, name, output } => {
            if let Some(metric) = manifest.metric(&output).or_else(|| manifest.metric(&name)) {
                return ColumnMeta {
                    column: output.clone(),
                    data_type: metric
                        .data_type
                        .map(|t| t.as_str().to_owned())
                        .unwrap_or_else(|| "numeric".into()),
                    label: metric.label.clone().unwrap_or(output),
                };
            }
            let dimension = model
                .as_deref()
                .and_then(|m| manifest.dimension(m, &name))
                .or_else(|| manifest.any_dimension(&name));
            if let Some(dimension) = dimension {
                return ColumnMeta {
                    column: output.clone(),
                    data_type: dimension.data_type.as_str().to_owned(),
                    label: dimension.label.clone().unwrap_or(output),
                };
            }
            let measure = model
                .as_deref()
                .and_then(|m| manifest.measure(m, &name))
                .or_else(|| manifest.any_measure(&name));
            if let Some(measure) = measure {
                return ColumnMeta {
                    column: output.clone(),
                    data_type: measure
                        .data_type
                        .map(|t| t.as_str().to_owned())
                        .unwrap_or_else(|| "numeric".into()),
                    label: measure.label.clone().unwrap_or(output),
                };
            }
            ColumnMeta {
                column: output.clone(),
                data_type: "varchar".into(),
                label: output,
            }
        }
        Row::Deriv { name, dependencies, expr } => {
            if let Some(metric) = manifest.metric(&name) {
                if let Some(declared) = metric.data_type {
                    return ColumnMeta {
                        column: name.clone(),
                        data_type: declared.as_str().to_owned(),
                        label: metric.label.clone().unwrap_or(name),
                    };
                }
                let inferred = infer_type(&dependencies, &expr, manifest);
                return ColumnMeta {
                    column: name.clone(),
                    data_type: inferred,
                    label: metric.label.clone().unwrap_or(name),
                };
            }
            let inferred = infer_type(&dependencies, &expr, manifest);
            ColumnMeta {
                column: name.clone(),
                data_type: inferred,
                label: name,
            }
        }
    }
}

/// Priority used when dependencies disagree on a type.
fn type_priority(name: &str) -> u8 {
    match name {
        "decimal" | "numeric" => 5,
        "float" | "double" => 4,
        "bigint" | "long" => 3,
        "integer" | "int" => 2,
        "string" | "varchar" => 1,
        _ => 0,
    }
}

fn promotes_to_decimal(name: &str) -> bool {
    matches!(
        name,
        "integer" | "bigint" | "int" | "long" | "number" | "numeric"
    )
}

fn dependency_type(name: &str, manifest: &Manifest) -> Option<String> {
    if let Some(metric) = manifest.metric(name) {
        return Some(
            metric
                .data_type
                .map(|t| t.as_str().to_owned())
                .unwrap_or_else(|| "numeric".into()),
        );
    }
    if let Some(dimension) = manifest.any_dimension(name) {
        return Some(dimension.data_type.as_str().to_owned());
    }
    if let Some(measure) = manifest.any_measure(name) {
        return Some(
            measure
                .data_type
                .map(|t| t.as_str().to_owned())
                .unwrap_or_else(|| "numeric".into()),
        );
    }
    None
}

/// Infer a derived expression's type from its dependencies: a division
/// promotes integer-like results to decimal; disagreeing dependencies
/// resolve by priority.
fn infer_type(dependencies: &[String], expr: &Expr, manifest: &Manifest) -> String {
    let types: Vec<String> = dependencies
        .iter()
        .filter_map(|dep| dependency_type(dep, manifest))
        .collect();
    if types.is_empty() {
        return "numeric".into();
    }

    let divides = expr.contains_division();
    let all_same = types.iter().all(|t| t == &types[0]);
    let chosen = if all_same {
        types[0].clone()
    } else {
        types
            .iter()
            .max_by_key(|t| type_priority(t))
            .expect("non-empty")
            .clone()
    };

    if divides && promotes_to_decimal(&chosen) {
        return "decimal".into();
    }
    chosen
}
