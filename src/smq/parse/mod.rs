//! SMQ parser: lowers each clause of the query into the per-layer IR.
//!
//! Each parser routine only places nodes for its own clause; cross-clause
//! consistency (filter columns missing from selects, group/select parity,
//! join prerequisites) is the composer's job.

mod filters;
mod groups;
mod joins;
mod limit;
mod metrics;
mod orders;

use crate::config::CompileConfig;
use crate::error::{CompileError, CompileResult};
use crate::manifest::model::{Dimension, Measure};
use crate::manifest::Manifest;
use crate::sql::expr::{col, Expr};
use crate::sql::lower::parse_expr;

use super::{QueryIr, Smq};

/// SMQ parser. Holds the manifest and config for the duration of a parse.
pub struct SmqParser<'a> {
    pub(crate) manifest: &'a Manifest,
    pub(crate) config: &'a CompileConfig,
}

impl<'a> SmqParser<'a> {
    pub fn new(manifest: &'a Manifest, config: &'a CompileConfig) -> Self {
        Self { manifest, config }
    }

    /// Lower the whole SMQ. Clause order mirrors the request shape:
    /// limit, filters, groups, metrics, orders, joins.
    #[tracing::instrument(skip_all)]
    pub fn parse(&self, smq: &Smq) -> CompileResult<QueryIr> {
        smq.validate()?;
        let mut ir = QueryIr::new();

        if let Some(value) = smq.limit {
            limit::parse_limit(&mut ir, value)?;
        }
        filters::parse_filters(&mut ir, &smq.filters(), self.manifest)?;
        groups::parse_groups(&mut ir, &smq.group_by())?;
        metrics::parse_metrics(&mut ir, &smq.metrics(), self.manifest, self.config)?;
        orders::parse_orders(&mut ir, &smq.order_by(), self.manifest, self.config)?;
        joins::parse_joins(&mut ir, &smq.joins(), self.manifest)?;

        tracing::debug!(layers = ir.layers().count(), "SMQ lowered");
        Ok(ir)
    }
}

// =============================================================================
// Shared reference resolution
// =============================================================================

/// Split a `MODEL__COLUMN` qualified reference.
pub(crate) fn split_reference(name: &str) -> Option<(&str, &str)> {
    name.split_once("__")
}

/// A column resolved against a semantic model.
pub(crate) enum ResolvedColumn<'a> {
    Measure(&'a Measure),
    Dimension(&'a Dimension),
}

impl<'a> ResolvedColumn<'a> {
    pub(crate) fn expr(&self) -> Option<&'a str> {
        match self {
            ResolvedColumn::Measure(m) => m.expr.as_deref(),
            ResolvedColumn::Dimension(d) => d.expr.as_deref(),
        }
    }
}

/// Measure first, dimension second - the metrics-clause order.
pub(crate) fn resolve_measure_first<'a>(
    manifest: &'a Manifest,
    model: &str,
    column: &str,
) -> Option<ResolvedColumn<'a>> {
    manifest
        .measure(model, column)
        .map(ResolvedColumn::Measure)
        .or_else(|| manifest.dimension(model, column).map(ResolvedColumn::Dimension))
}

/// Dimension first, measure second - the filters-clause order.
pub(crate) fn resolve_dimension_first<'a>(
    manifest: &'a Manifest,
    model: &str,
    column: &str,
) -> Option<ResolvedColumn<'a>> {
    manifest
        .dimension(model, column)
        .map(ResolvedColumn::Dimension)
        .or_else(|| manifest.measure(model, column).map(ResolvedColumn::Measure))
}

/// The node a projection layer exposes for a resolved column: the bare
/// column, or its expression aliased back to the column name.
pub(crate) fn projection_node(
    resolved: &ResolvedColumn<'_>,
    column: &str,
) -> CompileResult<Expr> {
    match resolved.expr() {
        Some(text) if text != column => {
            let parsed = parse_expr(text)?;
            if parsed.sql_text() == column {
                Ok(col(column))
            } else {
                Ok(Expr::Alias {
                    expr: Box::new(parsed),
                    alias: crate::sql::ident::Ident::new(column),
                })
            }
        }
        _ => Ok(col(column)),
    }
}

/// Whether any name referenced by the expression resolves to a metric.
pub(crate) fn is_metric_in_expr(expr: &Expr, manifest: &Manifest) -> bool {
    let mut found = false;
    expr.walk(&mut |e| {
        if let Some(name) = reference_name(e) {
            if manifest.metric(name).is_some() {
                found = true;
            }
        }
    });
    found
}

/// Whether the expression references a metric whose own expression
/// references further metrics (a derived metric still to unpack).
pub(crate) fn derived_metric_in_expr(expr: &Expr, manifest: &Manifest) -> bool {
    let mut found = false;
    expr.walk(&mut |e| {
        if found {
            return;
        }
        let Some(name) = reference_name(e) else {
            return;
        };
        let Some(metric) = manifest.metric(name) else {
            return;
        };
        let Some(text) = metric.expression() else {
            return;
        };
        if let Ok(inner) = parse_expr(text) {
            if is_metric_in_expr(&inner, manifest) {
                found = true;
            }
        }
    });
    found
}

fn reference_name(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Column { name, .. } => Some(&name.text),
        Expr::Identifier(ident) => Some(&ident.text),
        _ => None,
    }
}

/// Column names referenced by the expression, in document order, first
/// occurrence only.
pub(crate) fn referenced_names(expr: &Expr) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    expr.walk(&mut |e| {
        if let Some(name) = reference_name(e) {
            if !out.iter().any(|n| n == name) {
                out.push(name.to_owned());
            }
        }
    });
    out
}

/// Replace every column/identifier reference carrying the given name with
/// a bare column of the new name.
pub(crate) fn rename_reference(expr: &mut Expr, from: &str, to: &str) {
    expr.walk_mut(&mut |e| {
        let matches = reference_name(e).is_some_and(|n| n == from);
        if matches {
            *e = col(to);
        }
    });
}

/// The projection layer a bare column belongs to, recovered from the
/// qualified references of the original SMQ text.
pub(crate) fn find_model_of_column(column: &str, smq: &Smq) -> Option<String> {
    for clause in smq.textual_entries() {
        if !(clause.contains("__") && clause.contains(column)) {
            continue;
        }
        let Ok(parsed) = parse_expr(clause) else {
            continue;
        };
        if parsed.alias_name() == Some(column) {
            return None;
        }
        let target = match &parsed {
            Expr::Column { .. } => Some(parsed.clone()),
            _ => {
                let matching: Vec<&Expr> = parsed
                    .find_all(|e| matches!(e, Expr::Column { .. }))
                    .into_iter()
                    .filter(|e| e.name().is_some_and(|n| n.contains(column)))
                    .collect();
                match matching.as_slice() {
                    [single] => Some((*single).clone()),
                    _ => None,
                }
            }
        };
        let Some(target) = target else {
            continue;
        };
        let Some(name) = target.name() else {
            continue;
        };
        if let Some((model, bare)) = split_reference(name) {
            if bare == column {
                return Some(model.to_owned());
            }
        }
    }
    None
}

/// Shared error for an identifier that is neither a qualified reference
/// nor a metric.
pub(crate) fn unqualified_reference_error(name: &str, clause: &str) -> CompileError {
    CompileError::ManifestViolation(format!(
        "identifier '{name}' in the {clause} clause must be a 'model__column' reference \
         or a metric defined in the semantic manifest"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::model::*;
    use crate::manifest::Manifest;

    fn manifest() -> Manifest {
        Manifest {
            semantic_models: vec![SemanticModel {
                name: "orders".into(),
                description: None,
                node_relation: NodeRelation::default(),
                primary_entity: None,
                entities: vec![],
                dimensions: vec![Dimension {
                    name: "region".into(),
                    data_type: DataType::Varchar,
                    expr: None,
                    description: None,
                    label: None,
                }],
                measures: vec![Measure {
                    name: "amount".into(),
                    data_type: Some(DataType::Decimal),
                    agg: Some("sum".into()),
                    expr: None,
                    description: None,
                    label: None,
                }],
                label: None,
            }],
            metrics: vec![
                Metric {
                    name: "total_amount".into(),
                    metric_type: MetricType::Simple,
                    data_type: None,
                    description: None,
                    label: None,
                    expr: Some("SUM(orders__amount)".into()),
                    type_params: None,
                },
                Metric {
                    name: "ratio".into(),
                    metric_type: MetricType::Ratio,
                    data_type: None,
                    description: None,
                    label: None,
                    expr: Some("total_amount / total_amount".into()),
                    type_params: None,
                },
            ],
            project_configuration: ProjectConfiguration::default(),
        }
    }

    #[test]
    fn test_is_metric_in_expr() {
        let m = manifest();
        assert!(is_metric_in_expr(&parse_expr("total_amount").unwrap(), &m));
        assert!(!is_metric_in_expr(&parse_expr("orders__amount").unwrap(), &m));
    }

    #[test]
    fn test_derived_metric_detection() {
        let m = manifest();
        assert!(derived_metric_in_expr(&parse_expr("ratio").unwrap(), &m));
        assert!(!derived_metric_in_expr(&parse_expr("total_amount").unwrap(), &m));
    }

    #[test]
    fn test_find_model_of_column() {
        let smq = Smq {
            metrics: vec!["SUM(orders__amount)".into()],
            group_by: vec!["orders__region".into()],
            ..Smq::default()
        };
        assert_eq!(find_model_of_column("region", &smq).as_deref(), Some("orders"));
        assert_eq!(find_model_of_column("absent", &smq), None);
    }
}
