//! Metrics clause: reference lowering and derived-metric expansion.

use crate::config::CompileConfig;
use crate::error::{CompileError, CompileResult};
use crate::manifest::model::Metric;
use crate::manifest::Manifest;
use crate::sql::expr::{col, Expr};
use crate::sql::ident::Ident;
use crate::sql::lower::parse_expr;

use super::{
    derived_metric_in_expr, is_metric_in_expr, projection_node, referenced_names,
    rename_reference, resolve_measure_first, split_reference, unqualified_reference_error,
};
use crate::smq::{LayerId, QueryIr};

pub(super) fn parse_metrics(
    ir: &mut QueryIr,
    values: &[&str],
    manifest: &Manifest,
    config: &CompileConfig,
) -> CompileResult<()> {
    for value in values {
        parse_single_value(ir, value, manifest, config)?;
    }
    Ok(())
}

fn parse_single_value(
    ir: &mut QueryIr,
    value: &str,
    manifest: &Manifest,
    config: &CompileConfig,
) -> CompileResult<()> {
    let mut parsed = parse_expr(value)?;
    let mut alias_text: Option<String> = None;
    if let Expr::Alias { expr, alias } = parsed {
        alias_text = Some(alias.text);
        parsed = *expr;
    }

    expand_derived_metrics(&mut parsed, &mut alias_text, manifest, config)?;

    // An expression rather than a single reference.
    if !parsed.is_column_or_literal() {
        if is_metric_in_expr(&parsed, manifest) {
            return parse_metric_expression(ir, parsed, alias_text, manifest, config);
        }
        return parse_dimension_expression(ir, parsed, alias_text);
    }

    // A single reference: qualified dimension/measure, or a bare metric.
    let name = parsed
        .name()
        .map(str::to_owned)
        .ok_or_else(|| {
            CompileError::InputValidation(format!(
                "metric entry '{value}' is not a dimension, metric, or expression over them"
            ))
        })?;

    if let Some((model, column)) = split_reference(&name) {
        let resolved = resolve_measure_first(manifest, model, column).ok_or_else(|| {
            CompileError::ManifestViolation(format!(
                "measure/dimension not found: model '{model}', column '{column}' \
                 (while parsing metrics entry '{value}')"
            ))
        })?;
        let node = projection_node(&resolved, column)?;
        ir.body_mut(&LayerId::projection(model)).append_metric(node);
        return Ok(());
    }

    let metric = manifest.metric(&name).ok_or_else(|| {
        CompileError::ManifestViolation(format!(
            "metric '{name}' is not defined in the semantic manifest"
        ))
    })?;
    expand_metric(ir, metric, manifest, config, &mut Vec::new())
}

/// Unpack derived metrics in place, round by round, until only simple
/// metric and measure references remain. Depth and revisits are bounded;
/// both failures carry the reference path walked so far.
fn expand_derived_metrics(
    parsed: &mut Expr,
    alias_text: &mut Option<String>,
    manifest: &Manifest,
    config: &CompileConfig,
) -> CompileResult<()> {
    let mut path: Vec<String> = Vec::new();
    let mut rounds = 0usize;

    while derived_metric_in_expr(parsed, manifest) {
        rounds += 1;
        if rounds > config.max_expansion_depth {
            return Err(CompileError::expansion_limit(&path));
        }

        // Names to replace this round: metrics whose expression itself
        // references metrics.
        let mut replacements: Vec<(String, Expr)> = Vec::new();
        for name in referenced_names(parsed) {
            let Some(metric) = manifest.metric(&name) else {
                continue;
            };
            let text = metric.expression().ok_or_else(|| {
                CompileError::ManifestViolation(format!(
                    "metric '{name}' has no expr; check the semantic model"
                ))
            })?;
            let inner = parse_expr(text)?;
            if !is_metric_in_expr(&inner, manifest) {
                continue;
            }
            if path.iter().any(|p| p == &name) {
                let mut cycle = path.clone();
                cycle.push(name);
                return Err(CompileError::ExpansionLimit { path: cycle });
            }
            replacements.push((name, inner));
        }

        if replacements.is_empty() {
            break;
        }
        if alias_text.is_none() {
            *alias_text = Some(parsed.sql_text());
        }
        for (name, _) in &replacements {
            path.push(name.clone());
        }

        let owned = std::mem::replace(parsed, Expr::Star);
        *parsed = owned.transform(&mut |e| {
            if let Expr::Column { name, .. } = &e {
                if let Some((_, replacement)) =
                    replacements.iter().find(|(n, _)| n == &name.text)
                {
                    return replacement.clone();
                }
            }
            e
        });
    }
    Ok(())
}

/// An expression mixing metric references (and possibly qualified
/// measure/dimension references): lower the qualified names into their
/// projection layers, expand the metrics, and park the whole expression
/// in the derivation layer.
fn parse_metric_expression(
    ir: &mut QueryIr,
    mut parsed: Expr,
    alias_text: Option<String>,
    manifest: &Manifest,
    config: &CompileConfig,
) -> CompileResult<()> {
    let mut metric_names: Vec<String> = Vec::new();
    for name in referenced_names(&parsed) {
        if manifest.metric(&name).is_some() {
            if !metric_names.contains(&name) {
                metric_names.push(name);
            }
            continue;
        }
        let (model, column) = split_reference(&name)
            .ok_or_else(|| unqualified_reference_error(&name, "metrics"))?;
        let resolved = resolve_measure_first(manifest, model, column).ok_or_else(|| {
            CompileError::ManifestViolation(format!(
                "measure/dimension not found: model '{model}', column '{column}' \
                 (while lowering identifier '{name}' in a metric expression)"
            ))
        })?;
        let node = projection_node(&resolved, column)?;
        ir.body_mut(&LayerId::projection(model)).append_metric(node);
        rename_reference(&mut parsed, &name, column);
    }

    for name in metric_names {
        let metric = manifest
            .metric(&name)
            .expect("collected from manifest above");
        expand_metric(ir, metric, manifest, config, &mut Vec::new())?;
    }

    let node = match alias_text {
        Some(alias) => Expr::Alias {
            expr: Box::new(parsed),
            alias: Ident::new(alias),
        },
        None => parsed,
    };
    ir.body_mut(&LayerId::Deriv).append_metric(node);
    Ok(())
}

/// A pure dimension expression. Single-model expressions live in that
/// model's projection layer (or agg when they aggregate); multi-model
/// expressions spread their columns over the projection layers and the
/// combined expression over agg and deriv.
fn parse_dimension_expression(
    ir: &mut QueryIr,
    mut parsed: Expr,
    alias_text: Option<String>,
) -> CompileResult<()> {
    let mut models: Vec<String> = Vec::new();
    let mut columns: Vec<(String, String)> = Vec::new();
    for name in referenced_names(&parsed) {
        if let Some((model, column)) = split_reference(&name) {
            if !models.iter().any(|m| m == model) {
                models.push(model.to_owned());
            }
            columns.push((model.to_owned(), column.to_owned()));
            rename_reference(&mut parsed, &name, column);
        }
    }

    let aliased = |parsed: Expr| match &alias_text {
        Some(alias) => Expr::Alias {
            expr: Box::new(parsed),
            alias: Ident::new(alias.clone()),
        },
        None => parsed,
    };

    if models.len() == 1 {
        let model = models.remove(0);
        let node = aliased(parsed);
        if node.contains_aggregate() {
            ir.body_mut(&LayerId::Agg).append_metric(node);
        } else {
            ir.body_mut(&LayerId::projection(&model)).append_metric(node);
        }
        return Ok(());
    }

    for (model, column) in &columns {
        ir.body_mut(&LayerId::projection(model))
            .append_metric(col(column));
    }
    let node = aliased(parsed);
    ir.body_mut(&LayerId::Agg).append_metric(node.clone());
    ir.body_mut(&LayerId::Deriv).append_metric(node);
    Ok(())
}

/// Expand one named metric: surface its measures into projection layers,
/// recurse into nested metrics, and expose the expression in the agg
/// layer under the metric's name.
pub(crate) fn expand_metric(
    ir: &mut QueryIr,
    metric: &Metric,
    manifest: &Manifest,
    config: &CompileConfig,
    path: &mut Vec<String>,
) -> CompileResult<()> {
    if path.iter().any(|p| p == &metric.name) {
        let mut cycle = path.clone();
        cycle.push(metric.name.clone());
        return Err(CompileError::ExpansionLimit { path: cycle });
    }
    if path.len() >= config.max_expansion_depth {
        let mut cycle = path.clone();
        cycle.push(metric.name.clone());
        return Err(CompileError::ExpansionLimit { path: cycle });
    }
    path.push(metric.name.clone());

    let text = metric.expression().ok_or_else(|| {
        CompileError::ManifestViolation(format!(
            "metric '{}' has no expr; check the semantic model",
            metric.name
        ))
    })?;
    let mut parsed = parse_expr(text)?;

    let mut nested: Vec<String> = Vec::new();
    for name in referenced_names(&parsed) {
        if manifest.metric(&name).is_some() {
            // Nested metric references keep their name here; the agg layer
            // will expose them under their own aliases.
            if !nested.contains(&name) {
                nested.push(name);
            }
            continue;
        }
        let (model, column) = split_reference(&name).ok_or_else(|| {
            CompileError::ManifestViolation(format!(
                "identifier '{name}' in the expr of metric '{}' must be a 'model__column' \
                 reference or a metric defined in the semantic manifest",
                metric.name
            ))
        })?;
        let resolved = resolve_measure_first(manifest, model, column).ok_or_else(|| {
            CompileError::ManifestViolation(format!(
                "column '{column}' used in the expr of metric '{}' was not found in the \
                 semantic manifest",
                metric.name
            ))
        })?;
        let node = projection_node(&resolved, column)?;
        ir.body_mut(&LayerId::projection(model)).append_metric(node);
        rename_reference(&mut parsed, &name, column);
    }

    for name in nested {
        let nested_metric = manifest
            .metric(&name)
            .expect("collected from manifest above");
        expand_metric(ir, nested_metric, manifest, config, &mut path.clone())?;
    }

    ir.body_mut(&LayerId::Agg).append_metric(Expr::Alias {
        expr: Box::new(parsed),
        alias: Ident::new(metric.name.clone()),
    });
    Ok(())
}
