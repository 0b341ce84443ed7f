//! Pass 7: every column the derivation layer references must be exposed
//! by the agg layer, either as a direct column or as the alias of a
//! metric expression. Missing metrics are expanded into agg (and their
//! measures into the projection layers) on the spot.

use crate::error::{CompileError, CompileResult};
use crate::manifest::Manifest;
use crate::smq::{LayerId, QueryIr};
use crate::sql::expr::{col, Expr};
use crate::sql::ident::Ident;
use crate::sql::lower::parse_expr;

use crate::smq::parse::{
    projection_node, referenced_names, rename_reference, resolve_measure_first, split_reference,
};

pub fn run(ir: &mut QueryIr, manifest: &Manifest) -> CompileResult<()> {
    if !ir.contains(&LayerId::Deriv) {
        return Ok(());
    }

    let deriv = ir.body(&LayerId::Deriv).expect("checked above");
    let mut columns: Vec<Expr> = Vec::new();
    let mut push_columns = |expr: &Expr| {
        expr.walk(&mut |e| {
            if let Expr::Column { .. } = e {
                let name = e.name().expect("columns have names");
                if !columns
                    .iter()
                    .any(|c| c.name().is_some_and(|n| n == name))
                {
                    columns.push(e.clone());
                }
            }
        });
    };
    for node in &deriv.metrics {
        push_columns(node);
    }
    for node in &deriv.filters {
        push_columns(node);
    }
    for node in &deriv.groups {
        push_columns(node);
    }
    for order in &deriv.orders {
        push_columns(&order.expr);
    }

    let deriv_aliases: Vec<String> = deriv
        .metrics
        .iter()
        .filter_map(Expr::alias_name)
        .map(str::to_owned)
        .collect();

    for column in columns {
        let name = column.name().expect("columns have names").to_owned();

        if let Some(metric) = manifest.metric(&name) {
            let agg_aliases: Vec<String> = ir
                .body(&LayerId::Agg)
                .map(|body| {
                    body.metrics
                        .iter()
                        .filter_map(Expr::alias_name)
                        .map(str::to_owned)
                        .collect()
                })
                .unwrap_or_default();
            if agg_aliases.iter().any(|a| a == &name) {
                continue;
            }
            expose_metric_in_agg(ir, metric, manifest)?;
            continue;
        }

        if deriv_aliases.iter().any(|a| a == &name) {
            continue;
        }

        // A dimension or upstream alias: make sure agg exposes it.
        let agg = ir.body_mut(&LayerId::Agg);
        if agg.exposed_names().iter().any(|n| *n == name) {
            continue;
        }
        agg.append_metric(column.clone());
    }
    Ok(())
}

/// Parse the metric's expression, surface its measures into projection
/// layers and add `expr AS name` to the agg layer.
fn expose_metric_in_agg(
    ir: &mut QueryIr,
    metric: &crate::manifest::model::Metric,
    manifest: &Manifest,
) -> CompileResult<()> {
    let text = metric.expression().ok_or_else(|| {
        CompileError::ManifestViolation(format!(
            "metric '{}' has no expr; check the semantic model",
            metric.name
        ))
    })?;
    let mut parsed = parse_expr(text)?;

    for name in referenced_names(&parsed) {
        if manifest.metric(&name).is_some() {
            // Nested metrics keep their names; the agg-prerequisite pass
            // recurses into them.
            continue;
        }
        let (model, column) = split_reference(&name).ok_or_else(|| {
            CompileError::ManifestViolation(format!(
                "identifier '{name}' in the expr of metric '{}' must be a 'model__column' \
                 reference or a metric defined in the semantic manifest",
                metric.name
            ))
        })?;
        if let Some(resolved) = resolve_measure_first(manifest, model, column) {
            let node = projection_node(&resolved, column)?;
            ir.body_mut(&LayerId::projection(model)).append_metric(node);
        } else {
            ir.body_mut(&LayerId::projection(model))
                .append_metric(col(column));
        }
        rename_reference(&mut parsed, &name, column);
    }

    ir.body_mut(&LayerId::Agg).append_metric(Expr::Alias {
        expr: Box::new(parsed),
        alias: Ident::new(metric.name.clone()),
    });
    Ok(())
}
