//! Pass 9: every column the agg layer references must be present in its
//! projection layer. Metric references recurse into their expansions;
//! plain columns are traced back to their model through the original SMQ
//! text.

use crate::error::{CompileError, CompileResult};
use crate::manifest::Manifest;
use crate::smq::{LayerId, QueryIr, Smq};
use crate::sql::expr::{col, Expr};
use crate::sql::ident::Ident;
use crate::sql::lower::parse_expr;

use crate::smq::parse::{
    find_model_of_column, referenced_names, resolve_dimension_first, resolve_measure_first,
    split_reference,
};

pub fn run(ir: &mut QueryIr, smq: &Smq, manifest: &Manifest) -> CompileResult<()> {
    if !ir.contains(&LayerId::Agg) {
        return Ok(());
    }

    let body = ir.body(&LayerId::Agg).expect("checked above");
    let mut worklist: Vec<String> = Vec::new();
    let mut enqueue = |list: &mut Vec<String>, name: &str| {
        if !list.iter().any(|n| n == name) {
            list.push(name.to_owned());
        }
    };
    {
        let mut collect = |expr: &Expr| {
            expr.walk(&mut |e| {
                if let Expr::Column { name, .. } = e {
                    enqueue(&mut worklist, &name.text);
                }
            });
        };
        for node in &body.metrics {
            collect(node);
        }
        for node in &body.groups {
            collect(node);
        }
        for node in &body.filters {
            collect(node);
        }
        for order in &body.orders {
            collect(&order.expr);
        }
        if let Some(spine) = &body.join {
            for column in spine.on_columns() {
                collect(column);
            }
        }
    }

    let mut idx = 0;
    while idx < worklist.len() {
        let name = worklist[idx].clone();
        idx += 1;

        if let Some(metric) = manifest.metric(&name) {
            let Some(text) = metric.expression() else {
                continue;
            };
            let parsed = parse_expr(text)?;
            for reference in referenced_names(&parsed) {
                if manifest.metric(&reference).is_some() {
                    enqueue(&mut worklist, &reference);
                    continue;
                }
                let Some((model, column)) = split_reference(&reference) else {
                    continue;
                };
                if projection_exposes(ir, model, column) {
                    continue;
                }
                let node = match resolve_measure_first(manifest, model, column) {
                    Some(resolved) => projection_node_checked(&resolved, column)?,
                    None => col(column),
                };
                ir.body_mut(&LayerId::projection(model)).append_metric(node);
            }
            continue;
        }

        // A plain column: recover its model from the qualified references
        // the user wrote. Columns synthesized purely inside the pipeline
        // were placed by the passes that created them.
        let Some(model) = find_model_of_column(&name, smq) else {
            continue;
        };
        if projection_exposes(ir, &model, &name) {
            continue;
        }
        let resolved = resolve_dimension_first(manifest, &model, &name).ok_or_else(|| {
            CompileError::ManifestViolation(format!(
                "column '{name}' referenced by the agg layer was not found in the \
                 semantic manifest"
            ))
        })?;
        let node = projection_node_checked(&resolved, &name)?;
        ir.body_mut(&LayerId::projection(&model)).append_metric(node);
    }
    Ok(())
}

fn projection_exposes(ir: &QueryIr, model: &str, column: &str) -> bool {
    ir.body(&LayerId::projection(model))
        .map(|body| body.exposed_names().iter().any(|n| *n == column))
        .unwrap_or(false)
}

fn projection_node_checked(
    resolved: &crate::smq::parse::ResolvedColumn<'_>,
    column: &str,
) -> CompileResult<Expr> {
    match resolved.expr() {
        Some(text) => {
            let parsed = parse_expr(text)?;
            if parsed.sql_text() == column {
                Ok(col(column))
            } else {
                Ok(Expr::Alias {
                    expr: Box::new(parsed),
                    alias: Ident::new(column),
                })
            }
        }
        None => Ok(col(column)),
    }
}
