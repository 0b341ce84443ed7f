//! Order-by clause: a leading `-` means descending; metric references are
//! expanded the same way the metrics clause expands them.

use crate::config::CompileConfig;
use crate::error::{CompileError, CompileResult};
use crate::manifest::Manifest;
use crate::sql::expr::{col, Expr, UnaryOperator};
use crate::sql::lower::parse_expr;
use crate::sql::query::OrderByExpr;

use super::{
    derived_metric_in_expr, is_metric_in_expr, projection_node, referenced_names,
    rename_reference, resolve_measure_first, split_reference,
};
use crate::smq::{LayerId, QueryIr};

pub(super) fn parse_orders(
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
    let mut desc = false;
    let mut text = value.trim();
    if let Some(stripped) = text.strip_prefix('-') {
        desc = true;
        text = stripped.trim_start();
    }

    let mut parsed = parse_expr(text)?;
    // A negated reference also parses as unary minus.
    if let Expr::UnaryOp {
        op: UnaryOperator::Minus,
        expr,
    } = parsed
    {
        desc = true;
        parsed = *expr;
    }

    // Qualified reference: order by the bare projection column.
    if let Some((_, column)) = parsed.name().and_then(split_reference) {
        let order = OrderByExpr {
            expr: col(column),
            desc,
        };
        ir.body_mut(&LayerId::Deriv).append_order(order);
        return Ok(());
    }

    // Metric reference: unpack derived metrics, surfacing the measures
    // they touch into their projection layers as we go.
    let mut expanded = false;
    let mut path: Vec<String> = Vec::new();
    let mut rounds = 0usize;
    while derived_metric_in_expr(&parsed, manifest) {
        rounds += 1;
        if rounds > config.max_expansion_depth {
            return Err(CompileError::expansion_limit(&path));
        }

        let mut replacements: Vec<(String, Expr)> = Vec::new();
        for name in referenced_names(&parsed) {
            let Some(metric) = manifest.metric(&name) else {
                continue;
            };
            let text = metric.expression().ok_or_else(|| {
                CompileError::ManifestViolation(format!(
                    "metric '{name}' has no expr; check the semantic model"
                ))
            })?;
            let mut inner = parse_expr(text)?;

            for inner_name in referenced_names(&inner) {
                if manifest.metric(&inner_name).is_some() {
                    continue;
                }
                let Some((model, column)) = split_reference(&inner_name) else {
                    continue;
                };
                let resolved =
                    resolve_measure_first(manifest, model, column).ok_or_else(|| {
                        CompileError::ManifestViolation(format!(
                            "measure/dimension not found: model '{model}', column '{column}' \
                             (while expanding metric '{name}' in the order_by clause)"
                        ))
                    })?;
                let node = projection_node(&resolved, column)?;
                ir.body_mut(&LayerId::projection(model)).append_metric(node);
                rename_reference(&mut inner, &inner_name, column);
            }

            if is_metric_in_expr(&inner, manifest) {
                if path.iter().any(|p| p == &name) {
                    let mut cycle = path.clone();
                    cycle.push(name);
                    return Err(CompileError::ExpansionLimit { path: cycle });
                }
                replacements.push((name, inner));
            }
        }

        if replacements.is_empty() {
            break;
        }
        expanded = true;
        for (name, _) in &replacements {
            path.push(name.clone());
        }
        let owned = std::mem::replace(&mut parsed, Expr::Star);
        parsed = owned.transform(&mut |e| {
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

    let order = if expanded {
        OrderByExpr { expr: parsed, desc }
    } else {
        // A plain metric orders by its agg-layer alias.
        let column = parsed
            .name()
            .map(str::to_owned)
            .unwrap_or_else(|| parsed.sql_text());
        OrderByExpr {
            expr: col(&column),
            desc,
        }
    };
    ir.body_mut(&LayerId::Deriv).append_order(order);
    Ok(())
}
