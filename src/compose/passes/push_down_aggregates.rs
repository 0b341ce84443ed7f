//! Pass 2: aggregates found in the derivation layer move down into the
//! agg layer under a synthesized alias; the deriv node keeps a plain
//! column reference to that alias. Aggregates already inside a window
//! stay where they are.

use crate::error::{CompileError, CompileResult};
use crate::manifest::Manifest;
use crate::smq::{LayerId, QueryIr, Smq};
use crate::sql::expr::{col, Expr};
use crate::sql::ident::Ident;
use crate::sql::lower::parse_expr;

use crate::smq::parse::{
    find_model_of_column, referenced_names, rename_reference, resolve_measure_first,
};

/// Aggregate display names for synthesized aliases.
fn agg_display_name(func: &str) -> &'static str {
    match func.to_ascii_lowercase().as_str() {
        "sum" => "합계",
        "count" => "개수",
        "avg" => "평균",
        "max" => "최대",
        "min" => "최소",
        _ => "기타",
    }
}

pub fn run(ir: &mut QueryIr, smq: &Smq, manifest: &Manifest) -> CompileResult<()> {
    if !ir.contains(&LayerId::Deriv) {
        return Ok(());
    }

    let deriv = ir.body(&LayerId::Deriv).expect("checked above");
    let metrics = deriv.metrics.clone();
    let orders = deriv.orders.clone();

    let mut pushed: Vec<(String, Expr)> = Vec::new();
    let mut new_metrics = Vec::with_capacity(metrics.len());
    for node in metrics {
        new_metrics.push(push_down(node, smq, manifest, &mut pushed)?);
    }
    let mut new_orders = Vec::with_capacity(orders.len());
    for mut order in orders {
        order.expr = push_down(order.expr, smq, manifest, &mut pushed)?;
        new_orders.push(order);
    }

    let deriv = ir.body_mut(&LayerId::Deriv);
    deriv.metrics = new_metrics;
    deriv.orders = new_orders;

    let agg = ir.body_mut(&LayerId::Agg);
    for (alias_name, aggregate) in pushed {
        agg.append_metric(Expr::Alias {
            expr: Box::new(aggregate),
            alias: Ident::new(alias_name),
        });
    }
    Ok(())
}

/// Replace every non-windowed aggregate in the tree with a reference to a
/// synthesized agg-layer alias, collecting the pushed-down aggregates.
fn push_down(
    node: Expr,
    smq: &Smq,
    manifest: &Manifest,
    pushed: &mut Vec<(String, Expr)>,
) -> CompileResult<Expr> {
    let mut error: Option<CompileError> = None;
    let rebuilt = node.transform_pruned(
        &|e| matches!(e, Expr::WindowFunction { .. }),
        &mut |e| {
            if error.is_some() || !e.is_aggregate_function() {
                return e;
            }
            // Every column the aggregate touches must trace back to a
            // metric or a manifest column before the move is legal.
            for name in referenced_names(&e) {
                if manifest.metric(&name).is_some() {
                    continue;
                }
                let model = find_model_of_column(&name, smq);
                let resolved = model
                    .as_deref()
                    .and_then(|m| resolve_measure_first(manifest, m, &name));
                if resolved.is_none() {
                    error = Some(CompileError::ManifestViolation(format!(
                        "metric/measure/dimension not found for column '{name}' while \
                         pushing an aggregate down from the derivation layer"
                    )));
                    return e;
                }
            }
            let alias_name = synthesized_alias(&e);
            let lowered = lower_aggregate(e, manifest);
            pushed.push((alias_name.clone(), lowered));
            col(&alias_name)
        },
    );
    match error {
        Some(err) => Err(err),
        None => Ok(rebuilt),
    }
}

/// `<col>_<col>_..._<agg name>` over the columns inside the aggregate.
fn synthesized_alias(aggregate: &Expr) -> String {
    let Expr::Function { name, .. } = aggregate else {
        return String::new();
    };
    let mut alias = String::new();
    for column in referenced_names(aggregate) {
        alias.push_str(&column);
        alias.push('_');
    }
    alias.push_str(agg_display_name(name));
    alias
}

/// Inline metric expressions inside the pushed-down aggregate: a metric
/// reference becomes its expression with model prefixes stripped.
fn lower_aggregate(aggregate: Expr, manifest: &Manifest) -> Expr {
    aggregate.transform(&mut |e| {
        let Expr::Column { name, .. } = &e else {
            return e;
        };
        let Some(metric) = manifest.metric(&name.text) else {
            return e;
        };
        let Some(text) = metric.expression() else {
            return e;
        };
        let Ok(mut inner) = parse_expr(text) else {
            return e;
        };
        for inner_name in referenced_names(&inner) {
            if let Some((_, bare)) = inner_name.split_once("__") {
                rename_reference(&mut inner, &inner_name, bare);
            }
        }
        inner
    })
}
