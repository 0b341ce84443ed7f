//! Pass 8: select/group parity in the agg layer. Every non-aggregate
//! select expression must appear in GROUP BY; completion is one-way,
//! groups the user wrote are never removed.

use crate::smq::{LayerId, QueryIr};
use crate::sql::expr::Expr;

pub fn run(ir: &mut QueryIr) {
    if !ir.contains(&LayerId::Agg) {
        return;
    }
    let body = ir.body_mut(&LayerId::Agg);
    let metrics = body.metrics.clone();
    let group_names: Vec<String> = body
        .groups
        .iter()
        .filter_map(Expr::name)
        .map(str::to_owned)
        .collect();

    for metric in metrics {
        if metric.contains_aggregate() || metric.contains_window() {
            continue;
        }
        if let Some(name) = metric.name() {
            if group_names.iter().any(|g| g == name) {
                continue;
            }
        }
        let node = match &metric {
            Expr::Alias { expr, .. } => (**expr).clone(),
            other => other.clone(),
        };
        body.append_group(node);
    }
}
