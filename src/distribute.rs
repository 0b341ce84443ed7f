//! SMQ distribution over disjoint model sets.
//!
//! When the join planner reports disconnected components, the caller
//! splits the SMQ here: each clause entry lands in the first set covering
//! every model it references, the limit is copied everywhere, and
//! partitions that end up without metrics are dropped.

use std::collections::BTreeSet;

use crate::manifest::Manifest;
use crate::smq::Smq;
use crate::sql::lower::parse_expr;

use crate::smq::parse::{referenced_names, split_reference};

/// Partition the SMQ by model set. Returns `(models, partition)` pairs in
/// the order the sets were given.
pub fn distribute_smq(
    smq: &Smq,
    model_sets: &[Vec<String>],
    manifest: &Manifest,
) -> Vec<(Vec<String>, Smq)> {
    let mut partitions: Vec<(Vec<String>, Smq)> = model_sets
        .iter()
        .map(|set| {
            let mut sorted = set.clone();
            sorted.sort();
            (
                sorted,
                Smq {
                    limit: smq.limit,
                    ..Smq::default()
                },
            )
        })
        .collect();

    let mut assign = |item: &str, pick: &mut dyn FnMut(&mut Smq, String)| {
        let tables = extract_tables(item, manifest);
        for (models, partition) in partitions.iter_mut() {
            if tables.iter().all(|t| models.iter().any(|m| m == t)) {
                pick(partition, item.to_owned());
                return;
            }
        }
    };

    for item in smq.metrics() {
        assign(item, &mut |p, v| p.metrics.push(v));
    }
    for item in smq.group_by() {
        assign(item, &mut |p, v| p.group_by.push(v));
    }
    for item in smq.filters() {
        assign(item, &mut |p, v| p.filters.push(v));
    }
    for item in smq.order_by() {
        assign(item, &mut |p, v| p.order_by.push(v));
    }

    partitions
        .into_iter()
        .filter(|(_, partition)| !partition.metrics.is_empty())
        .collect()
}

/// Semantic models a clause entry touches: qualified references name
/// their model directly, metric references resolve through the metric's
/// expression.
fn extract_tables(item: &str, manifest: &Manifest) -> BTreeSet<String> {
    let mut tables = BTreeSet::new();
    let text = item.trim().trim_start_matches('-');
    let Ok(parsed) = parse_expr(text) else {
        return tables;
    };
    for name in referenced_names(&parsed) {
        if let Some((model, _)) = split_reference(&name) {
            tables.insert(model.to_owned());
            continue;
        }
        let Some(metric) = manifest.metric(&name) else {
            continue;
        };
        let Some(expr_text) = metric.expression() else {
            continue;
        };
        let Ok(inner) = parse_expr(expr_text) else {
            continue;
        };
        for inner_name in referenced_names(&inner) {
            if let Some((model, _)) = split_reference(&inner_name) {
                tables.insert(model.to_owned());
            }
        }
    }
    tables
}
