//! Pass 5: anonymous function nodes whose name spells a known aggregate
//! become the typed aggregate variant.

use crate::smq::QueryIr;
use crate::sql::expr::{Expr, FunctionKind};

fn canonical_aggregate(name: &str) -> Option<&'static str> {
    match name.to_uppercase().as_str() {
        "AVG" | "AVERAGE" => Some("AVG"),
        "SUM" => Some("SUM"),
        "MAX" => Some("MAX"),
        "MIN" => Some("MIN"),
        "COUNT" => Some("COUNT"),
        _ => None,
    }
}

fn resolve(expr: &mut Expr) {
    expr.walk_mut(&mut |e| {
        if let Expr::Function { name, kind, .. } = e {
            if *kind == FunctionKind::Anonymous {
                if let Some(canonical) = canonical_aggregate(name) {
                    *name = canonical.to_owned();
                    *kind = FunctionKind::Aggregate;
                }
            }
        }
    });
}

pub fn run(ir: &mut QueryIr) {
    for (_, body) in ir.layers_mut() {
        for node in &mut body.metrics {
            resolve(node);
        }
        for node in &mut body.filters {
            resolve(node);
        }
        for node in &mut body.groups {
            resolve(node);
        }
        for order in &mut body.orders {
            resolve(&mut order.expr);
        }
        if let Some(spine) = &mut body.join {
            for join in &mut spine.joins {
                if let Some(on) = &mut join.on {
                    resolve(on);
                }
            }
        }
    }
}
