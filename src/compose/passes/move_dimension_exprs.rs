//! Pass 1: when a derivation layer exists, aggregate-shaped entries that
//! correspond to aliased user metrics migrate from agg to deriv, keeping
//! their aliases referenceable from above.

use crate::smq::{LayerId, QueryIr, Smq};
use crate::sql::expr::Expr;
use crate::sql::lower::parse_expr;

pub fn run(ir: &mut QueryIr, smq: &Smq) {
    if !ir.contains(&LayerId::Deriv) || !ir.contains(&LayerId::Agg) {
        return;
    }

    let originals: Vec<Expr> = smq
        .metrics()
        .iter()
        .filter_map(|m| parse_expr(m).ok())
        .collect();

    let mut moved: Vec<Expr> = Vec::new();
    let agg = ir.body_mut(&LayerId::Agg);
    agg.metrics.retain(|node| {
        let migrate = node.is_aggregate_function() || is_aliased_user_aggregate(node, &originals);
        if migrate {
            moved.push(node.clone());
        }
        !migrate
    });

    let deriv = ir.body_mut(&LayerId::Deriv);
    for node in moved {
        deriv.append_metric(node);
    }
}

/// An alias over an aggregate or window whose alias and shape match one
/// of the metrics the user wrote verbatim.
fn is_aliased_user_aggregate(node: &Expr, originals: &[Expr]) -> bool {
    let Expr::Alias { expr, alias } = node else {
        return false;
    };
    if !matches!(
        **expr,
        Expr::Function { .. } | Expr::WindowFunction { .. }
    ) || !expr.contains_aggregate()
    {
        return false;
    }
    let node_column = first_column_name(expr);

    originals.iter().any(|original| {
        let Expr::Alias {
            expr: original_expr,
            alias: original_alias,
        } = original
        else {
            return false;
        };
        if original_alias.text != alias.text {
            return false;
        }
        if std::mem::discriminant(&**expr) != std::mem::discriminant(&**original_expr) {
            return false;
        }
        match (&node_column, first_column_name(original_expr)) {
            (Some(ours), Some(theirs)) => theirs.contains(ours.as_str()),
            _ => false,
        }
    })
}

fn first_column_name(expr: &Expr) -> Option<String> {
    let mut found = None;
    expr.walk(&mut |e| {
        if found.is_none() {
            if let Expr::Column { name, .. } = e {
                found = Some(name.text.clone());
            }
        }
    });
    found
}
