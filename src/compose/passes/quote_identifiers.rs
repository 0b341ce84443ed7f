//! Pass 12: for the backtick dialect every identifier is marked quoted,
//! and identifiers reaching the final select have their reserved special
//! characters rewritten to underscore.

use crate::smq::QueryIr;
use crate::sql::expr::Expr;
use crate::sql::query::TableFactor;

fn mark_quoted(expr: &mut Expr) {
    expr.walk_mut(&mut |e| match e {
        Expr::Column { table, name } => {
            if let Some(table) = table {
                table.quoted = true;
            }
            name.quoted = true;
        }
        Expr::Identifier(ident) => ident.quoted = true,
        Expr::Alias { alias, .. } => alias.quoted = true,
        _ => {}
    });
}

fn rewrite_special_chars(expr: &mut Expr) {
    expr.walk_mut(&mut |e| match e {
        Expr::Column { table, name } => {
            if let Some(table) = table {
                table.rewrite_special_chars();
            }
            name.rewrite_special_chars();
        }
        Expr::Identifier(ident) => ident.rewrite_special_chars(),
        Expr::Alias { alias, .. } => alias.rewrite_special_chars(),
        _ => {}
    });
}

pub fn run(ir: &mut QueryIr) {
    let uppermost = ir.uppermost();

    for (id, body) in ir.layers_mut() {
        let is_uppermost = *id == uppermost;
        let mut apply = |expr: &mut Expr| {
            mark_quoted(expr);
            if is_uppermost {
                rewrite_special_chars(expr);
            }
        };
        for node in &mut body.metrics {
            apply(node);
        }
        for node in &mut body.filters {
            apply(node);
        }
        for node in &mut body.groups {
            apply(node);
        }
        for order in &mut body.orders {
            apply(&mut order.expr);
        }
        if let Some(spine) = &mut body.join {
            if let TableFactor::Table(table) = &mut spine.from {
                table.name.quoted = true;
            }
            for join in &mut spine.joins {
                if let TableFactor::Table(table) = &mut join.relation {
                    table.name.quoted = true;
                }
                if let Some(on) = &mut join.on {
                    mark_quoted(on);
                }
            }
        }
    }
}
