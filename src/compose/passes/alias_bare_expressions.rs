//! Pass 11: uppermost-layer expressions carrying arithmetic but no alias
//! get one synthesized from their serialized text, so the output column
//! name is predictable instead of positional.

use crate::smq::QueryIr;
use crate::sql::expr::Expr;
use crate::sql::ident::Ident;

pub fn run(ir: &mut QueryIr) {
    let uppermost = ir.uppermost();
    let body = ir.body_mut(&uppermost);
    for node in &mut body.metrics {
        if node.alias_name().is_some() || !node.contains_arithmetic() {
            continue;
        }
        let text = node.sql_text();
        let inner = std::mem::replace(node, Expr::Star);
        *node = Expr::Alias {
            expr: Box::new(inner),
            alias: Ident::new(text),
        };
    }
}
