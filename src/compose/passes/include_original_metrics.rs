//! Pass 4: every metric the user listed must surface in the uppermost
//! layer's select list, with model prefixes stripped.

use crate::error::CompileResult;
use crate::smq::{QueryIr, Smq};
use crate::sql::expr::{col, Expr};
use crate::sql::lower::parse_expr;

use crate::smq::parse::{referenced_names, rename_reference, split_reference};

pub fn run(ir: &mut QueryIr, smq: &Smq) -> CompileResult<()> {
    let uppermost = ir.uppermost();
    let existing: Vec<String> = {
        let body = ir.body_mut(&uppermost);
        let mut names: Vec<String> = body.metrics.iter().map(Expr::sql_text).collect();
        names.extend(
            body.metrics
                .iter()
                .filter_map(Expr::alias_name)
                .map(str::to_owned),
        );
        names
    };

    for metric in smq.metrics() {
        if existing.iter().any(|e| e == metric) {
            continue;
        }
        let mut parsed = parse_expr(metric)?;

        let node = if !parsed.is_column_or_literal() {
            // An expression: strip model prefixes from its references.
            for name in referenced_names(&parsed) {
                if let Some((_, column)) = split_reference(&name) {
                    rename_reference(&mut parsed, &name, column);
                }
            }
            parsed
        } else if let Some((_, column)) = metric.split_once("__") {
            col(column)
        } else {
            parsed
        };
        ir.body_mut(&uppermost).append_metric(node);
    }
    Ok(())
}
