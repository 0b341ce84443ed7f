//! User-supplied joins clause.
//!
//! Every column named by an ON condition must be visible in its
//! projection layer, so each one is surfaced there while the spine itself
//! is attached to the agg layer.

use crate::error::CompileResult;
use crate::manifest::Manifest;
use crate::sql::expr::{col, Expr};
use crate::sql::ident::Ident;
use crate::sql::lower::{parse_expr, parse_join_clause};

use super::{resolve_measure_first, split_reference};
use crate::smq::{LayerId, QueryIr};

pub(super) fn parse_joins(
    ir: &mut QueryIr,
    values: &[&str],
    manifest: &Manifest,
) -> CompileResult<()> {
    // Arity was validated with the SMQ; nothing to do without a clause.
    let Some(value) = values.first() else {
        return Ok(());
    };
    let mut spine = parse_join_clause(value)?;

    // Normalize MODEL__COLUMN references in the ON clauses to table.column.
    for join in &mut spine.joins {
        if let Some(on) = &mut join.on {
            on.walk_mut(&mut |e| {
                if let Expr::Column { table, name } = e {
                    if let Some((model, column)) = split_reference(&name.text.clone()) {
                        *table = Some(Ident::new(model));
                        *name = Ident::new(column);
                    }
                }
            });
        }
    }

    // Surface every ON column into its projection layer.
    let mut required: Vec<(String, String)> = Vec::new();
    for column in spine.on_columns() {
        if let Expr::Column {
            table: Some(table),
            name,
        } = column
        {
            required.push((table.text.clone(), name.text.clone()));
        }
    }
    for (model, column) in required {
        let node = match resolve_measure_first(manifest, &model, &column) {
            Some(resolved) => match resolved.expr() {
                Some(text) => {
                    let parsed = parse_expr(text)?;
                    if parsed.sql_text() == column {
                        col(&column)
                    } else {
                        Expr::Alias {
                            expr: Box::new(parsed),
                            alias: Ident::new(column),
                        }
                    }
                }
                None => col(&column),
            },
            None => col(&column),
        };
        ir.body_mut(&LayerId::projection(&model)).append_metric(node);
    }

    ir.body_mut(&LayerId::Agg).join = Some(spine);
    Ok(())
}
