//! Group-by clause: qualified references become agg-layer group columns.

use crate::error::CompileResult;
use crate::sql::expr::table_col;
use crate::sql::lower::parse_expr;

use super::split_reference;
use crate::smq::{LayerId, QueryIr};

pub(super) fn parse_groups(ir: &mut QueryIr, values: &[&str]) -> CompileResult<()> {
    for value in values {
        let parsed = parse_expr(value)?;
        let node = match parsed.name().and_then(split_reference) {
            // Keep the model qualifier; the writer resolves or strips it.
            Some((model, column)) => table_col(model, column),
            // A bare name is a metric or alias reference; keep it as-is.
            None => parsed,
        };
        ir.body_mut(&LayerId::Agg).append_group(node);
    }
    Ok(())
}
