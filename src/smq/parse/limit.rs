//! Limit clause.

use crate::error::{CompileError, CompileResult};
use crate::smq::{LayerId, QueryIr};

pub(super) fn parse_limit(ir: &mut QueryIr, value: i64) -> CompileResult<()> {
    if value < 0 {
        return Err(CompileError::InputValidation(format!(
            "limit must be a non-negative integer, got {value}"
        )));
    }
    ir.body_mut(&LayerId::Deriv).limit = Some(value as u64);
    Ok(())
}
