//! Pass 10: with two or more projection layers and no user-supplied
//! joins, the planner synthesizes the LEFT-JOIN spine and every ON-clause
//! column is surfaced in its projection layer.

use crate::error::CompileResult;
use crate::join::plan_join;
use crate::manifest::Manifest;
use crate::smq::{LayerId, QueryIr, Smq};
use crate::sql::expr::{col, Expr};

pub fn run(ir: &mut QueryIr, smq: &Smq, manifest: &Manifest) -> CompileResult<()> {
    if !smq.joins().is_empty() {
        return Ok(());
    }
    let models = ir.projection_names();
    if models.len() < 2 {
        return Ok(());
    }

    let spine = plan_join(manifest, &models)?;

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
        let body = ir.body_mut(&LayerId::projection(&model));
        if body.exposed_names().iter().any(|n| *n == column) {
            continue;
        }
        body.append_metric(col(&column));
    }

    ir.body_mut(&LayerId::Agg).join = Some(spine);
    Ok(())
}
