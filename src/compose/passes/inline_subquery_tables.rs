//! Pass 6: subqueries inside predicates reference semantic models by
//! name; their FROM clauses are replaced by the physical table from the
//! manifest, and model prefixes matching that FROM are stripped from the
//! subquery's columns.

use crate::error::{CompileError, CompileResult};
use crate::manifest::Manifest;
use crate::sql::dialect::Dialect;
use crate::sql::expr::Expr;
use crate::sql::ident::Ident;
use crate::sql::query::{Select, TableFactor, TableRef};
use crate::smq::QueryIr;

pub fn run(ir: &mut QueryIr, manifest: &Manifest, dialect: Dialect) -> CompileResult<()> {
    let mut result: CompileResult<()> = Ok(());
    for (_, body) in ir.layers_mut() {
        let mut visit = |expr: &mut Expr| {
            expr.walk_mut(&mut |e| {
                let select = match e {
                    Expr::Subquery(select) => select,
                    Expr::InSubquery { subquery, .. } => subquery,
                    _ => return,
                };
                if result.is_ok() {
                    result = rewrite_subquery(select, manifest, dialect);
                }
            });
        };
        for node in &mut body.metrics {
            visit(node);
        }
        for node in &mut body.filters {
            visit(node);
        }
        for order in &mut body.orders {
            visit(&mut order.expr);
        }
    }
    result
}

fn rewrite_subquery(
    select: &mut Select,
    manifest: &Manifest,
    dialect: Dialect,
) -> CompileResult<()> {
    let Some(TableFactor::Table(table)) = &select.from else {
        return Ok(());
    };
    let from_name = table.name.text.clone();
    if from_name == "agg" || from_name == "deriv" {
        return Ok(());
    }

    // Strip the `FROM_MODEL__` prefix from the subquery's own columns.
    let prefix = format!("{from_name}__");
    select.walk_exprs_mut(&mut |expr| {
        expr.walk_mut(&mut |e| {
            if let Expr::Column { name, table } = e {
                if let Some(bare) = name.text.strip_prefix(&prefix) {
                    *name = Ident::new(bare);
                    *table = None;
                }
            }
        });
    });

    select.from = Some(TableFactor::Table(physical_table(
        &from_name, manifest, dialect,
    )?));

    // Nested subqueries get the same treatment.
    let mut nested: CompileResult<()> = Ok(());
    select.walk_exprs_mut(&mut |expr| {
        expr.walk_mut(&mut |e| {
            let inner = match e {
                Expr::Subquery(select) => select,
                Expr::InSubquery { subquery, .. } => subquery,
                _ => return,
            };
            if nested.is_ok() {
                nested = rewrite_subquery(inner, manifest, dialect);
            }
        });
    });
    nested
}

/// The manifest's physical relation for a semantic model, quoted for the
/// backtick dialect.
pub fn physical_table(
    model_name: &str,
    manifest: &Manifest,
    dialect: Dialect,
) -> CompileResult<TableRef> {
    let model = manifest.model(model_name).ok_or_else(|| {
        CompileError::ManifestViolation(format!(
            "model '{model_name}' has no node_relation; check the semantic model"
        ))
    })?;
    let relation = &model.node_relation;
    let alias = relation.alias.as_deref().ok_or_else(|| {
        CompileError::ManifestViolation(format!(
            "model '{model_name}' has no node_relation; check the semantic model"
        ))
    })?;

    let quoted = dialect.requires_quoted_identifiers();
    let make = |text: &str| {
        if quoted {
            Ident::quoted(text)
        } else {
            Ident::new(text)
        }
    };

    let mut table = TableRef {
        catalog: None,
        schema: None,
        name: make(alias),
        alias: None,
    };
    if relation.schema_name.is_some() || relation.database.is_some() {
        table.schema = relation.schema_name.as_deref().map(make);
        table.catalog = relation.database.as_deref().map(make);
    }
    Ok(table)
}
