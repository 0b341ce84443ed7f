//! Filters clause: predicate placement and reference push-down.

use std::collections::BTreeSet;

use crate::error::{CompileError, CompileResult};
use crate::manifest::Manifest;
use crate::sql::expr::{col, Expr};
use crate::sql::lower::parse_expr;

use super::{is_metric_in_expr, resolve_dimension_first, split_reference};
use crate::smq::{LayerId, QueryIr};

pub(super) fn parse_filters(
    ir: &mut QueryIr,
    values: &[&str],
    manifest: &Manifest,
) -> CompileResult<()> {
    for value in values {
        parse_single_value(ir, value, manifest)?;
    }
    Ok(())
}

fn parse_single_value(ir: &mut QueryIr, value: &str, manifest: &Manifest) -> CompileResult<()> {
    let mut parsed = parse_expr(value)?;

    // Predicates over metrics belong to the derivation layer.
    if is_metric_in_expr(&parsed, manifest) {
        ir.body_mut(&LayerId::Deriv).append_filter(parsed);
        return Ok(());
    }

    // An unqualified subject is an alias of something computed above the
    // projection layers; keep the predicate in deriv.
    let subject_text = parsed
        .predicate_subject()
        .map(Expr::sql_text)
        .unwrap_or_else(|| parsed.sql_text());
    if !subject_text.contains("__") {
        ir.body_mut(&LayerId::Deriv).append_filter(parsed);
        return Ok(());
    }

    // Qualified references: rewrite to projection-layer columns and decide
    // placement by how many models the predicate touches. Subquery bodies
    // are left alone here; the composer rewrites their FROM clauses.
    let mut names: Vec<String> = Vec::new();
    parsed.walk_pruning_subqueries(&mut |e| {
        if let Expr::Column { name, .. } = e {
            if !names.iter().any(|n| n == &name.text) {
                names.push(name.text.clone());
            }
        }
    });

    let mut models: BTreeSet<String> = BTreeSet::new();
    for name in &names {
        let Some((model, column)) = split_reference(name) else {
            return Err(CompileError::ManifestViolation(format!(
                "filter identifier '{name}' must be a 'model__column' reference \
                 (while parsing filter '{value}')"
            )));
        };
        models.insert(model.to_owned());

        let resolved = resolve_dimension_first(manifest, model, column).ok_or_else(|| {
            if manifest.metric(column).is_some() {
                CompileError::ManifestViolation(format!(
                    "filter identifier '{name}' does not exist in the semantic manifest; \
                     note: '{column}' is a metric and must be referenced without a model \
                     prefix, e.g. '{column}' instead of '{name}'"
                ))
            } else {
                CompileError::ManifestViolation(format!(
                    "filter identifier '{name}' does not exist in the semantic manifest: \
                     model '{model}', column '{column}' (while parsing filter '{value}')"
                ))
            }
        })?;

        let replacement = match resolved.expr() {
            Some(text) => parse_expr(text)?,
            None => col(column),
        };
        parsed.walk_mut(&mut |e| {
            let matches = matches!(&e, Expr::Column { name: n, .. } if n.text == *name);
            if matches {
                *e = replacement.clone();
            }
        });
    }

    match models.len() {
        1 => {
            let model = models.into_iter().next().expect("one model");
            ir.body_mut(&LayerId::projection(model)).append_filter(parsed);
        }
        // Constant-only filters and multi-model filters belong to deriv.
        _ => ir.body_mut(&LayerId::Deriv).append_filter(parsed),
    }
    Ok(())
}
