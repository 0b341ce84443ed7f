//! Assembles the rewritten IR into a WITH-clause SELECT tree: one CTE per
//! projection layer, an optional agg CTE, and a final SELECT over the
//! uppermost layer.

use crate::error::CompileResult;
use crate::manifest::Manifest;
use crate::smq::{LayerBody, LayerId, QueryIr, Smq};
use crate::sql::dialect::Dialect;
use crate::sql::expr::{BinaryOperator, Expr};
use crate::sql::ident::Ident;
use crate::sql::query::{Cte, Join, JoinSpine, OrderByExpr, Select, TableFactor, TableRef};

use super::passes::inline_subquery_tables::physical_table;

#[tracing::instrument(skip_all, fields(dialect = %dialect))]
pub fn write_sql(
    ir: &mut QueryIr,
    smq: &Smq,
    manifest: &Manifest,
    dialect: Dialect,
) -> CompileResult<Select> {
    let uppermost = ir.uppermost();
    let base_names = ir.projection_names();
    let has_agg = ir.contains(&LayerId::Agg);

    // Columns the uppermost layer needs from below: anything its groups
    // and filters reference.
    let upper_required: Vec<String> = ir
        .body(&uppermost)
        .map(|body| {
            let mut names = Vec::new();
            for node in body.groups.iter().chain(body.filters.iter()) {
                collect_names(node, &mut names);
            }
            names
        })
        .unwrap_or_default();

    let builder = SelectBuilder { smq, manifest };
    let mut ctes: Vec<Cte> = Vec::new();

    // Projection-layer CTEs.
    for base in &base_names {
        let layer = LayerId::projection(base.clone());
        {
            let body = ir.body_mut(&layer);
            // Filter-only columns the upper layer also needs must survive
            // into the CTE's select list.
            let mut filter_columns: Vec<String> = Vec::new();
            for filter in &body.filters {
                collect_names(filter, &mut filter_columns);
            }
            for name in filter_columns {
                if upper_required.iter().any(|n| *n == name) {
                    body.append_metric(crate::sql::expr::col(&name));
                }
            }
        }
        let body = ir.body(&layer).expect("projection layer exists").clone();
        let from = TableFactor::Table(physical_table(base, manifest, dialect)?);
        let select = builder.build(&body, Some(from), vec![], None, false);
        ctes.push(Cte {
            name: Ident::new(base.clone()),
            query: select,
        });
    }

    let agg_spine: Option<JoinSpine> = ir
        .body(&LayerId::Agg)
        .and_then(|body| body.join.clone());

    // The agg layer becomes a CTE when deriv sits on top of it.
    if has_agg && uppermost == LayerId::Deriv {
        let body = ir.body(&LayerId::Agg).expect("checked above").clone();
        let (from, joins, label) = agg_from(&agg_spine, &base_names);
        let select = builder.build(&body, from, joins, label.as_deref(), true);
        ctes.push(Cte {
            name: Ident::new("agg"),
            query: select,
        });
    }

    // Final SELECT over the uppermost layer.
    let mut final_select = if uppermost == LayerId::Deriv {
        let body = ir
            .body(&LayerId::Deriv)
            .expect("uppermost is deriv")
            .clone();
        let from = TableFactor::Table(TableRef::new("agg"));
        let mut select = builder.build(&body, Some(from), vec![], Some("agg"), false);
        strip_table_qualifiers(&mut select);
        select
    } else {
        let body = ir
            .body(&LayerId::Agg)
            .map(LayerBody::clone)
            .unwrap_or_default();
        let has_joins = agg_spine.is_some();
        let (from, joins, label) = agg_from(&agg_spine, &base_names);
        let mut select = builder.build(&body, from, joins, label.as_deref(), has_joins);
        if !has_joins {
            strip_table_qualifiers(&mut select);
        }
        select
    };

    final_select.ctes = ctes;
    Ok(final_select)
}

/// FROM position of an agg-level select: the join spine when present,
/// else the first projection CTE.
fn agg_from(
    spine: &Option<JoinSpine>,
    base_names: &[String],
) -> (Option<TableFactor>, Vec<Join>, Option<String>) {
    match spine {
        Some(spine) => (Some(spine.from.clone()), spine.joins.clone(), None),
        None => {
            let label = base_names.first().cloned();
            let from = label
                .clone()
                .map(|name| TableFactor::Table(TableRef::new(name)));
            (from, vec![], label)
        }
    }
}

fn collect_names(expr: &Expr, out: &mut Vec<String>) {
    expr.walk(&mut |e| {
        let name = match e {
            Expr::Column { name, .. } => Some(&name.text),
            Expr::Identifier(ident) => Some(&ident.text),
            _ => None,
        };
        if let Some(name) = name {
            if !out.iter().any(|n| n == name) {
                out.push(name.clone());
            }
        }
    });
}

struct SelectBuilder<'a> {
    smq: &'a Smq,
    manifest: &'a Manifest,
}

impl<'a> SelectBuilder<'a> {
    /// Build one layer's SELECT.
    ///
    /// `from_label` is the single table/CTE the select reads when it has
    /// no joins; `add_table_alias` switches on column qualification for
    /// the agg-level selects.
    fn build(
        &self,
        body: &LayerBody,
        from: Option<TableFactor>,
        joins: Vec<Join>,
        from_label: Option<&str>,
        add_table_alias: bool,
    ) -> Select {
        let mut metrics = body.metrics.clone();

        // Surface columns its own groups and filters use.
        let mut required: Vec<String> = Vec::new();
        for node in body.groups.iter().chain(body.filters.iter()) {
            collect_names(node, &mut required);
        }
        let exposed: Vec<String> = metrics
            .iter()
            .flat_map(|m| {
                m.alias_name()
                    .into_iter()
                    .chain(m.name())
                    .map(str::to_owned)
                    .collect::<Vec<_>>()
            })
            .collect();
        for name in required {
            if exposed.iter().any(|n| *n == name) {
                continue;
            }
            let node = if add_table_alias {
                match from_label {
                    Some(label) => crate::sql::expr::table_col(label, &name),
                    None => crate::sql::expr::col(&name),
                }
            } else {
                crate::sql::expr::col(&name)
            };
            metrics.push(node);
        }

        let join_tables: Vec<String> = if joins.is_empty() {
            vec![]
        } else {
            let mut names: Vec<String> = Vec::new();
            if let Some(factor) = &from {
                names.push(factor.reference_name().to_owned());
            }
            names.extend(joins.iter().map(|j| j.relation.reference_name().to_owned()));
            names
        };

        if add_table_alias {
            for metric in &mut metrics {
                self.qualify(metric, &join_tables, &joins, from_label);
            }
        }

        // Column -> table map for GROUP BY qualification.
        let mut column_tables: Vec<(String, String)> = Vec::new();
        for metric in &metrics {
            build_column_table_map(metric, &mut column_tables);
        }

        let metrics = sort_dimensions_first(metrics);
        let select_aliases: Vec<String> = metrics
            .iter()
            .filter_map(Expr::alias_name)
            .map(str::to_owned)
            .collect();

        let mut select = Select {
            projections: metrics,
            from,
            joins: joins.clone(),
            limit: body.limit,
            ..Select::default()
        };

        // WHERE vs QUALIFY.
        let mut where_clause: Option<Expr> = None;
        let mut qualify: Option<Expr> = None;
        for filter in &body.filters {
            let mut filter = filter.clone();
            if add_table_alias {
                self.qualify(&mut filter, &join_tables, &joins, from_label);
            }
            let subject_name = filter
                .predicate_subject()
                .and_then(Expr::name)
                .map(str::to_owned);
            let needs_paren = filter.contains_or() && !matches!(filter, Expr::Paren(_));
            let routed_to_qualify = filter.contains_window()
                || (from_label == Some("agg")
                    && subject_name
                        .as_deref()
                        .is_some_and(|n| select_aliases.iter().any(|a| a == n)));
            let wrapped = if needs_paren {
                Expr::Paren(Box::new(filter))
            } else {
                filter
            };
            let slot = if routed_to_qualify {
                &mut qualify
            } else {
                &mut where_clause
            };
            *slot = Some(match slot.take() {
                None => wrapped,
                Some(existing) => crate::sql::expr::binop(existing, BinaryOperator::And, wrapped),
            });
        }
        select.where_clause = where_clause;
        select.qualify = qualify;

        // GROUP BY, qualified consistently with the select list.
        let mut groups = body.groups.clone();
        if add_table_alias {
            for group in &mut groups {
                let mut unmapped = false;
                group.walk_mut(&mut |e| {
                    if let Expr::Column { table, name } = e {
                        if table.is_some() {
                            return;
                        }
                        if let Some((_, mapped)) =
                            column_tables.iter().find(|(col, _)| col == &name.text)
                        {
                            *table = Some(Ident::new(mapped.clone()));
                        } else {
                            unmapped = true;
                        }
                    }
                });
                if unmapped {
                    self.qualify(group, &join_tables, &joins, from_label);
                }
            }
        }
        select.group_by = groups;

        // ORDER BY.
        let mut orders = body.orders.clone();
        if add_table_alias {
            for order in &mut orders {
                self.qualify(&mut order.expr, &join_tables, &joins, from_label);
            }
        }
        select.order_by = orders
            .into_iter()
            .map(|o| OrderByExpr {
                expr: o.expr,
                desc: o.desc,
            })
            .collect();

        select
    }

    /// Attach a table qualifier to every bare column.
    ///
    /// With a join spine, each column is resolved through the original
    /// SMQ, the manifest, and the ON clauses; the spine's first table is
    /// the fallback. The qualifier is disambiguation only - single-table
    /// selects just use that table.
    fn qualify(
        &self,
        expr: &mut Expr,
        join_tables: &[String],
        joins: &[Join],
        from_label: Option<&str>,
    ) {
        if join_tables.is_empty() {
            if let Some(label) = from_label {
                expr.walk_mut(&mut |e| {
                    if let Expr::Column { table, .. } = e {
                        if table.is_none() {
                            *table = Some(Ident::new(label));
                        }
                    }
                });
            }
            return;
        }

        expr.walk_mut(&mut |e| {
            let Expr::Column { table, name } = e else {
                return;
            };
            if table.is_some() {
                return;
            }
            if let Some(found) = self.resolve_table(&name.text, join_tables, joins) {
                *table = Some(Ident::new(found));
            }
        });
    }

    fn resolve_table(&self, column: &str, join_tables: &[String], joins: &[Join]) -> Option<String> {
        // 1) The original SMQ's qualified references.
        if let Some(model) = crate::smq::parse::find_model_of_column(column, self.smq) {
            if join_tables.iter().any(|t| *t == model) {
                return Some(model);
            }
        }

        // 2) The manifest: which joined models declare this column.
        let matching: Vec<&String> = join_tables
            .iter()
            .filter(|table| {
                self.manifest.dimension(table, column).is_some()
                    || self.manifest.measure(table, column).is_some()
            })
            .collect();
        if let Some(first) = matching.first() {
            return Some((*first).clone());
        }

        // 2b) Metric expressions mentioning `table__column`.
        for metric in &self.manifest.metrics {
            let Some(text) = metric.expression() else {
                continue;
            };
            for table in join_tables {
                if text.contains(&format!("{table}__{column}")) {
                    return Some(table.clone());
                }
            }
        }

        // 3) ON clauses carrying the same column name.
        for join in joins {
            let Some(on) = &join.on else { continue };
            let mut found = None;
            on.walk(&mut |e| {
                if found.is_some() {
                    return;
                }
                if let Expr::Column {
                    table: Some(table),
                    name,
                } = e
                {
                    if name.text == column && join_tables.iter().any(|t| *t == table.text) {
                        found = Some(table.text.clone());
                    }
                }
            });
            if found.is_some() {
                return found;
            }
        }

        // 4) Fall back to the spine's first table.
        join_tables.first().cloned()
    }
}

fn build_column_table_map(expr: &Expr, map: &mut Vec<(String, String)>) {
    let alias = expr.alias_name().map(str::to_owned);
    let mut first_table: Option<String> = None;
    expr.walk(&mut |e| {
        if let Expr::Column {
            table: Some(table),
            name,
        } = e
        {
            if !map.iter().any(|(col, _)| col == &name.text) {
                map.push((name.text.clone(), table.text.clone()));
            }
            if first_table.is_none() {
                first_table = Some(table.text.clone());
            }
        }
    });
    if let (Some(alias), Some(table)) = (alias, first_table) {
        if let Expr::Alias { expr: inner, .. } = expr {
            if matches!(**inner, Expr::Column { .. }) && !map.iter().any(|(col, _)| col == &alias) {
                map.push((alias, table));
            }
        }
    }
}

/// Dimensions come before aggregates and metric-referencing expressions,
/// each class keeping its relative order.
fn sort_dimensions_first(metrics: Vec<Expr>) -> Vec<Expr> {
    let aliases: Vec<String> = metrics
        .iter()
        .filter_map(Expr::alias_name)
        .map(str::to_owned)
        .collect();

    let references_alias = |expr: &Expr| {
        let mut found = false;
        expr.walk(&mut |e| {
            let name = match e {
                Expr::Column { name, .. } => Some(&name.text),
                Expr::Identifier(ident) => Some(&ident.text),
                _ => None,
            };
            if let Some(name) = name {
                if aliases.iter().any(|a| a == name) {
                    found = true;
                }
            }
        });
        found
    };

    let mut dimensions = Vec::new();
    let mut aggregated = Vec::new();
    for metric in metrics {
        let is_aggregated = metric.contains_aggregate()
            || metric.contains_window()
            || metric.alias_name().is_some()
            || references_alias(&metric);
        if is_aggregated {
            aggregated.push(metric);
        } else {
            dimensions.push(metric);
        }
    }
    dimensions.extend(aggregated);
    dimensions
}

fn strip_table_qualifiers(select: &mut Select) {
    select.walk_exprs_mut(&mut |expr| {
        expr.walk_mut(&mut |e| {
            if let Expr::Column { table, .. } = e {
                *table = None;
            }
        });
    });
}
