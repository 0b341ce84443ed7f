//! CTE-to-inline conversion: every CTE reference becomes a nested
//! subquery aliased to the CTE name, and the WITH clause disappears.

use crate::sql::ident::Ident;
use crate::sql::query::{Select, TableFactor};

/// Flatten the WITH clause into nested subqueries.
///
/// CTE bodies are processed in declaration order, so a body referencing
/// an earlier CTE picks up the already-inlined version of it.
pub fn inline_ctes(select: &Select) -> Select {
    let mut root = select.clone();
    if root.ctes.is_empty() {
        return root;
    }

    let mut definitions: Vec<(String, Select)> = root
        .ctes
        .iter()
        .map(|cte| (cte.name.text.clone(), cte.query.clone()))
        .collect();

    for idx in 0..definitions.len() {
        let mut body = definitions[idx].1.clone();
        let snapshot = definitions.clone();
        body.map_tables(&mut |factor| replace_cte_ref(factor, &snapshot));
        definitions[idx].1 = body;
    }

    let snapshot = definitions;
    root.map_tables(&mut |factor| replace_cte_ref(factor, &snapshot));
    root.ctes.clear();
    root
}

fn replace_cte_ref(factor: &mut TableFactor, definitions: &[(String, Select)]) {
    let TableFactor::Table(table) = factor else {
        return;
    };
    let Some((name, body)) = definitions
        .iter()
        .find(|(name, _)| *name == table.name.text)
    else {
        return;
    };
    *factor = TableFactor::Derived {
        subquery: Box::new(body.clone()),
        alias: Ident::new(name.clone()),
    };
}
