//! Query builder - SELECT trees assembled by the SQL writer.

use super::dialect::Dialect;
use super::expr::Expr;
use super::ident::Ident;
use super::token::{Token, TokenStream};

// =============================================================================
// Table references
// =============================================================================

/// A physical or CTE table reference with optional catalog/schema and alias.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub catalog: Option<Ident>,
    pub schema: Option<Ident>,
    pub name: Ident,
    pub alias: Option<Ident>,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            catalog: None,
            schema: None,
            name: Ident::new(name),
            alias: None,
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(Ident::new(schema));
        self
    }

    pub fn with_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.catalog = Some(Ident::new(catalog));
        self
    }

    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        if let Some(catalog) = &self.catalog {
            ts.push(Token::Ident(catalog.clone()));
            ts.push(Token::Dot);
        }
        if let Some(schema) = &self.schema {
            ts.push(Token::Ident(schema.clone()));
            ts.push(Token::Dot);
        }
        ts.push(Token::Ident(self.name.clone()));
        if let Some(alias) = &self.alias {
            ts.space().push(Token::As).space().push(Token::Ident(alias.clone()));
        }
        ts
    }
}

/// What a FROM or JOIN references: a named table/CTE or a derived subquery.
#[derive(Debug, Clone, PartialEq)]
pub enum TableFactor {
    Table(TableRef),
    Derived {
        subquery: Box<Select>,
        alias: Ident,
    },
}

impl TableFactor {
    /// The name this factor is addressable by: alias, else table name.
    pub fn reference_name(&self) -> &str {
        match self {
            TableFactor::Table(t) => t
                .alias
                .as_ref()
                .map(|a| a.text.as_str())
                .unwrap_or(t.name.text.as_str()),
            TableFactor::Derived { alias, .. } => &alias.text,
        }
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        match self {
            TableFactor::Table(t) => t.to_tokens(),
            TableFactor::Derived { subquery, alias } => {
                let mut ts = TokenStream::new();
                ts.lparen();
                ts.append(&subquery.to_tokens_for_dialect(dialect));
                ts.rparen();
                ts.space().push(Token::As).space().push(Token::Ident(alias.clone()));
                ts
            }
        }
    }
}

// =============================================================================
// Joins
// =============================================================================

/// Type of join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

/// A JOIN clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub relation: TableFactor,
    pub on: Option<Expr>,
}

impl Join {
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        match self.kind {
            JoinKind::Inner => ts.push(Token::Inner),
            JoinKind::Left => ts.push(Token::Left),
            JoinKind::Right => ts.push(Token::Right),
            JoinKind::Full => ts.push(Token::Full).space().push(Token::Outer),
            JoinKind::Cross => ts.push(Token::Cross),
        };
        ts.space().push(Token::Join).space();
        ts.append(&self.relation.to_tokens_for_dialect(dialect));
        if let Some(on) = &self.on {
            ts.space().push(Token::On).space();
            ts.append(&on.to_tokens_for_dialect(dialect));
        }
        ts
    }
}

/// A FROM relation plus the joins hanging off it - the shape the agg layer
/// carries when the query spans several projection layers.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinSpine {
    pub from: TableFactor,
    pub joins: Vec<Join>,
}

impl JoinSpine {
    /// Names of every table this spine touches, FROM first.
    pub fn table_names(&self) -> Vec<&str> {
        let mut names = vec![self.from.reference_name()];
        for join in &self.joins {
            names.push(join.relation.reference_name());
        }
        names
    }

    /// All column references appearing in the ON clauses.
    pub fn on_columns(&self) -> Vec<&Expr> {
        let mut out = Vec::new();
        for join in &self.joins {
            if let Some(on) = &join.on {
                on.walk(&mut |e| {
                    if matches!(e, Expr::Column { .. }) {
                        out.push(e);
                    }
                });
            }
        }
        out
    }
}

// =============================================================================
// ORDER BY
// =============================================================================

/// An ORDER BY expression.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    pub expr: Expr,
    pub desc: bool,
}

impl OrderByExpr {
    pub fn asc(expr: Expr) -> Self {
        Self { expr, desc: false }
    }

    pub fn desc(expr: Expr) -> Self {
        Self { expr, desc: true }
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = self.expr.to_tokens_for_dialect(dialect);
        if self.desc {
            ts.space().push(Token::Desc);
        }
        ts
    }
}

// =============================================================================
// CTEs and SELECT
// =============================================================================

/// A named common table expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    pub name: Ident,
    pub query: Select,
}

/// A SELECT statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Select {
    pub ctes: Vec<Cte>,
    pub projections: Vec<Expr>,
    pub from: Option<TableFactor>,
    pub joins: Vec<Join>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub qualify: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<u64>,
}

impl Select {
    pub fn new() -> Self {
        Self::default()
    }

    /// Visit every expression the statement holds, in document order.
    /// Does not descend into CTE bodies or derived tables; callers that
    /// need full-tree traversal recurse through those explicitly.
    pub fn walk_exprs<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        for e in &self.projections {
            f(e);
        }
        for join in &self.joins {
            if let Some(on) = &join.on {
                f(on);
            }
        }
        if let Some(w) = &self.where_clause {
            f(w);
        }
        for g in &self.group_by {
            f(g);
        }
        if let Some(q) = &self.qualify {
            f(q);
        }
        for o in &self.order_by {
            f(&o.expr);
        }
    }

    /// Mutable variant of [`Select::walk_exprs`].
    pub fn walk_exprs_mut(&mut self, f: &mut dyn FnMut(&mut Expr)) {
        for e in &mut self.projections {
            f(e);
        }
        for join in &mut self.joins {
            if let Some(on) = &mut join.on {
                f(on);
            }
        }
        if let Some(w) = &mut self.where_clause {
            f(w);
        }
        for g in &mut self.group_by {
            f(g);
        }
        if let Some(q) = &mut self.qualify {
            f(q);
        }
        for o in &mut self.order_by {
            f(&mut o.expr);
        }
    }

    /// Rewrite every table factor in FROM/JOIN position, recursing into
    /// derived tables. Used by the CTE inliner.
    pub fn map_tables(&mut self, f: &mut dyn FnMut(&mut TableFactor)) {
        if let Some(from) = &mut self.from {
            if let TableFactor::Derived { subquery, .. } = from {
                subquery.map_tables(f);
            }
            f(from);
        }
        for join in &mut self.joins {
            if let TableFactor::Derived { subquery, .. } = &mut join.relation {
                subquery.map_tables(f);
            }
            f(&mut join.relation);
        }
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        if !self.ctes.is_empty() {
            ts.push(Token::With).space();
            for (i, cte) in self.ctes.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.push(Token::Ident(cte.name.clone()))
                    .space()
                    .push(Token::As)
                    .space()
                    .lparen();
                ts.append(&cte.query.to_tokens_for_dialect(dialect));
                ts.rparen();
            }
            ts.space();
        }

        ts.push(Token::Select).space();
        for (i, e) in self.projections.iter().enumerate() {
            if i > 0 {
                ts.comma().space();
            }
            ts.append(&e.to_tokens_for_dialect(dialect));
        }

        if let Some(from) = &self.from {
            ts.space().push(Token::From).space();
            ts.append(&from.to_tokens_for_dialect(dialect));
        }

        for join in &self.joins {
            ts.space();
            ts.append(&join.to_tokens_for_dialect(dialect));
        }

        if let Some(w) = &self.where_clause {
            ts.space().push(Token::Where).space();
            ts.append(&w.to_tokens_for_dialect(dialect));
        }

        if !self.group_by.is_empty() {
            ts.space().push(Token::GroupBy).space();
            for (i, g) in self.group_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&g.to_tokens_for_dialect(dialect));
            }
        }

        if let Some(q) = &self.qualify {
            ts.space().push(Token::Qualify).space();
            ts.append(&q.to_tokens_for_dialect(dialect));
        }

        if !self.order_by.is_empty() {
            ts.space().push(Token::OrderBy).space();
            for (i, o) in self.order_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&o.to_tokens_for_dialect(dialect));
            }
        }

        if let Some(limit) = self.limit {
            ts.space().push(Token::Limit).space().push(Token::LitInt(limit as i64));
        }

        ts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::expr::{agg_func, alias, col};

    #[test]
    fn test_simple_select() {
        let select = Select {
            projections: vec![alias(agg_func("SUM", col("amount")), "total"), col("region")],
            from: Some(TableFactor::Table(TableRef::new("orders"))),
            group_by: vec![col("region")],
            ..Select::default()
        };
        assert_eq!(
            select.to_sql(Dialect::DuckDb),
            "SELECT SUM(amount) AS total, region FROM orders GROUP BY region"
        );
    }

    #[test]
    fn test_cte_select() {
        let inner = Select {
            projections: vec![col("amount")],
            from: Some(TableFactor::Table(TableRef::new("raw").with_schema("sales"))),
            ..Select::default()
        };
        let outer = Select {
            ctes: vec![Cte {
                name: Ident::new("orders"),
                query: inner,
            }],
            projections: vec![agg_func("SUM", col("amount"))],
            from: Some(TableFactor::Table(TableRef::new("orders"))),
            ..Select::default()
        };
        assert_eq!(
            outer.to_sql(Dialect::DuckDb),
            "WITH orders AS (SELECT amount FROM sales.raw) SELECT SUM(amount) FROM orders"
        );
    }

    #[test]
    fn test_left_join_serialization() {
        let select = Select {
            projections: vec![Expr::Star],
            from: Some(TableFactor::Table(TableRef::new("a"))),
            joins: vec![Join {
                kind: JoinKind::Left,
                relation: TableFactor::Table(TableRef::new("b")),
                on: Some(crate::sql::expr::binop(
                    crate::sql::expr::table_col("a", "id"),
                    crate::sql::expr::BinaryOperator::Eq,
                    crate::sql::expr::table_col("b", "id"),
                )),
            }],
            ..Select::default()
        };
        assert_eq!(
            select.to_sql(Dialect::DuckDb),
            "SELECT * FROM a LEFT JOIN b ON a.id = b.id"
        );
    }
}
