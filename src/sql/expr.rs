//! Expression AST - the core of SQL expression rewriting.
//!
//! This module provides a strongly-typed AST for SQL expressions
//! with exhaustive pattern matching enforced by the compiler. Pipeline
//! passes either mutate in place through [`Expr::walk_mut`] or rebuild
//! bottom-up through [`Expr::transform`]; the old tree is consumed, never
//! shared.

use super::dialect::Dialect;
use super::ident::Ident;
use super::query::Select;
use super::token::{Token, TokenStream};

// =============================================================================
// Expression AST
// =============================================================================

/// How a function call was classified at parse time.
///
/// Unknown names come out of the parser as `Anonymous`; a composer pass
/// upgrades the well-known aggregate spellings to `Aggregate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Aggregate,
    Scalar,
    Anonymous,
}

/// A SQL expression.
///
/// Every variant must be handled in `to_tokens()` - the compiler enforces this.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Bare identifier, produced when a reference is rewritten to an
    /// already-projected alias.
    Identifier(Ident),

    /// Column reference: optional_table.column
    Column {
        table: Option<Ident>,
        name: Ident,
    },

    /// Literal values
    Literal(Literal),

    /// expr AS alias
    Alias {
        expr: Box<Expr>,
        alias: Ident,
    },

    /// Function call: name(args...)
    Function {
        name: String,
        args: Vec<Expr>,
        kind: FunctionKind,
        distinct: bool,
    },

    /// Window function expression.
    ///
    /// Example: `ROW_NUMBER() OVER (PARTITION BY region ORDER BY date)`
    WindowFunction {
        function: Box<Expr>,
        partition_by: Vec<Expr>,
        order_by: Vec<WindowOrderBy>,
        frame: Option<WindowFrame>,
    },

    /// Binary operation: left op right
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    /// Unary operation: op expr
    UnaryOp {
        op: UnaryOperator,
        expr: Box<Expr>,
    },

    /// CASE WHEN... THEN... ELSE... END
    Case {
        operand: Option<Box<Expr>>,
        when_clauses: Vec<(Expr, Expr)>,
        else_clause: Option<Box<Expr>>,
    },

    /// Scalar subquery: (SELECT ...)
    Subquery(Box<Select>),

    /// IN: expr IN (values...)
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },

    /// IN subquery: expr IN (SELECT ...)
    InSubquery {
        expr: Box<Expr>,
        subquery: Box<Select>,
        negated: bool,
    },

    /// BETWEEN: expr BETWEEN low AND high
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },

    /// IS NULL / IS NOT NULL
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },

    /// LIKE: expr LIKE pattern
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },

    /// Parenthesized expression
    Paren(Box<Expr>),

    /// Wildcard: *
    Star,
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Null,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Comparison
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    // Logical
    And,
    Or,
    // Arithmetic
    Plus,
    Minus,
    Mul,
    Div,
    Mod,
    // String
    Concat,
}

impl BinaryOperator {
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOperator::Plus
                | BinaryOperator::Minus
                | BinaryOperator::Mul
                | BinaryOperator::Div
                | BinaryOperator::Mod
        )
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
    Plus,
}

// =============================================================================
// Window Function Types
// =============================================================================

/// ORDER BY expression within a window specification.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowOrderBy {
    pub expr: Expr,
    pub desc: bool,
}

/// Window frame specification.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowFrame {
    pub kind: WindowFrameKind,
    pub start: WindowFrameBound,
    pub end: Option<WindowFrameBound>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowFrameKind {
    Rows,
    Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowFrameBound {
    UnboundedPreceding,
    Preceding(u64),
    CurrentRow,
    Following(u64),
    UnboundedFollowing,
}

/// Aggregate function names recognized by the classifier.
pub const AGGREGATE_FUNCTIONS: &[&str] = &["SUM", "COUNT", "AVG", "MAX", "MIN"];

// =============================================================================
// Constructors
// =============================================================================

pub fn col(name: &str) -> Expr {
    Expr::Column {
        table: None,
        name: Ident::new(name),
    }
}

pub fn table_col(table: &str, name: &str) -> Expr {
    Expr::Column {
        table: Some(Ident::new(table)),
        name: Ident::new(name),
    }
}

pub fn ident(name: &str) -> Expr {
    Expr::Identifier(Ident::new(name))
}

pub fn alias(expr: Expr, alias: &str) -> Expr {
    Expr::Alias {
        expr: Box::new(expr),
        alias: Ident::new(alias),
    }
}

pub fn lit_int(n: i64) -> Expr {
    Expr::Literal(Literal::Int(n))
}

pub fn lit_str(s: &str) -> Expr {
    Expr::Literal(Literal::String(s.into()))
}

pub fn binop(left: Expr, op: BinaryOperator, right: Expr) -> Expr {
    Expr::BinaryOp {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

pub fn agg_func(name: &str, arg: Expr) -> Expr {
    Expr::Function {
        name: name.to_uppercase(),
        args: vec![arg],
        kind: FunctionKind::Aggregate,
        distinct: false,
    }
}

// =============================================================================
// Walks and transforms
// =============================================================================

impl Expr {
    /// Pre-order walk over this node and all descendants, descending into
    /// subquery bodies.
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        self.walk_inner(f, false)
    }

    /// Pre-order walk that does not descend into subquery bodies.
    pub fn walk_pruning_subqueries<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        self.walk_inner(f, true)
    }

    fn walk_inner<'a>(&'a self, f: &mut dyn FnMut(&'a Expr), prune_subqueries: bool) {
        f(self);
        match self {
            Expr::Identifier(_) | Expr::Literal(_) | Expr::Star => {}
            Expr::Column { .. } => {}
            Expr::Alias { expr, .. } => expr.walk_inner(f, prune_subqueries),
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.walk_inner(f, prune_subqueries);
                }
            }
            Expr::WindowFunction {
                function,
                partition_by,
                order_by,
                ..
            } => {
                function.walk_inner(f, prune_subqueries);
                for e in partition_by {
                    e.walk_inner(f, prune_subqueries);
                }
                for o in order_by {
                    o.expr.walk_inner(f, prune_subqueries);
                }
            }
            Expr::BinaryOp { left, right, .. } => {
                left.walk_inner(f, prune_subqueries);
                right.walk_inner(f, prune_subqueries);
            }
            Expr::UnaryOp { expr, .. } => expr.walk_inner(f, prune_subqueries),
            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                if let Some(op) = operand {
                    op.walk_inner(f, prune_subqueries);
                }
                for (when, then) in when_clauses {
                    when.walk_inner(f, prune_subqueries);
                    then.walk_inner(f, prune_subqueries);
                }
                if let Some(e) = else_clause {
                    e.walk_inner(f, prune_subqueries);
                }
            }
            Expr::Subquery(select) => {
                if !prune_subqueries {
                    select.walk_exprs(&mut |e| e.walk_inner(f, prune_subqueries));
                }
            }
            Expr::InList { expr, list, .. } => {
                expr.walk_inner(f, prune_subqueries);
                for e in list {
                    e.walk_inner(f, prune_subqueries);
                }
            }
            Expr::InSubquery { expr, subquery, .. } => {
                expr.walk_inner(f, prune_subqueries);
                if !prune_subqueries {
                    subquery.walk_exprs(&mut |e| e.walk_inner(f, prune_subqueries));
                }
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                expr.walk_inner(f, prune_subqueries);
                low.walk_inner(f, prune_subqueries);
                high.walk_inner(f, prune_subqueries);
            }
            Expr::IsNull { expr, .. } => expr.walk_inner(f, prune_subqueries),
            Expr::Like { expr, pattern, .. } => {
                expr.walk_inner(f, prune_subqueries);
                pattern.walk_inner(f, prune_subqueries);
            }
            Expr::Paren(e) => e.walk_inner(f, prune_subqueries),
        }
    }

    /// Pre-order mutable walk. Does not descend into subquery bodies; passes
    /// that rewrite subqueries handle them explicitly.
    pub fn walk_mut(&mut self, f: &mut dyn FnMut(&mut Expr)) {
        f(self);
        match self {
            Expr::Identifier(_) | Expr::Literal(_) | Expr::Star | Expr::Column { .. } => {}
            Expr::Alias { expr, .. } => expr.walk_mut(f),
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.walk_mut(f);
                }
            }
            Expr::WindowFunction {
                function,
                partition_by,
                order_by,
                ..
            } => {
                function.walk_mut(f);
                for e in partition_by {
                    e.walk_mut(f);
                }
                for o in order_by {
                    o.expr.walk_mut(f);
                }
            }
            Expr::BinaryOp { left, right, .. } => {
                left.walk_mut(f);
                right.walk_mut(f);
            }
            Expr::UnaryOp { expr, .. } => expr.walk_mut(f),
            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                if let Some(op) = operand {
                    op.walk_mut(f);
                }
                for (when, then) in when_clauses {
                    when.walk_mut(f);
                    then.walk_mut(f);
                }
                if let Some(e) = else_clause {
                    e.walk_mut(f);
                }
            }
            Expr::Subquery(_) => {}
            Expr::InList { expr, list, .. } => {
                expr.walk_mut(f);
                for e in list {
                    e.walk_mut(f);
                }
            }
            Expr::InSubquery { expr, .. } => expr.walk_mut(f),
            Expr::Between {
                expr, low, high, ..
            } => {
                expr.walk_mut(f);
                low.walk_mut(f);
                high.walk_mut(f);
            }
            Expr::IsNull { expr, .. } => expr.walk_mut(f),
            Expr::Like { expr, pattern, .. } => {
                expr.walk_mut(f);
                pattern.walk_mut(f);
            }
            Expr::Paren(e) => e.walk_mut(f),
        }
    }

    /// Bottom-up rebuild: children are transformed first, then the node
    /// itself is passed to `f`. Returns the new tree.
    pub fn transform(self, f: &mut dyn FnMut(Expr) -> Expr) -> Expr {
        self.transform_pruned(&|_| false, f)
    }

    /// [`Expr::transform`] that leaves pruned subtrees untouched.
    pub fn transform_pruned(
        self,
        prune: &dyn Fn(&Expr) -> bool,
        f: &mut dyn FnMut(Expr) -> Expr,
    ) -> Expr {
        if prune(&self) {
            return self;
        }
        let rebuilt = match self {
            Expr::Identifier(_) | Expr::Literal(_) | Expr::Star | Expr::Column { .. } => self,
            Expr::Alias { expr, alias } => Expr::Alias {
                expr: Box::new(expr.transform_pruned(prune, f)),
                alias,
            },
            Expr::Function {
                name,
                args,
                kind,
                distinct,
            } => Expr::Function {
                name,
                args: args.into_iter().map(|a| a.transform_pruned(prune, f)).collect(),
                kind,
                distinct,
            },
            Expr::WindowFunction {
                function,
                partition_by,
                order_by,
                frame,
            } => Expr::WindowFunction {
                function: Box::new(function.transform_pruned(prune, f)),
                partition_by: partition_by.into_iter().map(|e| e.transform_pruned(prune, f)).collect(),
                order_by: order_by
                    .into_iter()
                    .map(|o| WindowOrderBy {
                        expr: o.expr.transform_pruned(prune, f),
                        desc: o.desc,
                    })
                    .collect(),
                frame,
            },
            Expr::BinaryOp { left, op, right } => Expr::BinaryOp {
                left: Box::new(left.transform_pruned(prune, f)),
                op,
                right: Box::new(right.transform_pruned(prune, f)),
            },
            Expr::UnaryOp { op, expr } => Expr::UnaryOp {
                op,
                expr: Box::new(expr.transform_pruned(prune, f)),
            },
            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => Expr::Case {
                operand: operand.map(|e| Box::new(e.transform_pruned(prune, f))),
                when_clauses: when_clauses
                    .into_iter()
                    .map(|(w, t)| (w.transform_pruned(prune, f), t.transform_pruned(prune, f)))
                    .collect(),
                else_clause: else_clause.map(|e| Box::new(e.transform_pruned(prune, f))),
            },
            Expr::Subquery(select) => Expr::Subquery(select),
            Expr::InList {
                expr,
                list,
                negated,
            } => Expr::InList {
                expr: Box::new(expr.transform_pruned(prune, f)),
                list: list.into_iter().map(|e| e.transform_pruned(prune, f)).collect(),
                negated,
            },
            Expr::InSubquery {
                expr,
                subquery,
                negated,
            } => Expr::InSubquery {
                expr: Box::new(expr.transform_pruned(prune, f)),
                subquery,
                negated,
            },
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => Expr::Between {
                expr: Box::new(expr.transform_pruned(prune, f)),
                low: Box::new(low.transform_pruned(prune, f)),
                high: Box::new(high.transform_pruned(prune, f)),
                negated,
            },
            Expr::IsNull { expr, negated } => Expr::IsNull {
                expr: Box::new(expr.transform_pruned(prune, f)),
                negated,
            },
            Expr::Like {
                expr,
                pattern,
                negated,
            } => Expr::Like {
                expr: Box::new(expr.transform_pruned(prune, f)),
                pattern: Box::new(pattern.transform_pruned(prune, f)),
                negated,
            },
            Expr::Paren(e) => Expr::Paren(Box::new(e.transform_pruned(prune, f))),
        };
        f(rebuilt)
    }

    /// All descendants (including self) matching the predicate.
    pub fn find_all<'a>(&'a self, pred: fn(&Expr) -> bool) -> Vec<&'a Expr> {
        let mut out = Vec::new();
        self.walk(&mut |e| {
            if pred(e) {
                out.push(e);
            }
        });
        out
    }

    /// Whether any descendant (including self) matches the predicate.
    pub fn any(&self, pred: fn(&Expr) -> bool) -> bool {
        let mut found = false;
        self.walk(&mut |e| {
            if pred(e) {
                found = true;
            }
        });
        found
    }

    // =========================================================================
    // Accessors mirrored on how the composer inspects nodes
    // =========================================================================

    /// The name users observe for this node: a column or identifier text,
    /// looking through aliases and parens.
    pub fn name(&self) -> Option<&str> {
        match self {
            Expr::Identifier(i) => Some(&i.text),
            Expr::Column { name, .. } => Some(&name.text),
            Expr::Alias { expr, .. } => expr.name(),
            Expr::Paren(e) => e.name(),
            _ => None,
        }
    }

    /// The alias, when this node is an alias wrapper.
    pub fn alias_name(&self) -> Option<&str> {
        match self {
            Expr::Alias { alias, .. } => Some(&alias.text),
            _ => None,
        }
    }

    /// All column names referenced anywhere in the tree.
    pub fn column_names(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.walk(&mut |e| {
            if let Expr::Column { name, .. } = e {
                out.push(name.text.clone());
            }
        });
        out
    }

    pub fn is_column_or_literal(&self) -> bool {
        matches!(self, Expr::Column { .. } | Expr::Literal(_) | Expr::Identifier(_))
    }

    pub fn is_aggregate_function(&self) -> bool {
        matches!(
            self,
            Expr::Function {
                kind: FunctionKind::Aggregate,
                ..
            }
        )
    }

    /// Any aggregate function anywhere in the tree, windowed or not.
    pub fn contains_aggregate(&self) -> bool {
        self.any(Expr::is_aggregate_function)
    }

    pub fn contains_window(&self) -> bool {
        self.any(|e| matches!(e, Expr::WindowFunction { .. }))
    }

    pub fn contains_arithmetic(&self) -> bool {
        self.any(|e| matches!(e, Expr::BinaryOp { op, .. } if op.is_arithmetic()))
    }

    pub fn contains_or(&self) -> bool {
        self.any(|e| matches!(e, Expr::BinaryOp { op: BinaryOperator::Or, .. }))
    }

    pub fn contains_division(&self) -> bool {
        self.any(|e| matches!(e, Expr::BinaryOp { op: BinaryOperator::Div, .. }))
    }

    /// The left-hand subject of a predicate, used for filter placement.
    pub fn predicate_subject(&self) -> Option<&Expr> {
        match self {
            Expr::BinaryOp { left, .. } => Some(left),
            Expr::Between { expr, .. }
            | Expr::InList { expr, .. }
            | Expr::InSubquery { expr, .. }
            | Expr::IsNull { expr, .. }
            | Expr::Like { expr, .. } => Some(expr),
            Expr::UnaryOp { expr, .. } | Expr::Paren(expr) => expr.predicate_subject(),
            _ => None,
        }
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    /// Serialized form under the default dialect, used for structural
    /// deduplication and synthesized aliases.
    pub fn sql_text(&self) -> String {
        self.to_tokens_for_dialect(Dialect::default())
            .serialize(Dialect::default())
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        self.write_tokens(&mut ts, dialect);
        ts
    }

    fn write_tokens(&self, ts: &mut TokenStream, dialect: Dialect) {
        match self {
            Expr::Identifier(ident) => {
                ts.push(Token::Ident(ident.clone()));
            }
            Expr::Column { table, name } => {
                if let Some(table) = table {
                    ts.push(Token::Ident(table.clone()));
                    ts.push(Token::Dot);
                }
                ts.push(Token::Ident(name.clone()));
            }
            Expr::Literal(lit) => {
                match lit {
                    Literal::Int(n) => ts.push(Token::LitInt(*n)),
                    Literal::Float(f) => ts.push(Token::LitFloat(*f)),
                    Literal::String(s) => ts.push(Token::LitString(s.clone())),
                    Literal::Bool(b) => ts.push(Token::LitBool(*b)),
                    Literal::Null => ts.push(Token::LitNull),
                };
            }
            Expr::Alias { expr, alias } => {
                expr.write_tokens(ts, dialect);
                ts.space().push(Token::As).space().push(Token::Ident(alias.clone()));
            }
            Expr::Function {
                name,
                args,
                distinct,
                ..
            } => {
                ts.push(Token::FunctionName(name.clone()));
                ts.lparen();
                if *distinct {
                    ts.push(Token::Distinct).space();
                }
                if args.is_empty() && name.eq_ignore_ascii_case("count") {
                    ts.push(Token::Star);
                } else {
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            ts.comma().space();
                        }
                        arg.write_tokens(ts, dialect);
                    }
                }
                ts.rparen();
            }
            Expr::WindowFunction {
                function,
                partition_by,
                order_by,
                frame,
            } => {
                function.write_tokens(ts, dialect);
                ts.space().push(Token::Over).space().lparen();
                let mut wrote = false;
                if !partition_by.is_empty() {
                    ts.push(Token::PartitionBy).space();
                    for (i, e) in partition_by.iter().enumerate() {
                        if i > 0 {
                            ts.comma().space();
                        }
                        e.write_tokens(ts, dialect);
                    }
                    wrote = true;
                }
                if !order_by.is_empty() {
                    if wrote {
                        ts.space();
                    }
                    ts.push(Token::OrderBy).space();
                    for (i, o) in order_by.iter().enumerate() {
                        if i > 0 {
                            ts.comma().space();
                        }
                        o.expr.write_tokens(ts, dialect);
                        if o.desc {
                            ts.space().push(Token::Desc);
                        }
                    }
                    wrote = true;
                }
                if let Some(frame) = frame {
                    if wrote {
                        ts.space();
                    }
                    frame.write_tokens(ts);
                }
                ts.rparen();
            }
            Expr::BinaryOp { left, op, right } => {
                left.write_tokens(ts, dialect);
                ts.space();
                ts.push(match op {
                    BinaryOperator::Eq => Token::Eq,
                    BinaryOperator::Ne => Token::Ne,
                    BinaryOperator::Lt => Token::Lt,
                    BinaryOperator::Gt => Token::Gt,
                    BinaryOperator::Lte => Token::Lte,
                    BinaryOperator::Gte => Token::Gte,
                    BinaryOperator::And => Token::And,
                    BinaryOperator::Or => Token::Or,
                    BinaryOperator::Plus => Token::Plus,
                    BinaryOperator::Minus => Token::Minus,
                    BinaryOperator::Mul => Token::Mul,
                    BinaryOperator::Div => Token::Div,
                    BinaryOperator::Mod => Token::Mod,
                    BinaryOperator::Concat => Token::Concat,
                });
                ts.space();
                right.write_tokens(ts, dialect);
            }
            Expr::UnaryOp { op, expr } => {
                match op {
                    UnaryOperator::Not => {
                        ts.push(Token::Not).space();
                    }
                    UnaryOperator::Minus => {
                        ts.push(Token::Minus);
                    }
                    UnaryOperator::Plus => {
                        ts.push(Token::Plus);
                    }
                };
                expr.write_tokens(ts, dialect);
            }
            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                ts.push(Token::Case);
                if let Some(op) = operand {
                    ts.space();
                    op.write_tokens(ts, dialect);
                }
                for (when, then) in when_clauses {
                    ts.space().push(Token::When).space();
                    when.write_tokens(ts, dialect);
                    ts.space().push(Token::Then).space();
                    then.write_tokens(ts, dialect);
                }
                if let Some(e) = else_clause {
                    ts.space().push(Token::Else).space();
                    e.write_tokens(ts, dialect);
                }
                ts.space().push(Token::End);
            }
            Expr::Subquery(select) => {
                ts.lparen();
                ts.append(&select.to_tokens_for_dialect(dialect));
                ts.rparen();
            }
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                expr.write_tokens(ts, dialect);
                ts.space();
                if *negated {
                    ts.push(Token::Not).space();
                }
                ts.push(Token::In).space().lparen();
                for (i, e) in list.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    e.write_tokens(ts, dialect);
                }
                ts.rparen();
            }
            Expr::InSubquery {
                expr,
                subquery,
                negated,
            } => {
                expr.write_tokens(ts, dialect);
                ts.space();
                if *negated {
                    ts.push(Token::Not).space();
                }
                ts.push(Token::In).space().lparen();
                ts.append(&subquery.to_tokens_for_dialect(dialect));
                ts.rparen();
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                expr.write_tokens(ts, dialect);
                ts.space();
                if *negated {
                    ts.push(Token::Not).space();
                }
                ts.push(Token::Between).space();
                low.write_tokens(ts, dialect);
                ts.space().push(Token::And).space();
                high.write_tokens(ts, dialect);
            }
            Expr::IsNull { expr, negated } => {
                expr.write_tokens(ts, dialect);
                ts.space();
                if *negated {
                    ts.push(Token::IsNotNull);
                } else {
                    ts.push(Token::IsNull);
                }
            }
            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                expr.write_tokens(ts, dialect);
                ts.space();
                if *negated {
                    ts.push(Token::Not).space();
                }
                ts.push(Token::Like).space();
                pattern.write_tokens(ts, dialect);
            }
            Expr::Paren(e) => {
                ts.lparen();
                e.write_tokens(ts, dialect);
                ts.rparen();
            }
            Expr::Star => {
                ts.push(Token::Star);
            }
        }
    }
}

impl WindowFrame {
    fn write_tokens(&self, ts: &mut TokenStream) {
        match self.kind {
            WindowFrameKind::Rows => ts.push(Token::Rows),
            WindowFrameKind::Range => ts.push(Token::Range),
        };
        ts.space();
        if let Some(end) = &self.end {
            ts.push(Token::Between).space();
            self.start.write_tokens(ts);
            ts.space().push(Token::And).space();
            end.write_tokens(ts);
        } else {
            self.start.write_tokens(ts);
        }
    }
}

impl WindowFrameBound {
    fn write_tokens(&self, ts: &mut TokenStream) {
        match self {
            WindowFrameBound::UnboundedPreceding => {
                ts.push(Token::Unbounded).space().push(Token::Preceding);
            }
            WindowFrameBound::Preceding(n) => {
                ts.push(Token::LitInt(*n as i64)).space().push(Token::Preceding);
            }
            WindowFrameBound::CurrentRow => {
                ts.push(Token::CurrentRow);
            }
            WindowFrameBound::Following(n) => {
                ts.push(Token::LitInt(*n as i64)).space().push(Token::Following);
            }
            WindowFrameBound::UnboundedFollowing => {
                ts.push(Token::Unbounded).space().push(Token::Following);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_serialize() {
        assert_eq!(table_col("orders", "amount").sql_text(), "orders.amount");
        assert_eq!(col("region").sql_text(), "region");
    }

    #[test]
    fn test_alias_serialize() {
        let expr = alias(agg_func("SUM", col("amount")), "total_amount");
        assert_eq!(expr.sql_text(), "SUM(amount) AS total_amount");
    }

    #[test]
    fn test_arithmetic_detection() {
        let expr = binop(col("a"), BinaryOperator::Div, col("b"));
        assert!(expr.contains_arithmetic());
        assert!(expr.contains_division());
        assert!(!col("a").contains_arithmetic());
    }

    #[test]
    fn test_aggregate_detection_through_window() {
        let windowed = Expr::WindowFunction {
            function: Box::new(agg_func("SUM", col("amount"))),
            partition_by: vec![col("region")],
            order_by: vec![],
            frame: None,
        };
        assert!(windowed.contains_aggregate());
        assert!(windowed.contains_window());
    }

    #[test]
    fn test_transform_rebuilds_bottom_up() {
        let expr = binop(col("a"), BinaryOperator::Plus, col("b"));
        let renamed = expr.transform(&mut |e| match e {
            Expr::Column { name, .. } if name.text == "a" => col("x"),
            other => other,
        });
        assert_eq!(renamed.sql_text(), "x + b");
    }

    #[test]
    fn test_predicate_subject() {
        let pred = binop(col("m__region"), BinaryOperator::Eq, lit_str("apac"));
        assert_eq!(pred.predicate_subject().and_then(Expr::name), Some("m__region"));
    }
}
