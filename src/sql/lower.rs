//! Lowering from the sqlparser AST into the crate's expression tree.
//!
//! SMQ entries, metric/measure/dimension `expr`s and user-supplied join
//! clauses are all SQL fragments. Each fragment is wrapped in a `SELECT`
//! so the generic parser accepts it, then the relevant piece of the
//! sqlparser AST is lowered into [`Expr`].

use sqlparser::ast as sp;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use super::expr::{
    BinaryOperator, Expr, FunctionKind, Literal, UnaryOperator, WindowFrame, WindowFrameBound,
    WindowFrameKind, WindowOrderBy, AGGREGATE_FUNCTIONS,
};
use super::ident::Ident;
use super::query::{Join, JoinKind, JoinSpine, Select, TableFactor, TableRef};
use crate::error::CompileError;

/// Scalar functions lowered as known rather than anonymous.
const SCALAR_FUNCTIONS: &[&str] = &[
    "COALESCE",
    "ROUND",
    "ABS",
    "FLOOR",
    "CEIL",
    "UPPER",
    "LOWER",
    "LENGTH",
    "CONCAT",
    "SUBSTRING",
    "SUBSTR",
    "TRIM",
    "NULLIF",
    "IFNULL",
    "ROW_NUMBER",
    "RANK",
    "DENSE_RANK",
    "NTILE",
    "LAG",
    "LEAD",
    "FIRST_VALUE",
    "LAST_VALUE",
    "DATE_TRUNC",
    "CURRENT_DATE",
    "CURRENT_TIMESTAMP",
];

/// Parse a SQL expression fragment into the crate AST.
pub fn parse_expr(fragment: &str) -> Result<Expr, CompileError> {
    let sql = format!("SELECT {fragment}");
    let statements = Parser::parse_sql(&GenericDialect {}, &sql).map_err(|e| {
        CompileError::InputValidation(format!("failed to parse expression '{fragment}': {e}"))
    })?;
    let select = single_select(statements, fragment)?;
    let item = select.projection.into_iter().next().ok_or_else(|| {
        CompileError::InputValidation(format!("expression '{fragment}' produced no output"))
    })?;
    match item {
        sp::SelectItem::UnnamedExpr(e) => lower_expr(e),
        sp::SelectItem::ExprWithAlias { expr, alias } => Ok(Expr::Alias {
            expr: Box::new(lower_expr(expr)?),
            alias: lower_ident(&alias),
        }),
        sp::SelectItem::Wildcard(_) => Ok(Expr::Star),
        sp::SelectItem::QualifiedWildcard(..) => Ok(Expr::Star),
    }
}

/// Parse a `FROM a LEFT JOIN b ON ...` clause into a join spine.
pub fn parse_join_clause(fragment: &str) -> Result<JoinSpine, CompileError> {
    let sql = format!("SELECT * {fragment}");
    let statements = Parser::parse_sql(&GenericDialect {}, &sql).map_err(|e| {
        CompileError::InputValidation(format!("failed to parse join clause '{fragment}': {e}"))
    })?;
    let select = single_select(statements, fragment)?;
    let table_with_joins = select.from.into_iter().next().ok_or_else(|| {
        CompileError::InputValidation(format!("join clause '{fragment}' has no FROM"))
    })?;
    lower_table_with_joins(table_with_joins)
}

fn single_select(
    statements: Vec<sp::Statement>,
    fragment: &str,
) -> Result<sp::Select, CompileError> {
    let statement = statements.into_iter().next().ok_or_else(|| {
        CompileError::InputValidation(format!("empty SQL fragment '{fragment}'"))
    })?;
    let query = match statement {
        sp::Statement::Query(q) => q,
        other => {
            return Err(CompileError::InputValidation(format!(
                "fragment '{fragment}' is not an expression: {other}"
            )))
        }
    };
    match *query.body {
        sp::SetExpr::Select(select) => Ok(*select),
        other => Err(CompileError::InputValidation(format!(
            "fragment '{fragment}' is not a plain SELECT: {other}"
        ))),
    }
}

fn lower_ident(ident: &sp::Ident) -> Ident {
    Ident::new(ident.value.clone())
}

pub fn lower_expr(expr: sp::Expr) -> Result<Expr, CompileError> {
    match expr {
        sp::Expr::Identifier(ident) => Ok(Expr::Column {
            table: None,
            name: lower_ident(&ident),
        }),
        sp::Expr::CompoundIdentifier(parts) => {
            let mut idents: Vec<Ident> = parts.iter().map(lower_ident).collect();
            let name = idents.pop().ok_or_else(|| {
                CompileError::InputValidation("empty compound identifier".into())
            })?;
            Ok(Expr::Column {
                table: idents.pop(),
                name,
            })
        }
        sp::Expr::Value(value) => lower_value(value.value),
        sp::Expr::BinaryOp { left, op, right } => Ok(Expr::BinaryOp {
            left: Box::new(lower_expr(*left)?),
            op: lower_binary_op(op)?,
            right: Box::new(lower_expr(*right)?),
        }),
        sp::Expr::UnaryOp { op, expr } => {
            let op = match op {
                sp::UnaryOperator::Not => UnaryOperator::Not,
                sp::UnaryOperator::Minus => UnaryOperator::Minus,
                sp::UnaryOperator::Plus => UnaryOperator::Plus,
                other => {
                    return Err(CompileError::InputValidation(format!(
                        "unsupported unary operator {other:?}"
                    )))
                }
            };
            Ok(Expr::UnaryOp {
                op,
                expr: Box::new(lower_expr(*expr)?),
            })
        }
        sp::Expr::Function(func) => lower_function(func),
        sp::Expr::Case {
            operand,
            conditions,
            else_result,
            ..
        } => Ok(Expr::Case {
            operand: operand.map(|e| lower_expr(*e)).transpose()?.map(Box::new),
            when_clauses: conditions
                .into_iter()
                .map(|when| Ok((lower_expr(when.condition)?, lower_expr(when.result)?)))
                .collect::<Result<Vec<_>, CompileError>>()?,
            else_clause: else_result.map(|e| lower_expr(*e)).transpose()?.map(Box::new),
        }),
        sp::Expr::Nested(inner) => Ok(Expr::Paren(Box::new(lower_expr(*inner)?))),
        sp::Expr::Subquery(query) => Ok(Expr::Subquery(Box::new(lower_query(*query)?))),
        sp::Expr::InList {
            expr,
            list,
            negated,
        } => Ok(Expr::InList {
            expr: Box::new(lower_expr(*expr)?),
            list: list
                .into_iter()
                .map(lower_expr)
                .collect::<Result<Vec<_>, _>>()?,
            negated,
        }),
        sp::Expr::InSubquery {
            expr,
            subquery,
            negated,
        } => Ok(Expr::InSubquery {
            expr: Box::new(lower_expr(*expr)?),
            subquery: Box::new(lower_query(*subquery)?),
            negated,
        }),
        sp::Expr::Between {
            expr,
            negated,
            low,
            high,
        } => Ok(Expr::Between {
            expr: Box::new(lower_expr(*expr)?),
            low: Box::new(lower_expr(*low)?),
            high: Box::new(lower_expr(*high)?),
            negated,
        }),
        sp::Expr::IsNull(e) => Ok(Expr::IsNull {
            expr: Box::new(lower_expr(*e)?),
            negated: false,
        }),
        sp::Expr::IsNotNull(e) => Ok(Expr::IsNull {
            expr: Box::new(lower_expr(*e)?),
            negated: true,
        }),
        sp::Expr::Like {
            negated,
            expr,
            pattern,
            ..
        }
        | sp::Expr::ILike {
            negated,
            expr,
            pattern,
            ..
        } => Ok(Expr::Like {
            expr: Box::new(lower_expr(*expr)?),
            pattern: Box::new(lower_expr(*pattern)?),
            negated,
        }),
        other => Err(CompileError::InputValidation(format!(
            "unsupported SQL construct: {other}"
        ))),
    }
}

fn lower_value(value: sp::Value) -> Result<Expr, CompileError> {
    let literal = match value {
        sp::Value::Number(text, _) => {
            if let Ok(n) = text.parse::<i64>() {
                Literal::Int(n)
            } else {
                text.parse::<f64>().map(Literal::Float).map_err(|_| {
                    CompileError::InputValidation(format!("invalid numeric literal '{text}'"))
                })?
            }
        }
        sp::Value::SingleQuotedString(s) | sp::Value::DoubleQuotedString(s) => Literal::String(s),
        sp::Value::Boolean(b) => Literal::Bool(b),
        sp::Value::Null => Literal::Null,
        other => {
            return Err(CompileError::InputValidation(format!(
                "unsupported literal {other}"
            )))
        }
    };
    Ok(Expr::Literal(literal))
}

fn lower_binary_op(op: sp::BinaryOperator) -> Result<BinaryOperator, CompileError> {
    Ok(match op {
        sp::BinaryOperator::Eq => BinaryOperator::Eq,
        sp::BinaryOperator::NotEq => BinaryOperator::Ne,
        sp::BinaryOperator::Lt => BinaryOperator::Lt,
        sp::BinaryOperator::Gt => BinaryOperator::Gt,
        sp::BinaryOperator::LtEq => BinaryOperator::Lte,
        sp::BinaryOperator::GtEq => BinaryOperator::Gte,
        sp::BinaryOperator::And => BinaryOperator::And,
        sp::BinaryOperator::Or => BinaryOperator::Or,
        sp::BinaryOperator::Plus => BinaryOperator::Plus,
        sp::BinaryOperator::Minus => BinaryOperator::Minus,
        sp::BinaryOperator::Multiply => BinaryOperator::Mul,
        sp::BinaryOperator::Divide => BinaryOperator::Div,
        sp::BinaryOperator::Modulo => BinaryOperator::Mod,
        sp::BinaryOperator::StringConcat => BinaryOperator::Concat,
        other => {
            return Err(CompileError::InputValidation(format!(
                "unsupported binary operator {other}"
            )))
        }
    })
}

fn function_name(name: &sp::ObjectName) -> String {
    name.0
        .last()
        .and_then(|part| part.as_ident())
        .map(|i| i.value.clone())
        .unwrap_or_else(|| name.to_string())
}

fn classify_function(upper: &str) -> FunctionKind {
    if AGGREGATE_FUNCTIONS.contains(&upper) {
        FunctionKind::Aggregate
    } else if SCALAR_FUNCTIONS.contains(&upper) {
        FunctionKind::Scalar
    } else {
        FunctionKind::Anonymous
    }
}

fn lower_function(func: sp::Function) -> Result<Expr, CompileError> {
    let name = function_name(&func.name);
    let upper = name.to_uppercase();
    let kind = classify_function(&upper);
    // Recognized names keep a canonical uppercase spelling; anonymous
    // calls keep the user's spelling until a composer pass resolves them.
    let name = if kind == FunctionKind::Anonymous {
        name
    } else {
        upper.clone()
    };

    let mut distinct = false;
    let mut args = Vec::new();
    match func.args {
        sp::FunctionArguments::None => {}
        sp::FunctionArguments::Subquery(query) => {
            args.push(Expr::Subquery(Box::new(lower_query(*query)?)));
        }
        sp::FunctionArguments::List(list) => {
            distinct = list.duplicate_treatment == Some(sp::DuplicateTreatment::Distinct);
            for arg in list.args {
                match arg {
                    sp::FunctionArg::Unnamed(sp::FunctionArgExpr::Expr(e))
                    | sp::FunctionArg::Named {
                        arg: sp::FunctionArgExpr::Expr(e),
                        ..
                    } => args.push(lower_expr(e)?),
                    sp::FunctionArg::Unnamed(sp::FunctionArgExpr::Wildcard)
                    | sp::FunctionArg::Named {
                        arg: sp::FunctionArgExpr::Wildcard,
                        ..
                    } => {
                        // COUNT(*) carries no argument in our AST.
                    }
                    other => {
                        return Err(CompileError::InputValidation(format!(
                            "unsupported function argument {other}"
                        )))
                    }
                }
            }
        }
    }

    let function = Expr::Function {
        name,
        args,
        kind,
        distinct,
    };

    match func.over {
        None => Ok(function),
        Some(sp::WindowType::WindowSpec(spec)) => Ok(Expr::WindowFunction {
            function: Box::new(function),
            partition_by: spec
                .partition_by
                .into_iter()
                .map(lower_expr)
                .collect::<Result<Vec<_>, _>>()?,
            order_by: spec
                .order_by
                .into_iter()
                .map(|o| {
                    Ok(WindowOrderBy {
                        desc: o.options.asc == Some(false),
                        expr: lower_expr(o.expr)?,
                    })
                })
                .collect::<Result<Vec<_>, CompileError>>()?,
            frame: spec.window_frame.map(lower_window_frame).transpose()?,
        }),
        Some(sp::WindowType::NamedWindow(name)) => Err(CompileError::InputValidation(format!(
            "named windows are not supported: {name}"
        ))),
    }
}

fn lower_window_frame(frame: sp::WindowFrame) -> Result<WindowFrame, CompileError> {
    let kind = match frame.units {
        sp::WindowFrameUnits::Rows => WindowFrameKind::Rows,
        sp::WindowFrameUnits::Range => WindowFrameKind::Range,
        other => {
            return Err(CompileError::InputValidation(format!(
                "unsupported window frame units {other}"
            )))
        }
    };
    Ok(WindowFrame {
        kind,
        start: lower_frame_bound(frame.start_bound)?,
        end: frame.end_bound.map(lower_frame_bound).transpose()?,
    })
}

fn lower_frame_bound(bound: sp::WindowFrameBound) -> Result<WindowFrameBound, CompileError> {
    Ok(match bound {
        sp::WindowFrameBound::CurrentRow => WindowFrameBound::CurrentRow,
        sp::WindowFrameBound::Preceding(None) => WindowFrameBound::UnboundedPreceding,
        sp::WindowFrameBound::Preceding(Some(e)) => {
            WindowFrameBound::Preceding(frame_offset(&e)?)
        }
        sp::WindowFrameBound::Following(None) => WindowFrameBound::UnboundedFollowing,
        sp::WindowFrameBound::Following(Some(e)) => {
            WindowFrameBound::Following(frame_offset(&e)?)
        }
    })
}

fn frame_offset(expr: &sp::Expr) -> Result<u64, CompileError> {
    if let sp::Expr::Value(v) = expr {
        if let sp::Value::Number(text, _) = &v.value {
            if let Ok(n) = text.parse::<u64>() {
                return Ok(n);
            }
        }
    }
    Err(CompileError::InputValidation(format!(
        "unsupported window frame offset {expr}"
    )))
}

fn lower_table_factor(factor: sp::TableFactor) -> Result<TableFactor, CompileError> {
    match factor {
        sp::TableFactor::Table { name, alias, .. } => {
            let mut parts: Vec<Ident> = name
                .0
                .iter()
                .filter_map(|p| p.as_ident())
                .map(lower_ident)
                .collect();
            let table = parts.pop().ok_or_else(|| {
                CompileError::InputValidation("table reference without a name".into())
            })?;
            let schema = parts.pop();
            let catalog = parts.pop();
            Ok(TableFactor::Table(TableRef {
                catalog,
                schema,
                name: table,
                alias: alias.map(|a| lower_ident(&a.name)),
            }))
        }
        sp::TableFactor::Derived {
            subquery, alias, ..
        } => {
            let alias = alias.ok_or_else(|| {
                CompileError::InputValidation("derived table requires an alias".into())
            })?;
            Ok(TableFactor::Derived {
                subquery: Box::new(lower_query(*subquery)?),
                alias: lower_ident(&alias.name),
            })
        }
        other => Err(CompileError::InputValidation(format!(
            "unsupported table factor {other}"
        ))),
    }
}

fn lower_table_with_joins(twj: sp::TableWithJoins) -> Result<JoinSpine, CompileError> {
    let from = lower_table_factor(twj.relation)?;
    let mut joins = Vec::new();
    for join in twj.joins {
        let (kind, constraint) = match join.join_operator {
            sp::JoinOperator::Inner(c) | sp::JoinOperator::Join(c) => (JoinKind::Inner, Some(c)),
            sp::JoinOperator::Left(c) | sp::JoinOperator::LeftOuter(c) => (JoinKind::Left, Some(c)),
            sp::JoinOperator::Right(c) | sp::JoinOperator::RightOuter(c) => {
                (JoinKind::Right, Some(c))
            }
            sp::JoinOperator::FullOuter(c) => (JoinKind::Full, Some(c)),
            sp::JoinOperator::CrossJoin(_) => (JoinKind::Cross, None),
            other => {
                return Err(CompileError::InputValidation(format!(
                    "unsupported join type {other:?}"
                )))
            }
        };
        let on = match constraint {
            Some(sp::JoinConstraint::On(e)) => Some(lower_expr(e)?),
            Some(sp::JoinConstraint::None) | None => None,
            Some(other) => {
                return Err(CompileError::InputValidation(format!(
                    "unsupported join constraint {other:?}"
                )))
            }
        };
        joins.push(Join {
            kind,
            relation: lower_table_factor(join.relation)?,
            on,
        });
    }
    Ok(JoinSpine { from, joins })
}

/// Lower a full subquery into the crate's Select shape.
fn lower_query(query: sp::Query) -> Result<Select, CompileError> {
    let select = match *query.body {
        sp::SetExpr::Select(s) => *s,
        other => {
            return Err(CompileError::InputValidation(format!(
                "unsupported subquery shape {other}"
            )))
        }
    };

    let mut out = Select::new();
    for item in select.projection {
        match item {
            sp::SelectItem::UnnamedExpr(e) => out.projections.push(lower_expr(e)?),
            sp::SelectItem::ExprWithAlias { expr, alias } => out.projections.push(Expr::Alias {
                expr: Box::new(lower_expr(expr)?),
                alias: lower_ident(&alias),
            }),
            sp::SelectItem::Wildcard(_) | sp::SelectItem::QualifiedWildcard(..) => {
                out.projections.push(Expr::Star)
            }
        }
    }
    if let Some(twj) = select.from.into_iter().next() {
        let spine = lower_table_with_joins(twj)?;
        out.from = Some(spine.from);
        out.joins = spine.joins;
    }
    if let Some(selection) = select.selection {
        out.where_clause = Some(lower_expr(selection)?);
    }
    if let sp::GroupByExpr::Expressions(exprs, _) = select.group_by {
        for e in exprs {
            out.group_by.push(lower_expr(e)?);
        }
    }
    Ok(out)
}
