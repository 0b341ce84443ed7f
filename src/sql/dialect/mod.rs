//! SQL dialect definitions and formatting rules.
//!
//! The compiler only varies serialization by identifier-quoting family:
//! backtick (BigQuery, MySQL), double-quote (Postgres, Oracle, Snowflake,
//! DuckDB, SQLite) and bracket (T-SQL). Everything else the dialects share.

mod bigquery;
mod duckdb;
mod mysql;
mod oracle;
mod postgres;
mod snowflake;
mod sqlite;
mod tsql;

pub use bigquery::BigQuery;
pub use duckdb::DuckDb;
pub use mysql::MySql;
pub use oracle::Oracle;
pub use postgres::Postgres;
pub use snowflake::Snowflake;
pub use sqlite::Sqlite;
pub use tsql::TSql;

use crate::error::CompileError;

pub mod helpers;

/// Identifier quoting family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
    Double,
    Backtick,
    Bracket,
}

/// SQL dialect trait - defines how SQL constructs are rendered.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    fn quote_style(&self) -> QuoteStyle;

    /// Quote an identifier (table, column, alias).
    fn quote_identifier(&self, ident: &str) -> String {
        match self.quote_style() {
            QuoteStyle::Double => helpers::quote_double(ident),
            QuoteStyle::Backtick => helpers::quote_backtick(ident),
            QuoteStyle::Bracket => helpers::quote_bracket(ident),
        }
    }

    /// Quote a string literal.
    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_single(s)
    }

    /// Format a boolean literal.
    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }
}

/// Known target dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    BigQuery,
    Postgres,
    MySql,
    Oracle,
    TSql,
    Snowflake,
    #[default]
    DuckDb,
    Sqlite,
}

impl Dialect {
    pub fn as_dialect(self) -> &'static dyn SqlDialect {
        match self {
            Dialect::BigQuery => &BigQuery,
            Dialect::Postgres => &Postgres,
            Dialect::MySql => &MySql,
            Dialect::Oracle => &Oracle,
            Dialect::TSql => &TSql,
            Dialect::Snowflake => &Snowflake,
            Dialect::DuckDb => &DuckDb,
            Dialect::Sqlite => &Sqlite,
        }
    }

    pub fn name(self) -> &'static str {
        self.as_dialect().name()
    }

    pub fn quote_style(self) -> QuoteStyle {
        self.as_dialect().quote_style()
    }

    pub fn quote_identifier(self, ident: &str) -> String {
        self.as_dialect().quote_identifier(ident)
    }

    pub fn quote_string(self, s: &str) -> String {
        self.as_dialect().quote_string(s)
    }

    pub fn format_bool(self, b: bool) -> &'static str {
        self.as_dialect().format_bool(b)
    }

    /// Whether the composer's identifier-quoting pass applies. Only BigQuery
    /// requires every identifier quoted with its special characters rewritten.
    pub fn requires_quoted_identifiers(self) -> bool {
        matches!(self, Dialect::BigQuery)
    }
}

impl std::str::FromStr for Dialect {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bigquery" => Ok(Dialect::BigQuery),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "mysql" => Ok(Dialect::MySql),
            "oracle" => Ok(Dialect::Oracle),
            "mssql" | "tsql" => Ok(Dialect::TSql),
            "snowflake" => Ok(Dialect::Snowflake),
            "duckdb" => Ok(Dialect::DuckDb),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(CompileError::Dialect(format!(
                "unsupported dialect '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_dialect_from_str_aliases() {
        assert_eq!(Dialect::from_str("postgresql").unwrap(), Dialect::Postgres);
        assert_eq!(Dialect::from_str("tsql").unwrap(), Dialect::TSql);
        assert_eq!(Dialect::from_str("MSSQL").unwrap(), Dialect::TSql);
        assert!(Dialect::from_str("teradata").is_err());
    }

    #[test]
    fn test_quote_styles() {
        assert_eq!(Dialect::BigQuery.quote_identifier("a"), "`a`");
        assert_eq!(Dialect::MySql.quote_identifier("a"), "`a`");
        assert_eq!(Dialect::Snowflake.quote_identifier("a"), "\"a\"");
        assert_eq!(Dialect::TSql.quote_identifier("a"), "[a]");
    }
}
