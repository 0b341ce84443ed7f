//! T-SQL (SQL Server) dialect.
//!
//! Bracket identifier quoting; booleans render as 1/0.

use super::{helpers, QuoteStyle, SqlDialect};

/// T-SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct TSql;

impl SqlDialect for TSql {
    fn name(&self) -> &'static str {
        "tsql"
    }

    fn quote_style(&self) -> QuoteStyle {
        QuoteStyle::Bracket
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }
}
