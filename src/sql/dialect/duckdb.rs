//! DuckDB dialect.

use super::{QuoteStyle, SqlDialect};

/// DuckDB dialect.
#[derive(Debug, Clone, Copy)]
pub struct DuckDb;

impl SqlDialect for DuckDb {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    fn quote_style(&self) -> QuoteStyle {
        QuoteStyle::Double
    }
}
