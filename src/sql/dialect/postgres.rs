//! PostgreSQL dialect.

use super::{QuoteStyle, SqlDialect};

/// PostgreSQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_style(&self) -> QuoteStyle {
        QuoteStyle::Double
    }
}
