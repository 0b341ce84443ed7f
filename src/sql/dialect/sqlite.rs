//! SQLite dialect.

use super::{QuoteStyle, SqlDialect};

/// SQLite dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_style(&self) -> QuoteStyle {
        QuoteStyle::Double
    }
}
