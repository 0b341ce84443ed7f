//! Snowflake dialect.

use super::{QuoteStyle, SqlDialect};

/// Snowflake dialect.
#[derive(Debug, Clone, Copy)]
pub struct Snowflake;

impl SqlDialect for Snowflake {
    fn name(&self) -> &'static str {
        "snowflake"
    }

    fn quote_style(&self) -> QuoteStyle {
        QuoteStyle::Double
    }
}
