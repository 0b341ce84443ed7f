//! Oracle dialect.
//!
//! Double-quote identifier quoting; booleans render as 1/0.

use super::{helpers, QuoteStyle, SqlDialect};

/// Oracle dialect.
#[derive(Debug, Clone, Copy)]
pub struct Oracle;

impl SqlDialect for Oracle {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn quote_style(&self) -> QuoteStyle {
        QuoteStyle::Double
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }
}
