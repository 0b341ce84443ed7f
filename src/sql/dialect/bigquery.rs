//! BigQuery SQL dialect.
//!
//! Backtick identifier quoting; identifier bodies must not carry the
//! reserved special characters, which the composer rewrites to underscore
//! before serialization.

use super::{QuoteStyle, SqlDialect};

/// BigQuery SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct BigQuery;

impl SqlDialect for BigQuery {
    fn name(&self) -> &'static str {
        "bigquery"
    }

    fn quote_style(&self) -> QuoteStyle {
        QuoteStyle::Backtick
    }
}
