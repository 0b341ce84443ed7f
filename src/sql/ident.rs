//! SQL identifiers with explicit quoting state.
//!
//! Identifiers stay unquoted by default; the composer marks them quoted
//! for the backtick dialect family, and the serializer applies the
//! dialect's quote character only then.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Characters BigQuery cannot carry inside an identifier body.
/// Surrounding whitespace collapses into the replacement underscore.
static SPECIAL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\s*[!"$()*,./;?@\[\]\\^`{}~]\s*"#).expect("special char pattern"));

/// A single SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ident {
    pub text: String,
    pub quoted: bool,
}

impl Ident {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quoted: false,
        }
    }

    pub fn quoted(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quoted: true,
        }
    }

    /// Substitute reserved special characters with underscore, collapsing
    /// surrounding whitespace into the replacement.
    pub fn rewrite_special_chars(&mut self) {
        self.text = rewrite_special_chars(&self.text);
    }
}

impl std::fmt::Display for Ident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

pub fn rewrite_special_chars(text: &str) -> String {
    SPECIAL_CHARS.replace_all(text, "_").into_owned()
}
