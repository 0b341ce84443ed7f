//! SQL building blocks: the typed expression AST, the query tree,
//! dialect-aware serialization and the fragment parser.

pub mod catalog;
pub mod dialect;
pub mod expr;
pub mod ident;
pub mod lower;
pub mod query;
pub mod token;
