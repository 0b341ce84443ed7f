//! # Strata
//!
//! A semantic-model query compiler that emits multi-dialect SQL.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        Semantic model YAML + sources.yml + ddl.sql       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [manifest assembler / linter]
//! ┌─────────────────────────────────────────────────────────┐
//! │                       Manifest                           │
//! └─────────────────────────────────────────────────────────┘
//!                          │   + SMQ (metrics, group_by, ...)
//!                          ▼ [SMQ parser]
//! ┌─────────────────────────────────────────────────────────┐
//! │     Per-layer IR (projection layers | agg | deriv)       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [composer pipeline + join planner]
//! ┌─────────────────────────────────────────────────────────┐
//! │              SELECT tree (CTEs + final SELECT)           │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [writer + metadata collector]
//! ┌─────────────────────────────────────────────────────────┐
//! │                SQL string + column metadata              │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! A compile is a pure function from `(SMQ, manifest, config)` to
//! `(sql, metadata)`. The manifest is read-only during compiles and may
//! be shared across threads; the per-layer IR is owned by its compile.

pub mod compile;
pub mod compose;
pub mod config;
pub mod distribute;
pub mod error;
pub mod inline;
pub mod join;
pub mod lint;
pub mod manifest;
pub mod metadata;
pub mod smq;
pub mod sql;

pub use compile::{compile_smq, compile_smq_partitioned, CompileOutput};
pub use config::CompileConfig;
pub use error::{CompileError, CompileResult, JoinError};
pub use lint::{lint, LintIssue, LintReport, Severity};
pub use manifest::{assemble_manifest, Manifest, ManifestError};
pub use metadata::ColumnMeta;
pub use smq::Smq;
pub use sql::dialect::Dialect;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::compile::{compile_smq, compile_smq_partitioned, CompileOutput};
    pub use crate::config::CompileConfig;
    pub use crate::error::{CompileError, CompileResult, JoinError};
    pub use crate::lint::{lint, LintReport};
    pub use crate::manifest::{assemble_manifest, Manifest};
    pub use crate::smq::Smq;
    pub use crate::sql::dialect::{Dialect, SqlDialect};
    pub use crate::sql::expr::{col, table_col, Expr};
    pub use crate::sql::query::Select;
}
