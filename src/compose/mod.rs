//! Composer pipeline: the fixed, ordered sequence of IR rewrites that
//! turns the parsed SMQ into an emittable SELECT tree.
//!
//! The pass order is contractual; each pass is idempotent so re-running
//! the pipeline over already-composed IR changes nothing.

pub mod passes;
pub mod write_sql;

use crate::config::CompileConfig;
use crate::error::CompileResult;
use crate::manifest::Manifest;
use crate::smq::{QueryIr, Smq};
use crate::sql::query::Select;

/// Runs the rewrite passes and assembles the final SELECT tree.
pub struct Composer<'a> {
    manifest: &'a Manifest,
    config: &'a CompileConfig,
}

impl<'a> Composer<'a> {
    pub fn new(manifest: &'a Manifest, config: &'a CompileConfig) -> Self {
        Self { manifest, config }
    }

    #[tracing::instrument(skip_all)]
    pub fn compose(&self, ir: &mut QueryIr, smq: &Smq) -> CompileResult<Select> {
        passes::move_dimension_exprs::run(ir, smq);
        passes::push_down_aggregates::run(ir, smq, self.manifest)?;
        passes::move_groups_to_select::run(ir);
        passes::include_original_metrics::run(ir, smq)?;
        passes::resolve_anonymous_functions::run(ir);
        passes::inline_subquery_tables::run(ir, self.manifest, self.config.dialect)?;
        passes::complete_deriv_inputs::run(ir, self.manifest)?;
        passes::group_select_parity::run(ir);
        passes::complete_agg_inputs::run(ir, smq, self.manifest)?;
        passes::add_default_join::run(ir, smq, self.manifest)?;
        passes::alias_bare_expressions::run(ir);
        if self.config.dialect.requires_quoted_identifiers() {
            passes::quote_identifiers::run(ir);
        }

        write_sql::write_sql(ir, smq, self.manifest, self.config.dialect)
    }
}
