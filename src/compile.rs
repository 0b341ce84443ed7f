//! Top-level compile entry points.

use serde::{Deserialize, Serialize};

use crate::compose::Composer;
use crate::config::CompileConfig;
use crate::error::{CompileError, CompileResult};
use crate::inline::inline_ctes;
use crate::manifest::Manifest;
use crate::metadata::{collect_metadata, ColumnMeta};
use crate::smq::parse::SmqParser;
use crate::smq::Smq;
use crate::sql::lower::parse_expr;

/// A successful compile: the SQL text and one metadata record per output
/// column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileOutput {
    pub sql: String,
    pub metadata: Vec<ColumnMeta>,
}

/// Compile one SMQ against a manifest.
///
/// Purely synchronous and free of shared state: any number of compiles
/// may run concurrently over the same manifest value.
#[tracing::instrument(skip_all, fields(dialect = %config.dialect))]
pub fn compile_smq(
    smq: &Smq,
    manifest: &Manifest,
    config: &CompileConfig,
) -> CompileResult<CompileOutput> {
    smq.validate()?;
    validate_metric_entries(smq, manifest)?;

    let parser = SmqParser::new(manifest, config);
    let mut ir = parser.parse(smq)?;

    let composer = Composer::new(manifest, config);
    let mut select = composer.compose(&mut ir, smq)?;

    if config.inline_ctes {
        select = inline_ctes(&select);
    }

    let metadata = collect_metadata(&select, manifest);
    let sql = select.to_sql(config.dialect);
    tracing::debug!(sql_len = sql.len(), columns = metadata.len(), "compile finished");

    Ok(CompileOutput { sql, metadata })
}

/// Compile, splitting the SMQ across model sets when the planner reports
/// disconnected components. Returns one output per compiled partition.
pub fn compile_smq_partitioned(
    smq: &Smq,
    manifest: &Manifest,
    config: &CompileConfig,
) -> CompileResult<Vec<CompileOutput>> {
    match compile_smq(smq, manifest, config) {
        Ok(output) => Ok(vec![output]),
        Err(CompileError::Join(join_error)) => {
            tracing::info!(
                sets = join_error.model_sets.len(),
                "join failed; splitting the SMQ across model sets"
            );
            let partitions =
                crate::distribute::distribute_smq(smq, &join_error.model_sets, manifest);
            if partitions.is_empty() {
                return Err(CompileError::InputValidation(format!(
                    "the SMQ could not be distributed over the disjoint model sets \
                     {:?}; add joins or split the request",
                    join_error.model_sets
                )));
            }
            partitions
                .iter()
                .map(|(_, partition)| compile_smq(partition, manifest, config))
                .collect()
        }
        Err(other) => Err(other),
    }
}

/// Each metrics entry must be a known metric name or valid SQL over the
/// manifest's namespaces.
fn validate_metric_entries(smq: &Smq, manifest: &Manifest) -> CompileResult<()> {
    for entry in smq.metrics() {
        if manifest.metric(entry).is_some() {
            continue;
        }
        if parse_expr(entry).is_err() {
            let available: Vec<&str> =
                manifest.metrics.iter().map(|m| m.name.as_str()).collect();
            return Err(CompileError::InputValidation(format!(
                "metric '{entry}' not found; available metrics: {}",
                available.join(", ")
            )));
        }
    }
    Ok(())
}
