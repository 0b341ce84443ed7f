//! Strata CLI: lint a model directory, assemble its manifest, or compile
//! an SMQ file against it.

use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use clap::{Parser, Subcommand};

use strata::config::CompileConfig;
use strata::manifest::assemble_manifest;
use strata::smq::Smq;
use strata::sql::dialect::Dialect;

#[derive(Parser)]
#[command(name = "strata", version, about = "Semantic-model query compiler")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Lint a semantic model directory.
    Lint {
        /// Directory holding sources.yml, semantic_models/ and ddl.sql.
        base_dir: PathBuf,
    },
    /// Assemble and print the manifest as JSON.
    Manifest {
        base_dir: PathBuf,
    },
    /// Compile an SMQ JSON file to SQL.
    Compile {
        /// Directory holding the semantic model inputs.
        #[arg(long)]
        manifest: PathBuf,
        /// SMQ request as a JSON file.
        #[arg(long)]
        smq: PathBuf,
        /// Target dialect.
        #[arg(long, default_value = "duckdb")]
        dialect: String,
        /// Emit nested subqueries instead of CTEs.
        #[arg(long)]
        inline: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    match Cli::parse().command {
        Command::Lint { base_dir } => {
            let report = strata::lint(&base_dir);
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("failed to serialize lint report: {e}");
                    return ExitCode::FAILURE;
                }
            }
            if report.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Command::Manifest { base_dir } => match assemble_manifest(&base_dir) {
            Ok(manifest) => {
                match serde_json::to_string_pretty(&manifest) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("failed to serialize manifest: {e}");
                        return ExitCode::FAILURE;
                    }
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{e}");
                ExitCode::FAILURE
            }
        },
        Command::Compile {
            manifest,
            smq,
            dialect,
            inline,
        } => {
            let dialect = match Dialect::from_str(&dialect) {
                Ok(dialect) => dialect,
                Err(e) => {
                    eprintln!("{e}");
                    return ExitCode::FAILURE;
                }
            };
            let manifest = match assemble_manifest(&manifest) {
                Ok(manifest) => manifest,
                Err(e) => {
                    eprintln!("{e}");
                    return ExitCode::FAILURE;
                }
            };
            let smq: Smq = match std::fs::read_to_string(&smq)
                .map_err(|e| e.to_string())
                .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()))
            {
                Ok(smq) => smq,
                Err(e) => {
                    eprintln!("invalid SMQ file: {e}");
                    return ExitCode::FAILURE;
                }
            };

            let config = CompileConfig::new(dialect).with_inline_ctes(inline);
            match strata::compile_smq_partitioned(&smq, &manifest, &config) {
                Ok(outputs) => {
                    match serde_json::to_string_pretty(&outputs) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("failed to serialize output: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("{e}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}
