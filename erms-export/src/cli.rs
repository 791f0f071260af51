/// This module implements the CLI interface for erms-export: command
/// parsing, argument validation and the main entrypoint.
///
/// All extraction logic (mapping, traversal, export) lives in the
/// [`erms-export-core`] crate. This module is strictly CLI glue: it loads
/// the YAML config and the JSON request, wires up the shipped collaborators
/// (snapshot repository, directory profile store, validation stub) and
/// prints the run's outcome as JSON.
///
/// ## How To Use
/// - Command-line users: run the installed `erms-export` binary with
///   `--help`.
/// - Programmatic/integration use: call [`run`] with a constructed [`Cli`].
use crate::load_config::load_config;
use crate::repository::SnapshotRepository;
use crate::store::DirProfileStore;
use crate::validate::WellFormednessValidator;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use erms_export_core::extract::{extract, ExtractionError, ExtractionRequest};
use std::fs;
use std::path::PathBuf;

/// CLI for erms-export: extract ERMS repository subtrees into EAD finding
/// aids with a mirrored file export.
#[derive(Parser)]
#[clap(
    name = "erms-export",
    version,
    about = "Extract ERMS repository content into an EAD finding aid and a mirrored export directory"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one extraction according to the given config and request
    Extract {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Path to the JSON extraction request
        #[clap(long)]
        request: PathBuf,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Extract { config, request } => {
            let config = load_config(config)?;
            let request_content = fs::read_to_string(&request)
                .with_context(|| format!("Failed to read request file {request:?}"))?;
            let request: ExtractionRequest = serde_json::from_str(&request_content)
                .with_context(|| format!("Failed to parse request file {request:?}"))?;
            tracing::info!(command = "extract", mapping = %request.mapping_name, "Starting extraction");

            let template = fs::read_to_string(&config.ead_template).with_context(|| {
                format!("Failed to read EAD template {:?}", config.ead_template)
            })?;
            let repository = SnapshotRepository::load(&config.repository_snapshot)?;
            let profiles = DirProfileStore::new(&config.mappings_dir);
            let validator = WellFormednessValidator;

            let result = extract(
                &request,
                &repository,
                &profiles,
                &validator,
                &template,
                &config.export_root,
            )
            .await;

            match result {
                Ok(report) => {
                    tracing::info!(command = "extract", ?report, "Extraction complete");
                    let envelope = serde_json::json!({
                        "success": true,
                        "report": report,
                    });
                    println!("{}", serde_json::to_string_pretty(&envelope)?);
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "extract", error = %e, "Extraction failed");
                    let mut envelope = serde_json::json!({
                        "success": false,
                        "message": e.to_string(),
                    });
                    if let ExtractionError::Validation { message } = &e {
                        envelope["validationError"] = serde_json::json!(message);
                    }
                    println!("{}", serde_json::to_string_pretty(&envelope)?);
                    Err(e.into())
                }
            }
        }
    }
}
