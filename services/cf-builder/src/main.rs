//! Capacity-factor store builder.
//!
//! Runs the tiled pipeline over a weather cutout and prints the run summary
//! as JSON on stdout. Logs go to stderr.
//!
//! Exit status: 0 when every selected tile was written or skipped, 1 when at
//! least one tile failed, 2 when the run could not start or was aborted.

mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
use zarrs_filesystem::FilesystemStore;

use cf_pipeline::{Pipeline, StoreStatus};
use cf_store::CfStore;

use crate::cli::Args;

fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .json()
        .init();

    let result = if args.status {
        print_status(&args).map(|_| 0)
    } else {
        run(&args)
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!(error = %format!("{:#}", e), "Run failed");
            eprintln!("error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn run(args: &Args) -> Result<u8> {
    let config = cli::build_config(args)?;

    info!(
        cutout = %config.cutout.display(),
        output = %config.output.display(),
        technologies = ?config.technology_names(),
        prepare = ?config.prepare,
        "Starting capacity-factor build"
    );

    let pipeline = Pipeline::from_config(config).context("failed to open cutout or output")?;

    match pipeline.run() {
        Ok(summary) => {
            print_json(&summary)?;
            Ok(if summary.exit_code() == 0 { 0 } else { 1 })
        }
        Err(e) => {
            if let Some(summary) = e.summary() {
                print_json(summary)?;
            }
            Err(e).context("capacity-factor run aborted")
        }
    }
}

fn print_status(args: &Args) -> Result<()> {
    let config = cli::build_status_config(args)?;
    let path = &config.output;
    if !path.is_dir() {
        bail!("{} is not a directory", path.display());
    }

    let storage = FilesystemStore::new(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let store = CfStore::open_existing(Arc::new(storage))
        .with_context(|| format!("failed to open store at {}", path.display()))?;
    let status = StoreStatus::read(&store).context("failed to read store status")?;

    info!(
        completed = status.completed.len(),
        n_lat = status.n_lat,
        "Store status"
    );
    print_json(&status)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
