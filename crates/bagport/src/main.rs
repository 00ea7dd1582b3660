mod progress;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bagport_bucket::{S3ObjectStore, StoreConfig};
use bagport_core::db;
use bagport_core::pipeline::{self, ExportConfig, FaultTolerance, RunReport};

use crate::progress::ConsoleProgress;

#[derive(Parser, Debug)]
#[command(author, version, about = "BAG SQLite to Parquet export tooling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export every user table to the object store
    Export(ExportArgs),
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Path to the BAG SQLite database
    #[arg(long, env = "BAG_SQLITE_PATH")]
    db_path: PathBuf,

    /// Directory for scratch parquet files (defaults to the system temp dir)
    #[arg(long)]
    scratch_dir: Option<PathBuf>,

    /// Remote key prefix for uploaded objects
    #[arg(long, default_value = "bag/")]
    prefix: String,

    /// Keep processing remaining tables after a per-table failure
    #[arg(long)]
    keep_going: bool,

    /// Emit the run report as JSON on stdout
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Export(args) => run_export(args).await,
    }
}

async fn run_export(args: ExportArgs) -> Result<()> {
    dotenvy::dotenv().ok();

    // Pre-flight: resolve the store credential before touching any table, so
    // a misconfigured run does no partial work.
    let store_config = StoreConfig::from_env().context("object store configuration")?;
    let store = S3ObjectStore::new(store_config)
        .await
        .context("failed to build object store client")?;

    let pool = db::connect(&args.db_path)
        .await
        .with_context(|| format!("failed to open {}", args.db_path.display()))?;

    let config = ExportConfig {
        scratch_dir: args.scratch_dir.unwrap_or_else(std::env::temp_dir),
        key_prefix: args.prefix,
        fault_tolerance: if args.keep_going {
            FaultTolerance::ContinueOnError
        } else {
            FaultTolerance::FailFast
        },
    };

    let progress = ConsoleProgress::new();
    let report = pipeline::run(&pool, &store, &config, &progress).await?;
    progress.finish();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    summarize(&report);

    if report.succeeded() {
        Ok(())
    } else {
        anyhow::bail!(
            "{} of {} tables failed",
            report.failures().count(),
            report.outcomes.len()
        )
    }
}

fn summarize(report: &RunReport) {
    for outcome in &report.outcomes {
        match (&outcome.remote_key, &outcome.error) {
            (Some(key), _) => {
                info!(table = %outcome.table, rows = outcome.rows, key = %key, "uploaded")
            }
            (None, Some(error)) => {
                warn!(table = %outcome.table, error = %error, "failed")
            }
            (None, None) => {}
        }
    }
}
