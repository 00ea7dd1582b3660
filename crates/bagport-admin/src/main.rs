use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use bagport_core::{db, maintenance};

#[derive(Parser, Debug)]
#[command(author, version, about = "BAG database maintenance tooling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drop stale loader tables and compact the database
    DbShrink(DbShrinkArgs),
}

#[derive(Args, Debug)]
struct DbShrinkArgs {
    /// Path to the BAG SQLite database
    #[arg(long, env = "BAG_SQLITE_PATH")]
    db_path: PathBuf,

    /// Table to drop; repeat for multiple tables
    #[arg(long = "table")]
    tables: Vec<String>,

    /// Drop tables without reclaiming file space afterwards
    #[arg(long)]
    skip_vacuum: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::DbShrink(args) => handle_db_shrink(args).await,
    }
}

async fn handle_db_shrink(args: DbShrinkArgs) -> Result<()> {
    dotenvy::dotenv().ok();

    let pool = db::connect(&args.db_path)
        .await
        .with_context(|| format!("failed to open {}", args.db_path.display()))?;

    let dropped = maintenance::drop_stale_tables(&pool, &args.tables).await?;
    info!(requested = args.tables.len(), dropped, "stale tables removed");

    if !args.skip_vacuum {
        maintenance::vacuum(&pool).await?;
    }

    info!("ready");
    Ok(())
}
