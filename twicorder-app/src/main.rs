use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use twicorder_common::observability::{init_logging, LogConfig};

mod export;
mod wiring;

/// Declarative Twitter data acquisition (spec.md §1).
#[derive(Parser)]
#[command(name = "twicorder", version, about)]
struct Cli {
    /// OAuth credentials YAML (spec.md §6).
    #[arg(long, default_value = "credentials.yaml", env = "TWICORDER_CREDENTIALS")]
    credentials: PathBuf,

    /// Task list YAML mapping query kind to scheduled tasks (spec.md §3/§6).
    #[arg(long, default_value = "tasks.yaml", env = "TWICORDER_TASKS")]
    tasks: PathBuf,

    /// Runtime config YAML (spec.md §4.10/§6).
    #[arg(long, default_value = "config.yaml", env = "TWICORDER_CONFIG")]
    config: PathBuf,

    /// Where the App-Data Store keeps last-seen ids and tweet history.
    #[arg(long, default_value = "sqlite://twicorder.db", env = "DATABASE_URL")]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the Scheduler and run until interrupted (ctrl-c).
    Run,
    /// Flatten captured NDJSON under an output directory into a relational
    /// sink. The exporter itself is an out-of-scope collaborator
    /// (spec.md §1); this only documents the contract.
    Export {
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install().ok();
    init_logging(LogConfig::default())?;

    let cli = Cli::parse();
    match cli.command {
        Command::Run => {
            let handle = wiring::build(&cli.credentials, &cli.tasks, &cli.config, &cli.database_url)
                .await
                .context("failed to assemble the scheduler")?;
            wiring::run(handle).await
        }
        Command::Export { output_dir } => {
            export::run(output_dir.unwrap_or_else(|| PathBuf::from("output"))).await
        }
    }
}
