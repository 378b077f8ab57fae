//! Sluice CLI
//!
//! Loads pipeline definitions from a file and runs them on the local host.

mod commands;
mod config;
mod console;
mod definitions;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sluice")]
#[command(about = "Sluice pipeline runner", long_about = None)]
struct Cli {
    /// Pipeline definitions file
    #[arg(
        short,
        long,
        global = true,
        env = "SLUICE_PIPELINES",
        default_value = "pipelines.json"
    )]
    file: PathBuf,

    /// Shell used to interpret job commands
    #[arg(long, global = true)]
    shell: Option<String>,

    /// Also emit lifecycle events as log records
    #[arg(long, global = true)]
    log_events: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sluice=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.file, cli.shell, cli.log_events)?;

    handle_command(cli.command, &config).await
}
