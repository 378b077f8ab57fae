//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod list;
mod run;
mod validate;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// List defined pipelines
    List,
    /// Check the definitions file without running anything
    Validate,
    /// Run pipelines on demand
    Run {
        /// Name of the pipeline to run
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        name: Option<String>,

        /// Run every defined pipeline concurrently
        #[arg(long)]
        all: bool,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::List => list::list_pipelines(config),
        Commands::Validate => validate::validate_definitions(config),
        Commands::Run { name, all } => run::run_pipelines(config, name, all).await,
    }
}
