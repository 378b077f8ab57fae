//! Configuration module
//!
//! Combines command-line flags with the runner's environment configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use sluice_runner::RunnerConfig;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path of the pipeline definitions file
    pub definitions_file: PathBuf,

    /// Settings handed to every run
    pub runner: RunnerConfig,

    /// Mirror lifecycle events into the tracing log
    pub log_events: bool,
}

impl Config {
    /// Builds configuration from parsed flags and `SLUICE_*` environment variables
    ///
    /// `--shell` wins over `SLUICE_SHELL`.
    pub fn load(
        definitions_file: PathBuf,
        shell: Option<String>,
        log_events: bool,
    ) -> Result<Self> {
        let mut runner = RunnerConfig::from_env().context("Invalid runner configuration")?;
        if let Some(shell) = shell {
            runner = runner.with_shell(shell);
        }
        runner.validate().context("Invalid runner configuration")?;

        Ok(Self {
            definitions_file,
            runner,
            log_events,
        })
    }
}
