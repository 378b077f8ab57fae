//! Definitions file validation

use anyhow::Result;
use colored::*;

use crate::config::Config;
use crate::definitions;

/// Load and check the definitions file, reporting pipelines that cannot run
pub fn validate_definitions(config: &Config) -> Result<()> {
    let pipelines = definitions::load(&config.definitions_file)?;

    for pipeline in pipelines.iter().filter(|p| p.jobs.is_empty()) {
        println!(
            "{}",
            format!("! Pipeline {} has no jobs and cannot be run", pipeline.name).yellow()
        );
    }

    println!(
        "{}",
        format!(
            "✓ {} is valid ({} pipeline(s))",
            config.definitions_file.display(),
            pipelines.len()
        )
        .green()
        .bold()
    );
    Ok(())
}
