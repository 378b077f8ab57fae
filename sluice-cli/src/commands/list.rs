//! Pipeline listing

use anyhow::Result;
use colored::*;
use sluice_core::PipelineDefinition;

use crate::config::Config;
use crate::definitions;

/// List all defined pipelines
pub fn list_pipelines(config: &Config) -> Result<()> {
    let pipelines = definitions::load(&config.definitions_file)?;

    if pipelines.is_empty() {
        println!("{}", "No pipelines defined.".yellow());
    } else {
        println!(
            "{}",
            format!("Found {} pipeline(s):", pipelines.len()).bold()
        );
        println!();
        for pipeline in &pipelines {
            print_pipeline_summary(pipeline);
        }
    }

    Ok(())
}

/// Print a pipeline summary
fn print_pipeline_summary(pipeline: &PipelineDefinition) {
    println!("  {} {}", "▸".cyan(), pipeline.name.bold());
    println!("    Jobs:     {}", pipeline.jobs.len().to_string().cyan());
    if let Some(schedule) = &pipeline.schedule {
        println!("    Schedule: {}", schedule.dimmed());
    }
    if let Some(alert) = &pipeline.alert {
        println!("    Alert:    {}", alert.dimmed());
    }
    for job in &pipeline.jobs {
        println!("      - {} {}", job.name, format!("({})", job.command).dimmed());
    }
    println!();
}
