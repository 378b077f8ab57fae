//! On-demand pipeline runs

use std::sync::Arc;

use anyhow::{Result, bail};
use colored::*;
use sluice_core::{PipelineDefinition, Status};
use sluice_runner::{FanoutReporter, MemoryReporter, Reporter, RunHandle, Runner, TracingReporter};
use tracing::warn;

use crate::config::Config;
use crate::console::{ConsoleReporter, colorize_status};
use crate::definitions;

/// Run one pipeline, or all of them with `all`, and wait for the outcome
///
/// With `all`, pipelines without jobs are skipped. Runs that started are
/// always waited on, even if a later one fails to start. Fails if any run
/// fails or could not be started.
pub async fn run_pipelines(config: &Config, name: Option<String>, all: bool) -> Result<()> {
    let pipelines = definitions::load(&config.definitions_file)?;

    let targets: Vec<PipelineDefinition> = match name {
        Some(name) if !all => vec![definitions::find(&pipelines, &name)?.clone()],
        _ => pipelines.into_iter().filter(runnable).collect(),
    };

    if targets.is_empty() {
        println!("{}", "No pipelines to run.".yellow());
        return Ok(());
    }

    let memory = Arc::new(MemoryReporter::new());
    let reporter = build_reporter(memory.clone(), config.log_events);
    let runner = Runner::new(config.runner.clone());

    let mut handles = Vec::with_capacity(targets.len());
    let mut start_error = None;
    for definition in targets {
        let name = definition.name.clone();
        match runner.run(Arc::new(definition), reporter.clone()) {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                let context = format!("Failed to start pipeline '{}'", name);
                start_error = Some(anyhow::Error::new(e).context(context));
                break;
            }
        }
    }

    for handle in &handles {
        handle.wait().await;
    }

    if !handles.is_empty() {
        println!();
    }
    let mut failed = 0;
    for handle in &handles {
        if !print_summary(&memory, handle) {
            failed += 1;
        }
    }

    if let Some(e) = start_error {
        return Err(e);
    }
    if failed > 0 {
        bail!("{} of {} pipeline run(s) failed", failed, handles.len());
    }
    Ok(())
}

/// Whether a pipeline has anything to run, warning when it does not
fn runnable(pipeline: &PipelineDefinition) -> bool {
    if pipeline.jobs.is_empty() {
        warn!("Skipping pipeline '{}': no jobs defined", pipeline.name);
        println!(
            "{}",
            format!("! Pipeline {} has no jobs and cannot be run", pipeline.name).yellow()
        );
        return false;
    }
    true
}

fn build_reporter(memory: Arc<MemoryReporter>, log_events: bool) -> Arc<dyn Reporter> {
    let state: Arc<dyn Reporter> = if log_events {
        Arc::new(FanoutReporter::new(memory).with_observer(Arc::new(TracingReporter::new())))
    } else {
        memory
    };
    Arc::new(ConsoleReporter::new(state))
}

/// Print the final status of a run and its jobs
///
/// Returns whether the pipeline completed.
fn print_summary(memory: &MemoryReporter, handle: &RunHandle) -> bool {
    let Some(pipeline) = memory.pipeline(&handle.pipeline_id) else {
        println!(
            "{}",
            format!("Pipeline {} was not recorded", handle.pipeline_id).red()
        );
        return false;
    };

    println!(
        "{} {} {}",
        pipeline.name.bold(),
        pipeline.id.to_string().dimmed(),
        colorize_status(pipeline.status)
    );
    for job in memory.jobs_for(&handle.pipeline_id) {
        let elapsed = job.updated_at - job.created_at;
        println!(
            "  {:<20} {:<10} {}",
            job.name,
            colorize_status(job.status),
            format!("{} line(s), {}ms", job.lines.len(), elapsed.num_milliseconds()).dimmed()
        );
    }

    pipeline.status == Status::Completed
}
