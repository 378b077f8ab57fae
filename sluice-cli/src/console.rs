//! Console rendering of lifecycle events

use std::sync::Arc;

use colored::*;
use sluice_core::{
    JobDefinition, JobInstanceId, Line, PipelineDefinition, PipelineInstanceId, Status, Stream,
};
use sluice_runner::{Reporter, ReporterError};

/// Prints every event to the terminal after handing it to `inner`
///
/// Ids are whatever `inner` mints. Nothing is printed for an event `inner`
/// rejected.
pub struct ConsoleReporter {
    inner: Arc<dyn Reporter>,
}

impl ConsoleReporter {
    pub fn new(inner: Arc<dyn Reporter>) -> Self {
        Self { inner }
    }
}

fn tag(pipeline: &PipelineDefinition, job: &JobDefinition) -> String {
    format!("[{}/{}]", pipeline.name, job.name)
}

/// Colorize a status for display
pub fn colorize_status(status: Status) -> ColoredString {
    match status {
        Status::Pending => status.as_str().yellow(),
        Status::Running => status.as_str().blue(),
        Status::Completed => status.as_str().green(),
        Status::Failed => status.as_str().red(),
        Status::Cancelled => status.as_str().dimmed(),
    }
}

impl Reporter for ConsoleReporter {
    fn pipeline_created(
        &self,
        pipeline: &PipelineDefinition,
    ) -> Result<PipelineInstanceId, ReporterError> {
        self.inner.pipeline_created(pipeline)
    }

    fn job_created(
        &self,
        pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
        job: &JobDefinition,
    ) -> Result<JobInstanceId, ReporterError> {
        self.inner.job_created(pipeline, pipeline_id, job)
    }

    fn pipeline_started(
        &self,
        pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
    ) -> Result<(), ReporterError> {
        self.inner.pipeline_started(pipeline, pipeline_id)?;
        println!(
            "{} Pipeline {} ({})",
            "▸".cyan(),
            pipeline.name.bold(),
            pipeline_id.to_string().dimmed()
        );
        Ok(())
    }

    fn job_started(
        &self,
        pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
        job: &JobDefinition,
        job_id: JobInstanceId,
    ) -> Result<(), ReporterError> {
        self.inner.job_started(pipeline, pipeline_id, job, job_id)?;
        println!(
            "{} {} {}",
            tag(pipeline, job).cyan(),
            "$".dimmed(),
            job.command.dimmed()
        );
        Ok(())
    }

    fn job_output(
        &self,
        pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
        job: &JobDefinition,
        job_id: JobInstanceId,
        line: &Line,
    ) -> Result<(), ReporterError> {
        self.inner.job_output(pipeline, pipeline_id, job, job_id, line)?;
        let text = match line.stream {
            Stream::Out => line.text.normal(),
            Stream::Err => line.text.red(),
        };
        println!("{} {}", tag(pipeline, job).dimmed(), text);
        Ok(())
    }

    fn job_failed(
        &self,
        pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
        job: &JobDefinition,
        job_id: JobInstanceId,
    ) -> Result<(), ReporterError> {
        self.inner.job_failed(pipeline, pipeline_id, job, job_id)?;
        println!("{} {}", tag(pipeline, job).cyan(), "✗ failed".red().bold());
        Ok(())
    }

    fn job_completed(
        &self,
        pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
        job: &JobDefinition,
        job_id: JobInstanceId,
    ) -> Result<(), ReporterError> {
        self.inner.job_completed(pipeline, pipeline_id, job, job_id)?;
        println!("{} {}", tag(pipeline, job).cyan(), "✓ completed".green());
        Ok(())
    }

    fn job_cancelled(
        &self,
        pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
        job: &JobDefinition,
        job_id: JobInstanceId,
    ) -> Result<(), ReporterError> {
        self.inner.job_cancelled(pipeline, pipeline_id, job, job_id)?;
        println!("{} {}", tag(pipeline, job).dimmed(), "skipped".dimmed());
        Ok(())
    }

    fn pipeline_failed(
        &self,
        pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
    ) -> Result<(), ReporterError> {
        self.inner.pipeline_failed(pipeline, pipeline_id)?;
        println!(
            "{}",
            format!("✗ Pipeline {} failed", pipeline.name).red().bold()
        );
        Ok(())
    }

    fn pipeline_completed(
        &self,
        pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
    ) -> Result<(), ReporterError> {
        self.inner.pipeline_completed(pipeline, pipeline_id)?;
        println!(
            "{}",
            format!("✓ Pipeline {} completed", pipeline.name)
                .green()
                .bold()
        );
        Ok(())
    }
}
