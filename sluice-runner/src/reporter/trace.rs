//! Reporter that turns lifecycle events into tracing records

use std::sync::atomic::{AtomicI64, Ordering};

use sluice_core::{
    JobDefinition, JobInstanceId, Line, PipelineDefinition, PipelineInstanceId, Stream,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Reporter, ReporterError};

/// Logs every event and never fails
///
/// Mints its own identities so it can be used on its own; behind a
/// [`FanoutReporter`](super::FanoutReporter) those are discarded.
#[derive(Debug, Default)]
pub struct TracingReporter {
    last_job_id: AtomicI64,
}

impl TracingReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for TracingReporter {
    fn pipeline_created(
        &self,
        pipeline: &PipelineDefinition,
    ) -> Result<PipelineInstanceId, ReporterError> {
        let id = PipelineInstanceId::from(Uuid::new_v4());
        debug!("Pipeline '{}' created: {}", pipeline.name, id);
        Ok(id)
    }

    fn job_created(
        &self,
        pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
        job: &JobDefinition,
    ) -> Result<JobInstanceId, ReporterError> {
        let id = JobInstanceId(self.last_job_id.fetch_add(1, Ordering::Relaxed) + 1);
        debug!(
            "Job '{}' of pipeline '{}' ({}) created: {}",
            job.name, pipeline.name, pipeline_id, id
        );
        Ok(id)
    }

    fn pipeline_started(
        &self,
        pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
    ) -> Result<(), ReporterError> {
        info!("Pipeline '{}' ({}) started", pipeline.name, pipeline_id);
        Ok(())
    }

    fn job_started(
        &self,
        pipeline: &PipelineDefinition,
        _pipeline_id: &PipelineInstanceId,
        job: &JobDefinition,
        job_id: JobInstanceId,
    ) -> Result<(), ReporterError> {
        info!(
            "Job '{}' ({}) of pipeline '{}' started: {}",
            job.name, job_id, pipeline.name, job.command
        );
        Ok(())
    }

    fn job_output(
        &self,
        _pipeline: &PipelineDefinition,
        _pipeline_id: &PipelineInstanceId,
        job: &JobDefinition,
        job_id: JobInstanceId,
        line: &Line,
    ) -> Result<(), ReporterError> {
        match line.stream {
            Stream::Out => debug!("[{} {}] {}", job.name, job_id, line.text),
            Stream::Err => debug!("[{} {} stderr] {}", job.name, job_id, line.text),
        }
        Ok(())
    }

    fn job_failed(
        &self,
        pipeline: &PipelineDefinition,
        _pipeline_id: &PipelineInstanceId,
        job: &JobDefinition,
        job_id: JobInstanceId,
    ) -> Result<(), ReporterError> {
        warn!(
            "Job '{}' ({}) of pipeline '{}' failed",
            job.name, job_id, pipeline.name
        );
        Ok(())
    }

    fn job_completed(
        &self,
        pipeline: &PipelineDefinition,
        _pipeline_id: &PipelineInstanceId,
        job: &JobDefinition,
        job_id: JobInstanceId,
    ) -> Result<(), ReporterError> {
        info!(
            "Job '{}' ({}) of pipeline '{}' completed",
            job.name, job_id, pipeline.name
        );
        Ok(())
    }

    fn job_cancelled(
        &self,
        pipeline: &PipelineDefinition,
        _pipeline_id: &PipelineInstanceId,
        job: &JobDefinition,
        job_id: JobInstanceId,
    ) -> Result<(), ReporterError> {
        info!(
            "Job '{}' ({}) of pipeline '{}' cancelled",
            job.name, job_id, pipeline.name
        );
        Ok(())
    }

    fn pipeline_failed(
        &self,
        pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
    ) -> Result<(), ReporterError> {
        warn!("Pipeline '{}' ({}) failed", pipeline.name, pipeline_id);
        Ok(())
    }

    fn pipeline_completed(
        &self,
        pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
    ) -> Result<(), ReporterError> {
        info!("Pipeline '{}' ({}) completed", pipeline.name, pipeline_id);
        Ok(())
    }
}
