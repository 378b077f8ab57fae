//! Reporter seam
//!
//! The runner knows nothing about storage, UIs or notifications. Everything
//! stateful hangs off the [`Reporter`] trait, which receives every lifecycle
//! event of a pipeline run and mints the identities of its instances.
//!
//! Call order for one run:
//! 1. `pipeline_created`, then `job_created` for every job in order, all
//!    synchronously inside [`Runner::run`](crate::Runner::run)
//! 2. `pipeline_started` from the background task
//! 3. per executed job: `job_started`, zero or more `job_output`, then
//!    `job_completed` or `job_failed`
//! 4. on failure: `pipeline_failed`, then `job_cancelled` for every job that
//!    never ran; otherwise `pipeline_completed`

mod fanout;
mod memory;
mod trace;

pub use fanout::FanoutReporter;
pub use memory::{JobRecord, MemoryReporter, PipelineRecord};
pub use trace::TracingReporter;

use sluice_core::{
    JobDefinition, JobInstanceId, Line, PipelineDefinition, PipelineInstanceId, Status,
};
use thiserror::Error;

/// Errors a reporter can hand back to the runner
///
/// Creation errors abort the run before it starts. All other errors are
/// logged by the runner and execution continues.
#[derive(Debug, Error)]
pub enum ReporterError {
    #[error("unknown pipeline instance {0}")]
    UnknownPipeline(PipelineInstanceId),

    #[error("unknown job instance {0}")]
    UnknownJob(JobInstanceId),

    #[error("{entity} cannot move from {from} to {to}")]
    InvalidTransition {
        entity: String,
        from: Status,
        to: Status,
    },

    #[error("job instance {0} is not running")]
    NotRunning(JobInstanceId),

    #[error("reporter backend error: {0}")]
    Backend(String),
}

impl ReporterError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

/// Receiver of pipeline and job lifecycle events
///
/// Implementations must return promptly: creation calls block the caller of
/// `run`, and `job_output` is invoked while the job's log is locked.
pub trait Reporter: Send + Sync {
    /// Allocates the identity of a new pipeline instance
    fn pipeline_created(
        &self,
        pipeline: &PipelineDefinition,
    ) -> Result<PipelineInstanceId, ReporterError>;

    /// Allocates the identity of a new job instance, once per job in order
    fn job_created(
        &self,
        pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
        job: &JobDefinition,
    ) -> Result<JobInstanceId, ReporterError>;

    fn pipeline_started(
        &self,
        pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
    ) -> Result<(), ReporterError>;

    fn job_started(
        &self,
        pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
        job: &JobDefinition,
        job_id: JobInstanceId,
    ) -> Result<(), ReporterError>;

    /// One captured line of the job's stdout or stderr
    fn job_output(
        &self,
        pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
        job: &JobDefinition,
        job_id: JobInstanceId,
        line: &Line,
    ) -> Result<(), ReporterError>;

    fn job_failed(
        &self,
        pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
        job: &JobDefinition,
        job_id: JobInstanceId,
    ) -> Result<(), ReporterError>;

    fn job_completed(
        &self,
        pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
        job: &JobDefinition,
        job_id: JobInstanceId,
    ) -> Result<(), ReporterError>;

    /// The job never ran because an earlier job failed
    fn job_cancelled(
        &self,
        pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
        job: &JobDefinition,
        job_id: JobInstanceId,
    ) -> Result<(), ReporterError>;

    fn pipeline_failed(
        &self,
        pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
    ) -> Result<(), ReporterError>;

    fn pipeline_completed(
        &self,
        pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
    ) -> Result<(), ReporterError>;
}
