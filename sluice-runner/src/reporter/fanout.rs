//! Reporter that forwards events to several reporters

use std::sync::Arc;

use sluice_core::{JobDefinition, JobInstanceId, Line, PipelineDefinition, PipelineInstanceId};
use tracing::warn;

use super::{Reporter, ReporterError};

/// Forwards every event to a primary reporter and a set of observers
///
/// Identities come from the primary; the ids observers return from their own
/// creation calls are discarded, and they see the primary's ids afterwards.
/// Observer errors are logged and never reach the runner.
pub struct FanoutReporter {
    primary: Arc<dyn Reporter>,
    observers: Vec<Arc<dyn Reporter>>,
}

impl FanoutReporter {
    pub fn new(primary: Arc<dyn Reporter>) -> Self {
        Self {
            primary,
            observers: Vec::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn Reporter>) -> Self {
        self.observers.push(observer);
        self
    }

    fn forward<F>(&self, event: &str, call: F) -> Result<(), ReporterError>
    where
        F: Fn(&dyn Reporter) -> Result<(), ReporterError>,
    {
        let result = call(self.primary.as_ref());
        for observer in &self.observers {
            if let Err(e) = call(observer.as_ref()) {
                warn!("Observer failed to handle {}: {}", event, e);
            }
        }
        result
    }
}

impl Reporter for FanoutReporter {
    fn pipeline_created(
        &self,
        pipeline: &PipelineDefinition,
    ) -> Result<PipelineInstanceId, ReporterError> {
        let id = self.primary.pipeline_created(pipeline)?;
        for observer in &self.observers {
            if let Err(e) = observer.pipeline_created(pipeline) {
                warn!("Observer failed to handle pipeline_created: {}", e);
            }
        }
        Ok(id)
    }

    fn job_created(
        &self,
        pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
        job: &JobDefinition,
    ) -> Result<JobInstanceId, ReporterError> {
        let id = self.primary.job_created(pipeline, pipeline_id, job)?;
        for observer in &self.observers {
            if let Err(e) = observer.job_created(pipeline, pipeline_id, job) {
                warn!("Observer failed to handle job_created: {}", e);
            }
        }
        Ok(id)
    }

    fn pipeline_started(
        &self,
        pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
    ) -> Result<(), ReporterError> {
        self.forward("pipeline_started", |r| {
            r.pipeline_started(pipeline, pipeline_id)
        })
    }

    fn job_started(
        &self,
        pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
        job: &JobDefinition,
        job_id: JobInstanceId,
    ) -> Result<(), ReporterError> {
        self.forward("job_started", |r| {
            r.job_started(pipeline, pipeline_id, job, job_id)
        })
    }

    fn job_output(
        &self,
        pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
        job: &JobDefinition,
        job_id: JobInstanceId,
        line: &Line,
    ) -> Result<(), ReporterError> {
        self.forward("job_output", |r| {
            r.job_output(pipeline, pipeline_id, job, job_id, line)
        })
    }

    fn job_failed(
        &self,
        pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
        job: &JobDefinition,
        job_id: JobInstanceId,
    ) -> Result<(), ReporterError> {
        self.forward("job_failed", |r| {
            r.job_failed(pipeline, pipeline_id, job, job_id)
        })
    }

    fn job_completed(
        &self,
        pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
        job: &JobDefinition,
        job_id: JobInstanceId,
    ) -> Result<(), ReporterError> {
        self.forward("job_completed", |r| {
            r.job_completed(pipeline, pipeline_id, job, job_id)
        })
    }

    fn job_cancelled(
        &self,
        pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
        job: &JobDefinition,
        job_id: JobInstanceId,
    ) -> Result<(), ReporterError> {
        self.forward("job_cancelled", |r| {
            r.job_cancelled(pipeline, pipeline_id, job, job_id)
        })
    }

    fn pipeline_failed(
        &self,
        pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
    ) -> Result<(), ReporterError> {
        self.forward("pipeline_failed", |r| {
            r.pipeline_failed(pipeline, pipeline_id)
        })
    }

    fn pipeline_completed(
        &self,
        pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
    ) -> Result<(), ReporterError> {
        self.forward("pipeline_completed", |r| {
            r.pipeline_completed(pipeline, pipeline_id)
        })
    }
}
