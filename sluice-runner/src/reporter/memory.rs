//! In-memory reporter
//!
//! Keeps pipeline and job instance records in process memory. It plays the
//! role a database-backed reporter would: it mints identities, enforces the
//! status state machine and stores captured output, and it answers the read
//! queries a UI needs.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sluice_core::{
    JobDefinition, JobInstanceId, Line, Log, PipelineDefinition, PipelineInstanceId, Status,
};
use uuid::Uuid;

use super::{Reporter, ReporterError};

/// Stored state of one pipeline instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineRecord {
    pub id: PipelineInstanceId,
    pub name: String,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored state of one job instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRecord {
    pub id: JobInstanceId,
    pub pipeline_id: PipelineInstanceId,
    pub name: String,
    pub command: String,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub lines: Vec<Line>,
}

#[derive(Debug, Default)]
struct State {
    // Insertion order doubles as creation order
    pipelines: Vec<PipelineRecord>,
    jobs: BTreeMap<JobInstanceId, JobRecord>,
    last_job_id: i64,
}

impl State {
    fn pipeline_mut(
        &mut self,
        id: &PipelineInstanceId,
    ) -> Result<&mut PipelineRecord, ReporterError> {
        self.pipelines
            .iter_mut()
            .find(|p| &p.id == id)
            .ok_or_else(|| ReporterError::UnknownPipeline(id.clone()))
    }

    fn job_mut(&mut self, id: JobInstanceId) -> Result<&mut JobRecord, ReporterError> {
        self.jobs.get_mut(&id).ok_or(ReporterError::UnknownJob(id))
    }
}

/// Reporter that records every run in memory
#[derive(Debug, Default)]
pub struct MemoryReporter {
    state: Mutex<State>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a pipeline instance
    pub fn pipeline(&self, id: &PipelineInstanceId) -> Option<PipelineRecord> {
        self.lock().pipelines.iter().find(|p| &p.id == id).cloned()
    }

    /// All pipeline instances in creation order
    pub fn pipelines(&self) -> Vec<PipelineRecord> {
        self.lock().pipelines.clone()
    }

    pub fn job(&self, id: JobInstanceId) -> Option<JobRecord> {
        self.lock().jobs.get(&id).cloned()
    }

    /// Job instances of one pipeline instance, in definition order
    pub fn jobs_for(&self, pipeline_id: &PipelineInstanceId) -> Vec<JobRecord> {
        self.lock()
            .jobs
            .values()
            .filter(|j| &j.pipeline_id == pipeline_id)
            .cloned()
            .collect()
    }

    pub fn job_by_name(&self, pipeline_id: &PipelineInstanceId, name: &str) -> Option<JobRecord> {
        self.lock()
            .jobs
            .values()
            .find(|j| &j.pipeline_id == pipeline_id && j.name == name)
            .cloned()
    }

    /// Captured output of a job instance as a [`Log`]
    pub fn job_log(&self, id: JobInstanceId) -> Option<Log> {
        self.lock()
            .jobs
            .get(&id)
            .map(|j| Log::from_lines(j.lines.clone()))
    }

    /// Status of the most recently updated instance of a pipeline
    pub fn last_status(&self, name: &str) -> Option<Status> {
        self.latest(name, |_| true).map(|p| p.status)
    }

    /// Most recently updated instance of a pipeline with the given status
    pub fn last_with_status(&self, name: &str, status: Status) -> Option<PipelineRecord> {
        self.latest(name, |p| p.status == status)
    }

    fn latest<F>(&self, name: &str, filter: F) -> Option<PipelineRecord>
    where
        F: Fn(&PipelineRecord) -> bool,
    {
        self.lock()
            .pipelines
            .iter()
            .filter(|p| p.name == name && filter(p))
            .max_by_key(|p| p.updated_at)
            .cloned()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_pipeline_status(
        &self,
        id: &PipelineInstanceId,
        to: Status,
    ) -> Result<(), ReporterError> {
        let mut state = self.lock();
        let record = state.pipeline_mut(id)?;
        if !record.status.can_transition_to(to) {
            return Err(ReporterError::InvalidTransition {
                entity: format!("pipeline {}", id),
                from: record.status,
                to,
            });
        }
        record.status = to;
        record.updated_at = Utc::now();
        Ok(())
    }

    fn set_job_status(&self, id: JobInstanceId, to: Status) -> Result<(), ReporterError> {
        let mut state = self.lock();
        let record = state.job_mut(id)?;
        if !record.status.can_transition_to(to) {
            return Err(ReporterError::InvalidTransition {
                entity: format!("job {}", id),
                from: record.status,
                to,
            });
        }
        record.status = to;
        record.updated_at = Utc::now();
        Ok(())
    }
}

impl Reporter for MemoryReporter {
    fn pipeline_created(
        &self,
        pipeline: &PipelineDefinition,
    ) -> Result<PipelineInstanceId, ReporterError> {
        let id = PipelineInstanceId::from(Uuid::new_v4());
        let now = Utc::now();
        self.lock().pipelines.push(PipelineRecord {
            id: id.clone(),
            name: pipeline.name.clone(),
            status: Status::Pending,
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    fn job_created(
        &self,
        _pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
        job: &JobDefinition,
    ) -> Result<JobInstanceId, ReporterError> {
        let mut state = self.lock();
        if !state.pipelines.iter().any(|p| &p.id == pipeline_id) {
            return Err(ReporterError::UnknownPipeline(pipeline_id.clone()));
        }

        state.last_job_id += 1;
        let id = JobInstanceId(state.last_job_id);
        let now = Utc::now();
        state.jobs.insert(
            id,
            JobRecord {
                id,
                pipeline_id: pipeline_id.clone(),
                name: job.name.clone(),
                command: job.command.clone(),
                status: Status::Pending,
                created_at: now,
                updated_at: now,
                lines: Vec::new(),
            },
        );
        Ok(id)
    }

    fn pipeline_started(
        &self,
        _pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
    ) -> Result<(), ReporterError> {
        self.set_pipeline_status(pipeline_id, Status::Running)
    }

    fn job_started(
        &self,
        _pipeline: &PipelineDefinition,
        _pipeline_id: &PipelineInstanceId,
        _job: &JobDefinition,
        job_id: JobInstanceId,
    ) -> Result<(), ReporterError> {
        self.set_job_status(job_id, Status::Running)
    }

    fn job_output(
        &self,
        _pipeline: &PipelineDefinition,
        _pipeline_id: &PipelineInstanceId,
        _job: &JobDefinition,
        job_id: JobInstanceId,
        line: &Line,
    ) -> Result<(), ReporterError> {
        let mut state = self.lock();
        let record = state.job_mut(job_id)?;
        if record.status != Status::Running {
            return Err(ReporterError::NotRunning(job_id));
        }
        record.lines.push(line.clone());
        Ok(())
    }

    fn job_failed(
        &self,
        _pipeline: &PipelineDefinition,
        _pipeline_id: &PipelineInstanceId,
        _job: &JobDefinition,
        job_id: JobInstanceId,
    ) -> Result<(), ReporterError> {
        self.set_job_status(job_id, Status::Failed)
    }

    fn job_completed(
        &self,
        _pipeline: &PipelineDefinition,
        _pipeline_id: &PipelineInstanceId,
        _job: &JobDefinition,
        job_id: JobInstanceId,
    ) -> Result<(), ReporterError> {
        self.set_job_status(job_id, Status::Completed)
    }

    fn job_cancelled(
        &self,
        _pipeline: &PipelineDefinition,
        _pipeline_id: &PipelineInstanceId,
        _job: &JobDefinition,
        job_id: JobInstanceId,
    ) -> Result<(), ReporterError> {
        self.set_job_status(job_id, Status::Cancelled)
    }

    fn pipeline_failed(
        &self,
        _pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
    ) -> Result<(), ReporterError> {
        self.set_pipeline_status(pipeline_id, Status::Failed)
    }

    fn pipeline_completed(
        &self,
        _pipeline: &PipelineDefinition,
        pipeline_id: &PipelineInstanceId,
    ) -> Result<(), ReporterError> {
        self.set_pipeline_status(pipeline_id, Status::Completed)
    }
}
