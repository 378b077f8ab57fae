//! Pipeline execution
//!
//! Turns a static [`PipelineDefinition`] into a running, observable execution:
//! - instances are created synchronously through the reporter
//! - jobs run strictly one after another in a single background task
//! - the first failing job fails the pipeline and cancels every later job
//!   without launching it
//!
//! Every terminal transition retires one unit of the run's
//! [`CompletionHandle`], which callers wait on to observe the end of a run.

use std::sync::Arc;

use sluice_core::{JobDefinition, JobInstanceId, Log, PipelineDefinition, PipelineInstanceId};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::completion::{CompletionHandle, PipelineUnit};
use crate::config::RunnerConfig;
use crate::error::RunError;
use crate::process;
use crate::reporter::{Reporter, ReporterError};

/// Identities and completion handle of a started run
#[derive(Debug, Clone)]
pub struct RunHandle {
    pub pipeline_id: PipelineInstanceId,
    /// Job instance ids in definition order
    pub job_ids: Vec<JobInstanceId>,
    pub completion: CompletionHandle,
}

impl RunHandle {
    /// Waits until the pipeline and every job reached a terminal status
    pub async fn wait(&self) {
        self.completion.wait().await
    }
}

/// Starts pipeline runs
///
/// Different runs are fully independent: nothing stops two runs of the same
/// pipeline from executing at the same time.
#[derive(Debug, Clone, Default)]
pub struct Runner {
    config: Arc<RunnerConfig>,
}

impl Runner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Starts a run of `definition`, reporting to `reporter`
    ///
    /// The pipeline instance and all job instances are created before this
    /// returns; execution happens on a task spawned onto the current Tokio
    /// runtime. Fails without calling the reporter if the pipeline has no jobs
    /// or no runtime is available.
    pub fn run(
        &self,
        definition: Arc<PipelineDefinition>,
        reporter: Arc<dyn Reporter>,
    ) -> Result<RunHandle, RunError> {
        if definition.jobs.is_empty() {
            return Err(RunError::NoJobs {
                pipeline: definition.name.clone(),
            });
        }

        let runtime = Handle::try_current().map_err(|_| RunError::NoRuntime {
            pipeline: definition.name.clone(),
        })?;

        let creation_failed = |source: ReporterError| RunError::Reporter {
            pipeline: definition.name.clone(),
            source,
        };

        let pipeline_id = reporter
            .pipeline_created(&definition)
            .map_err(creation_failed)?;

        let mut job_ids = Vec::with_capacity(definition.jobs.len());
        for job in &definition.jobs {
            let job_id = reporter
                .job_created(&definition, &pipeline_id, job)
                .map_err(creation_failed)?;
            job_ids.push(job_id);
        }

        info!(
            "Created pipeline '{}' ({}) with {} job(s)",
            definition.name,
            pipeline_id,
            job_ids.len()
        );

        // One unit for the pipeline itself plus one per job
        let completion = CompletionHandle::new(job_ids.len() + 1);

        let execution = Execution {
            config: Arc::clone(&self.config),
            definition,
            reporter,
            pipeline_id: pipeline_id.clone(),
            job_ids: job_ids.clone(),
            completion: completion.clone(),
        };
        runtime.spawn(execution.run());

        Ok(RunHandle {
            pipeline_id,
            job_ids,
            completion,
        })
    }
}

/// State owned by the background task of one run
struct Execution {
    config: Arc<RunnerConfig>,
    definition: Arc<PipelineDefinition>,
    reporter: Arc<dyn Reporter>,
    pipeline_id: PipelineInstanceId,
    job_ids: Vec<JobInstanceId>,
    completion: CompletionHandle,
}

impl Execution {
    async fn run(self) {
        let _pipeline_unit = PipelineUnit::new(self.completion.clone());
        let def = Arc::clone(&self.definition);
        let pid = &self.pipeline_id;

        info!("Starting pipeline '{}' ({})", def.name, pid);
        self.check(
            "pipeline_started",
            self.reporter.pipeline_started(&def, pid),
        );

        for (idx, (job, &job_id)) in def.jobs.iter().zip(&self.job_ids).enumerate() {
            info!(
                "Executing job {}/{} of '{}': {}",
                idx + 1,
                def.jobs.len(),
                def.name,
                job.name
            );

            self.check(
                "job_started",
                self.reporter.job_started(&def, pid, job, job_id),
            );

            if self.execute_job(job, job_id).await {
                self.check(
                    "job_completed",
                    self.reporter.job_completed(&def, pid, job, job_id),
                );
                self.completion.retire();
                continue;
            }

            self.check(
                "job_failed",
                self.reporter.job_failed(&def, pid, job, job_id),
            );
            self.check("pipeline_failed", self.reporter.pipeline_failed(&def, pid));
            self.completion.retire();

            let skipped = def.jobs.iter().zip(&self.job_ids).skip(idx + 1);
            for (job, &job_id) in skipped {
                debug!("Cancelling job '{}' ({})", job.name, job_id);
                self.check(
                    "job_cancelled",
                    self.reporter.job_cancelled(&def, pid, job, job_id),
                );
                self.completion.retire();
            }

            warn!(
                "Pipeline '{}' ({}) failed at job '{}'",
                def.name, pid, job.name
            );
            return;
        }

        self.check(
            "pipeline_completed",
            self.reporter.pipeline_completed(&def, pid),
        );
        info!("Pipeline '{}' ({}) completed", def.name, pid);
    }

    /// Runs one job's command, streaming its output to the reporter
    ///
    /// Returns whether the job succeeded. Launch failures count as failures.
    async fn execute_job(&self, job: &JobDefinition, job_id: JobInstanceId) -> bool {
        let log = {
            let reporter = Arc::clone(&self.reporter);
            let definition = Arc::clone(&self.definition);
            let pipeline_id = self.pipeline_id.clone();
            let job = job.clone();
            Log::with_callback(move |line| {
                let result = reporter.job_output(&definition, &pipeline_id, &job, job_id, line);
                if let Err(e) = result {
                    warn!("Reporter failed to record output of job {}: {}", job_id, e);
                }
            })
        };

        match process::run_command(&self.config, &job.command, &log).await {
            Ok(status) if status.success() => {
                debug!(
                    "Job '{}' ({}) exited successfully after {} line(s) of output",
                    job.name,
                    job_id,
                    log.len()
                );
                true
            }
            Ok(status) => {
                info!("Job '{}' ({}) exited with {}", job.name, job_id, status);
                false
            }
            Err(e) => {
                error!("Job '{}' ({}) could not be run: {}", job.name, job_id, e);
                false
            }
        }
    }

    /// Reporter faults never stop the run
    fn check(&self, event: &str, result: Result<(), ReporterError>) {
        if let Err(e) = result {
            warn!(
                "Reporter failed to handle {} for pipeline {}: {}",
                event, self.pipeline_id, e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::MemoryReporter;
    use sluice_core::{Line, Status};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Test double that records every event as a line of text
    #[derive(Default)]
    struct RecordingReporter {
        events: Mutex<Vec<String>>,
        next_job_id: Mutex<i64>,
        fail_on: Option<&'static str>,
    }

    impl RecordingReporter {
        fn failing_on(event: &'static str) -> Self {
            Self {
                fail_on: Some(event),
                ..Self::default()
            }
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn record(&self, event: &str, text: String) -> Result<(), ReporterError> {
            self.events.lock().unwrap().push(text);
            if self.fail_on == Some(event) {
                return Err(ReporterError::backend(format!("{} rejected", event)));
            }
            Ok(())
        }
    }

    impl Reporter for RecordingReporter {
        fn pipeline_created(
            &self,
            _pipeline: &PipelineDefinition,
        ) -> Result<PipelineInstanceId, ReporterError> {
            self.record("pipeline_created", "pipeline created: P0".to_string())?;
            Ok(PipelineInstanceId::from("P0"))
        }

        fn job_created(
            &self,
            _pipeline: &PipelineDefinition,
            _pipeline_id: &PipelineInstanceId,
            _job: &JobDefinition,
        ) -> Result<JobInstanceId, ReporterError> {
            let id = {
                let mut next = self.next_job_id.lock().unwrap();
                let id = JobInstanceId(*next);
                *next += 1;
                id
            };
            self.record("job_created", format!("job created: {}", id))?;
            Ok(id)
        }

        fn pipeline_started(
            &self,
            _pipeline: &PipelineDefinition,
            pipeline_id: &PipelineInstanceId,
        ) -> Result<(), ReporterError> {
            self.record(
                "pipeline_started",
                format!("pipeline started: {}", pipeline_id),
            )
        }

        fn job_started(
            &self,
            _pipeline: &PipelineDefinition,
            _pipeline_id: &PipelineInstanceId,
            _job: &JobDefinition,
            job_id: JobInstanceId,
        ) -> Result<(), ReporterError> {
            self.record("job_started", format!("job started: {}", job_id))
        }

        fn job_output(
            &self,
            _pipeline: &PipelineDefinition,
            _pipeline_id: &PipelineInstanceId,
            _job: &JobDefinition,
            job_id: JobInstanceId,
            line: &Line,
        ) -> Result<(), ReporterError> {
            self.record(
                "job_output",
                format!("job ({}) output to {}: {}", job_id, line.stream, line.text),
            )
        }

        fn job_failed(
            &self,
            _pipeline: &PipelineDefinition,
            _pipeline_id: &PipelineInstanceId,
            _job: &JobDefinition,
            job_id: JobInstanceId,
        ) -> Result<(), ReporterError> {
            self.record("job_failed", format!("job failed: {}", job_id))
        }

        fn job_completed(
            &self,
            _pipeline: &PipelineDefinition,
            _pipeline_id: &PipelineInstanceId,
            _job: &JobDefinition,
            job_id: JobInstanceId,
        ) -> Result<(), ReporterError> {
            self.record("job_completed", format!("job completed: {}", job_id))
        }

        fn job_cancelled(
            &self,
            _pipeline: &PipelineDefinition,
            _pipeline_id: &PipelineInstanceId,
            _job: &JobDefinition,
            job_id: JobInstanceId,
        ) -> Result<(), ReporterError> {
            self.record("job_cancelled", format!("job cancelled: {}", job_id))
        }

        fn pipeline_failed(
            &self,
            _pipeline: &PipelineDefinition,
            pipeline_id: &PipelineInstanceId,
        ) -> Result<(), ReporterError> {
            self.record(
                "pipeline_failed",
                format!("pipeline failed: {}", pipeline_id),
            )
        }

        fn pipeline_completed(
            &self,
            _pipeline: &PipelineDefinition,
            pipeline_id: &PipelineInstanceId,
        ) -> Result<(), ReporterError> {
            self.record(
                "pipeline_completed",
                format!("pipeline completed: {}", pipeline_id),
            )
        }
    }

    fn pipeline(jobs: &[(&str, &str)]) -> Arc<PipelineDefinition> {
        Arc::new(PipelineDefinition::new(
            "Test",
            jobs.iter()
                .map(|(name, command)| JobDefinition::new(*name, *command))
                .collect(),
        ))
    }

    async fn run_to_end(def: Arc<PipelineDefinition>, reporter: Arc<dyn Reporter>) -> RunHandle {
        let handle = Runner::default().run(def, reporter).unwrap();
        assert!(
            handle.completion.wait_timeout(Duration::from_secs(10)).await,
            "run did not complete"
        );
        handle
    }

    #[tokio::test]
    async fn test_one_job_with_output() {
        let reporter = Arc::new(RecordingReporter::default());
        run_to_end(pipeline(&[("Test", "echo \"hello test\"")]), reporter.clone()).await;

        assert_eq!(
            reporter.events(),
            vec![
                "pipeline created: P0",
                "job created: 0",
                "pipeline started: P0",
                "job started: 0",
                "job (0) output to stdout: hello test",
                "job completed: 0",
                "pipeline completed: P0",
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_job_cancels_the_rest() {
        let reporter = Arc::new(RecordingReporter::default());
        run_to_end(
            pipeline(&[
                ("Test", "true"),
                ("Test", "false"),
                ("Test", "should never run"),
                ("Test", "should never run"),
            ]),
            reporter.clone(),
        )
        .await;

        assert_eq!(
            reporter.events(),
            vec![
                "pipeline created: P0",
                "job created: 0",
                "job created: 1",
                "job created: 2",
                "job created: 3",
                "pipeline started: P0",
                "job started: 0",
                "job completed: 0",
                "job started: 1",
                "job failed: 1",
                "pipeline failed: P0",
                "job cancelled: 2",
                "job cancelled: 3",
            ]
        );
    }

    #[tokio::test]
    async fn test_cancelled_jobs_are_never_launched() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");

        let reporter = Arc::new(RecordingReporter::default());
        let touch = format!("touch '{}'", marker.display());
        run_to_end(
            pipeline(&[("fail", "exit 1"), ("touch", touch.as_str())]),
            reporter.clone(),
        )
        .await;

        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_empty_pipeline_is_rejected_without_reporting() {
        let reporter = Arc::new(RecordingReporter::default());
        let result = Runner::default().run(pipeline(&[]), reporter.clone());

        assert!(matches!(result, Err(RunError::NoJobs { .. })));
        assert!(reporter.events().is_empty());
    }

    #[test]
    fn test_run_outside_runtime_is_rejected_without_reporting() {
        let reporter = Arc::new(RecordingReporter::default());
        let result = Runner::default().run(pipeline(&[("a", "true")]), reporter.clone());

        assert!(matches!(result, Err(RunError::NoRuntime { .. })));
        assert!(reporter.events().is_empty());
    }

    #[tokio::test]
    async fn test_creation_failure_aborts_run() {
        let reporter = Arc::new(RecordingReporter::failing_on("job_created"));
        let result =
            Runner::default().run(pipeline(&[("a", "true"), ("b", "true")]), reporter.clone());

        assert!(matches!(result, Err(RunError::Reporter { .. })));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            reporter.events(),
            vec!["pipeline created: P0", "job created: 0"]
        );
    }

    #[tokio::test]
    async fn test_reporter_failures_do_not_stop_execution() {
        let reporter = Arc::new(RecordingReporter::failing_on("job_started"));
        let handle =
            run_to_end(pipeline(&[("a", "true"), ("b", "true")]), reporter.clone()).await;

        assert!(handle.completion.is_done());
        let events = reporter.events();
        assert_eq!(
            events.last().map(String::as_str),
            Some("pipeline completed: P0")
        );
        assert!(events.contains(&"job completed: 1".to_string()));
    }

    #[tokio::test]
    async fn test_output_is_reported_between_start_and_end() {
        let reporter = Arc::new(RecordingReporter::default());
        run_to_end(
            pipeline(&[
                ("first", "echo one; echo two >&2"),
                ("second", "printf 'no newline'"),
            ]),
            reporter.clone(),
        )
        .await;

        let events = reporter.events();
        let position = |event: &str| events.iter().position(|e| e == event).unwrap();

        let first_started = position("job started: 0");
        let first_completed = position("job completed: 0");
        let second_started = position("job started: 1");
        let second_completed = position("job completed: 1");

        for output in ["job (0) output to stdout: one", "job (0) output to stderr: two"] {
            let at = position(output);
            assert!(first_started < at && at < first_completed);
        }

        let at = position("job (1) output to stdout: no newline");
        assert!(second_started < at && at < second_completed);
    }

    #[tokio::test]
    async fn test_launch_failure_fails_the_job() {
        let reporter = Arc::new(RecordingReporter::default());
        let runner = Runner::new(RunnerConfig::default().with_shell("/nonexistent/shell"));
        let handle = runner
            .run(pipeline(&[("a", "true"), ("b", "true")]), reporter.clone())
            .unwrap();
        handle.wait().await;

        let events = reporter.events();
        assert!(events.contains(&"job failed: 0".to_string()));
        assert!(events.contains(&"pipeline failed: P0".to_string()));
        assert!(events.contains(&"job cancelled: 1".to_string()));
    }

    #[tokio::test]
    async fn test_every_instance_ends_terminal() {
        let reporter = Arc::new(MemoryReporter::new());
        let handle = run_to_end(
            pipeline(&[
                ("one", "true"),
                ("two", "echo broken >&2; exit 2"),
                ("three", "true"),
            ]),
            reporter.clone(),
        )
        .await;

        let record = reporter.pipeline(&handle.pipeline_id).unwrap();
        assert_eq!(record.status, Status::Failed);

        let statuses: Vec<Status> = reporter
            .jobs_for(&handle.pipeline_id)
            .iter()
            .map(|j| j.status)
            .collect();
        assert_eq!(
            statuses,
            vec![Status::Completed, Status::Failed, Status::Cancelled]
        );

        let log = reporter.job_log(handle.job_ids[1]).unwrap();
        assert_eq!(log.lines()[0].text, "broken");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_runs_are_independent() {
        let reporter = Arc::new(MemoryReporter::new());
        let runner = Runner::default();
        let def = pipeline(&[("sleep", "sleep 0.2"), ("echo", "echo done")]);

        let first = runner.run(def.clone(), reporter.clone()).unwrap();
        let second = runner.run(def, reporter.clone()).unwrap();
        assert_ne!(first.pipeline_id, second.pipeline_id);

        let started = std::time::Instant::now();
        first.wait().await;
        second.wait().await;
        // Both sleeps overlap
        assert!(started.elapsed() < Duration::from_millis(380));

        for handle in [&first, &second] {
            let record = reporter.pipeline(&handle.pipeline_id).unwrap();
            assert_eq!(record.status, Status::Completed);
        }
        assert_eq!(reporter.last_status("Test"), Some(Status::Completed));
    }

    #[tokio::test]
    async fn test_ids_are_available_before_execution() {
        let reporter = Arc::new(MemoryReporter::new());
        let handle = Runner::default()
            .run(pipeline(&[("a", "sleep 0.1"), ("b", "true")]), reporter.clone())
            .unwrap();

        assert_eq!(handle.job_ids.len(), 2);
        assert!(reporter.pipeline(&handle.pipeline_id).is_some());
        assert_eq!(reporter.jobs_for(&handle.pipeline_id).len(), 2);

        handle.wait().await;
        assert_eq!(handle.completion.remaining(), 0);
    }
}
