//! Error types for starting pipeline runs

use thiserror::Error;

use crate::reporter::ReporterError;

/// Errors returned synchronously by [`Runner::run`](crate::Runner::run)
///
/// Job failures are never errors here; they are reported as statuses.
#[derive(Debug, Error)]
pub enum RunError {
    /// The pipeline definition has no jobs; nothing was reported
    #[error("no jobs defined in pipeline '{pipeline}'")]
    NoJobs { pipeline: String },

    /// `run` was called outside a Tokio runtime; nothing was reported
    #[error("no async runtime available to run pipeline '{pipeline}'")]
    NoRuntime { pipeline: String },

    /// The reporter could not create the pipeline or one of its jobs
    #[error("failed to create instances for pipeline '{pipeline}': {source}")]
    Reporter {
        pipeline: String,
        #[source]
        source: ReporterError,
    },
}
