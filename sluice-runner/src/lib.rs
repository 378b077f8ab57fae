//! Sluice Runner
//!
//! Executes pipelines on the host and reports their progress.
//!
//! Architecture:
//! - Configuration: shell and pipe settings from environment or defaults
//! - Runner: creates instances and spawns one background task per run
//! - Process: launches job commands and captures their output
//! - Reporter: the seam through which every lifecycle event is observed
//!
//! Jobs of a run execute sequentially. The first failing job fails the
//! pipeline and cancels all later jobs without launching them.

mod completion;
mod config;
mod error;
mod execution;
pub mod process;
pub mod reporter;

pub use completion::CompletionHandle;
pub use config::{ConfigError, RunnerConfig};
pub use error::RunError;
pub use execution::{RunHandle, Runner};
pub use reporter::{
    FanoutReporter, JobRecord, MemoryReporter, PipelineRecord, Reporter, ReporterError,
    TracingReporter,
};
