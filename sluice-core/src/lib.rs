//! Sluice Core
//!
//! Core types and abstractions for the Sluice pipeline runner.
//!
//! This crate contains:
//! - Domain types: pipeline and job definitions, instance ids, status
//! - Log capture: line-oriented capture of a process's stdout and stderr

pub mod capture;
pub mod domain;

pub use capture::{LineWriter, Log, LogError};
pub use domain::job::{JobDefinition, JobInstanceId};
pub use domain::log::{Line, Stream};
pub use domain::pipeline::{DefinitionError, PipelineDefinition, PipelineInstanceId};
pub use domain::status::{Status, StatusParseError};
