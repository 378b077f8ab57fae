//! Pipeline domain types

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use super::job::JobDefinition;

/// Pipeline definition
///
/// Owned by whoever loads configuration; the runner only reads it.
/// Job order is execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub name: String,
    /// Cron-like expression, opaque to the runner
    #[serde(default)]
    pub schedule: Option<String>,
    /// Alert destination, opaque to the runner
    #[serde(default)]
    pub alert: Option<String>,
    #[serde(default)]
    pub jobs: Vec<JobDefinition>,
}

/// Structural problems in a pipeline definition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("pipeline name cannot be empty")]
    EmptyName,

    #[error("pipeline '{pipeline}' has a job with an empty name")]
    EmptyJobName { pipeline: String },

    #[error("pipeline '{pipeline}' defines job '{job}' more than once")]
    DuplicateJob { pipeline: String, job: String },
}

impl PipelineDefinition {
    pub fn new(name: impl Into<String>, jobs: Vec<JobDefinition>) -> Self {
        Self {
            name: name.into(),
            schedule: None,
            alert: None,
            jobs,
        }
    }

    /// Looks up a job definition by name
    pub fn job(&self, name: &str) -> Option<&JobDefinition> {
        self.jobs.iter().find(|j| j.name == name)
    }

    /// Validates naming rules
    ///
    /// An empty job list is accepted here; starting a run with no jobs is
    /// rejected by the runner instead.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.name.trim().is_empty() {
            return Err(DefinitionError::EmptyName);
        }

        let mut seen = HashSet::new();
        for job in &self.jobs {
            if job.name.trim().is_empty() {
                return Err(DefinitionError::EmptyJobName {
                    pipeline: self.name.clone(),
                });
            }
            if !seen.insert(job.name.as_str()) {
                return Err(DefinitionError::DuplicateJob {
                    pipeline: self.name.clone(),
                    job: job.name.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Identity of one pipeline execution, minted by the reporter
///
/// Typically a UUID, but treated as an opaque token everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineInstanceId(pub String);

impl PipelineInstanceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PipelineInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PipelineInstanceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for PipelineInstanceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<uuid::Uuid> for PipelineInstanceId {
    fn from(id: uuid::Uuid) -> Self {
        Self(id.to_string())
    }
}
