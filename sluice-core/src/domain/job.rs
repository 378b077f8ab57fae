//! Job domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single step of a pipeline: one shell command
///
/// The command string is handed to a shell verbatim; it is never parsed here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDefinition {
    pub name: String,
    pub command: String,
}

impl JobDefinition {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
        }
    }
}

/// Identity of one job execution, minted by the reporter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobInstanceId(pub i64);

impl fmt::Display for JobInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for JobInstanceId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}
