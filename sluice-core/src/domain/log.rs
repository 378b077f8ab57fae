//! Log domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Standard stream a line was written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stream {
    #[serde(rename = "stdout")]
    Out,
    #[serde(rename = "stderr")]
    Err,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Out => write!(f, "stdout"),
            Stream::Err => write!(f, "stderr"),
        }
    }
}

/// One completed line of process output
///
/// `text` never contains the terminating newline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub stream: Stream,
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

impl Line {
    pub fn new(stream: Stream, text: impl Into<String>) -> Self {
        Self {
            stream,
            timestamp: Utc::now(),
            text: text.into(),
        }
    }
}
