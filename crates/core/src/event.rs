// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task lifecycle events emitted by job-batch callbacks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a custom task message, matching the severity token carried in
/// `CYLC_MESSAGE` status-file entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognized severity token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown message severity: {0:?}")]
pub struct UnknownSeverity(pub String);

impl FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INFO" => Ok(Severity::Info),
            "WARNING" => Ok(Severity::Warning),
            "CRITICAL" => Ok(Severity::Critical),
            other => Err(UnknownSeverity(other.to_string())),
        }
    }
}

/// One observed change in a task job's lifecycle.
///
/// Produced by the orchestration layer when it interprets batch-command
/// output, and consumed by the task-events seam to drive state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskEvent {
    /// The job runner accepted the job.
    Submitted,
    /// The job process began executing.
    Started,
    /// The job exited successfully.
    Succeeded,
    /// The job exited with a failure, optionally naming the trap signal.
    Failed { signal: Option<String> },
    /// The job could not be submitted to the runner.
    SubmitFailed,
    /// A custom message recorded by the job.
    Message { severity: Severity, text: String },
}

impl TaskEvent {
    /// Short event name used in logs and event records.
    pub fn label(&self) -> &'static str {
        match self {
            TaskEvent::Submitted => "submitted",
            TaskEvent::Started => "started",
            TaskEvent::Succeeded => "succeeded",
            TaskEvent::Failed { .. } => "failed",
            TaskEvent::SubmitFailed => "submission failed",
            TaskEvent::Message { .. } => "message",
        }
    }
}

impl fmt::Display for TaskEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskEvent::Failed {
                signal: Some(signal),
            } => write!(f, "failed ({signal})"),
            TaskEvent::Message { severity, text } => write!(f, "{severity}: {text}"),
            other => f.write_str(other.label()),
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
