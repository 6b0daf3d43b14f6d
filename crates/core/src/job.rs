// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job identity and job-log directory layout.
//!
//! Every job submission is identified by a `(cycle point, task name, submit
//! number)` triple. Its on-disk home under the job-log root is
//! `<point>/<name>/<NN>` where `NN` is the zero-padded submit number; the
//! literal symlink `NN` always points at the latest submit directory.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Symlink name pointing at a task's most recent submit directory.
pub const NN: &str = "NN";

/// Job script file name within a submit directory.
pub const JOB_SCRIPT: &str = "job";

/// Durable record of everything that happened to a job.
pub const JOB_STATUS_FILE: &str = "job.status";

/// Captured stdout of the job process.
pub const JOB_OUT: &str = "job.out";

/// Captured stderr of the job process.
pub const JOB_ERR: &str = "job.err";

/// Errors from parsing a job-log directory path back into a key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobKeyError {
    #[error("malformed task job key: {0:?}")]
    Malformed(String),
    #[error("invalid submit number in task job key: {0:?}")]
    SubmitNum(String),
}

/// Identity of one job submission: cycle point, task name, submit number.
///
/// Renders as the job-log directory path (`20000101T0000Z/fetch/01`), which
/// is also how jobs are named on the batch-command wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskJobKey {
    pub point: String,
    pub name: String,
    pub submit_num: u32,
}

impl TaskJobKey {
    pub fn new(point: impl Into<String>, name: impl Into<String>, submit_num: u32) -> Self {
        Self {
            point: point.into(),
            name: name.into(),
            submit_num,
        }
    }

    /// The task instance identifier without the submit number (`point/name`).
    pub fn relative_id(&self) -> String {
        format!("{}/{}", self.point, self.name)
    }

    /// Zero-padded submit-number directory name (`01`, `02`, ... `100`).
    pub fn submit_num_dir(&self) -> String {
        format!("{:02}", self.submit_num)
    }

    /// The job-log directory relative to the job-log root.
    pub fn job_log_dir(&self) -> String {
        self.to_string()
    }

    /// Parse a `point/name/NN` job-log directory path.
    pub fn parse(s: &str) -> Result<Self, JobKeyError> {
        let mut parts = s.split('/');
        let (Some(point), Some(name), Some(submit), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(JobKeyError::Malformed(s.to_string()));
        };
        if point.is_empty() || name.is_empty() {
            return Err(JobKeyError::Malformed(s.to_string()));
        }
        let submit_num = submit
            .parse::<u32>()
            .map_err(|_| JobKeyError::SubmitNum(s.to_string()))?;
        Ok(Self::new(point, name, submit_num))
    }
}

impl fmt::Display for TaskJobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{:02}", self.point, self.name, self.submit_num)
    }
}

impl FromStr for TaskJobKey {
    type Err = JobKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
