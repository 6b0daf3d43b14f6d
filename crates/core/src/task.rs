// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task state machine, runtime configuration, and the in-memory task proxy.

use crate::job::TaskJobKey;
use crate::timer::ActionTimer;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a task instance.
///
/// Forward edges only:
///
/// ```text
/// waiting -> preparing -> submitted -> running -> succeeded
///                |            |           `----> failed
///                `------------+---------> submit-failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    Waiting,
    Preparing,
    Submitted,
    Running,
    Succeeded,
    Failed,
    SubmitFailed,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Waiting => "waiting",
            TaskState::Preparing => "preparing",
            TaskState::Submitted => "submitted",
            TaskState::Running => "running",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
            TaskState::SubmitFailed => "submit-failed",
        }
    }

    /// True while a live job may exist for the task.
    pub fn is_active(&self) -> bool {
        matches!(self, TaskState::Submitted | TaskState::Running)
    }

    /// True once no further transition is possible.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed | TaskState::SubmitFailed
        )
    }

    /// Whether `next` is a legal direct transition from this state.
    pub fn can_advance_to(&self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (TaskState::Waiting, TaskState::Preparing)
                | (TaskState::Preparing, TaskState::Submitted)
                | (TaskState::Preparing, TaskState::SubmitFailed)
                | (TaskState::Submitted, TaskState::Running)
                | (TaskState::Submitted, TaskState::SubmitFailed)
                | (TaskState::Running, TaskState::Succeeded)
                | (TaskState::Running, TaskState::Failed)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-task runtime configuration, as supplied by the configuration accessor.
///
/// Delays and limits are in seconds. `env` and `directives` keep definition
/// order so rendered job scripts are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Script body executed by the job.
    pub script: String,
    /// Environment exported into the job script.
    pub env: IndexMap<String, String>,
    /// Job-runner directives rendered into the job script header.
    pub directives: IndexMap<String, String>,
    /// Wall-clock limit for the job process, seconds.
    pub execution_time_limit: Option<f64>,
    /// Deadline for the runner to accept the job, seconds after dispatch.
    pub submission_timeout: Option<f64>,
    /// Deadline for the job to finish, seconds after it starts.
    pub execution_timeout: Option<f64>,
    /// Poll schedule while submitted; falls back to the platform default.
    pub submission_polling_intervals: Vec<f64>,
    /// Poll schedule while running; falls back to the platform default.
    pub execution_polling_intervals: Vec<f64>,
    /// Resubmission backoff consumed by callers that retry submit failures.
    pub submission_retry_delays: Vec<f64>,
    /// Rerun backoff consumed by callers that retry execution failures.
    pub execution_retry_delays: Vec<f64>,
}

impl RuntimeConfig {
    /// Overlay broadcast overrides onto this configuration.
    ///
    /// Scalar overrides replace; map overrides merge key-by-key.
    pub fn apply_overrides(&mut self, overrides: &RuntimeOverrides) {
        if let Some(script) = &overrides.script {
            self.script = script.clone();
        }
        if let Some(limit) = overrides.execution_time_limit {
            self.execution_time_limit = Some(limit);
        }
        for (key, value) in &overrides.env {
            self.env.insert(key.clone(), value.clone());
        }
        for (key, value) in &overrides.directives {
            self.directives.insert(key.clone(), value.clone());
        }
    }
}

/// Partial runtime settings from a broadcast, applied on top of the task's
/// own configuration at job-preparation time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeOverrides {
    pub script: Option<String>,
    pub execution_time_limit: Option<f64>,
    pub env: IndexMap<String, String>,
    pub directives: IndexMap<String, String>,
}

/// In-memory representation of one task instance being managed.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskProxy {
    /// Cycle point the instance belongs to, in canonical form.
    pub point: String,
    /// Task name from the workflow definition.
    pub name: String,
    /// 1-based submission attempt counter; 0 until first submission.
    pub submit_num: u32,
    /// Platform or platform-group name requested by configuration.
    pub platform_name: String,
    /// Concrete platform chosen for the live job, once selected.
    pub selected_platform: Option<String>,
    pub runtime: RuntimeConfig,
    pub state: TaskState,
    /// A submit/poll/kill batch for this task is currently in flight.
    pub in_flight: bool,
    /// Armed while the task is active and periodic polling is wanted.
    pub poll_timer: Option<ActionTimer>,
    /// Wall-clock deadline for the runner to accept the job.
    pub submission_deadline: Option<DateTime<Utc>>,
    /// Wall-clock deadline for the job to finish once started.
    pub execution_deadline: Option<DateTime<Utc>>,
    /// Runner name recorded at submission, used for poll/kill grouping.
    pub job_runner_name: Option<String>,
    /// Runner-assigned job id from the submit callback.
    pub job_id: Option<String>,
}

impl TaskProxy {
    pub fn new(
        point: impl Into<String>,
        name: impl Into<String>,
        platform_name: impl Into<String>,
        runtime: RuntimeConfig,
    ) -> Self {
        Self {
            point: point.into(),
            name: name.into(),
            submit_num: 0,
            platform_name: platform_name.into(),
            selected_platform: None,
            runtime,
            state: TaskState::Waiting,
            in_flight: false,
            poll_timer: None,
            submission_deadline: None,
            execution_deadline: None,
            job_runner_name: None,
            job_id: None,
        }
    }

    /// Key of the current (latest) job submission.
    pub fn key(&self) -> TaskJobKey {
        TaskJobKey::new(self.point.clone(), self.name.clone(), self.submit_num)
    }

    /// `point/name` identifier used in logs.
    pub fn relative_id(&self) -> String {
        format!("{}/{}", self.point, self.name)
    }

    /// Bump the submit counter for a new submission attempt.
    pub fn next_submit_num(&mut self) -> u32 {
        self.submit_num += 1;
        self.submit_num
    }

    /// Apply a guarded state transition. Returns false (and leaves the state
    /// untouched) when the edge is not legal.
    pub fn advance(&mut self, next: TaskState) -> bool {
        if self.state.can_advance_to(next) {
            self.state = next;
            true
        } else {
            false
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
