// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job runner handler trait
//!
//! A handler describes one way of running jobs on a host: how to hand a
//! prepared job script to the queueing system (or spawn it directly), how
//! to ask which jobs the system still knows about, and how to kill one.
//! Built-in handlers cover `background`, `slurm` and `pbs`; callers add
//! more through [`JobRunnerRegistry`](crate::JobRunnerRegistry).

use std::path::Path;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;

/// Errors from job runner operations.
///
/// These are per-job failures: the batch manager converts them into
/// return-code-1 summary records and moves on to the next job.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("unknown job runner: {0}")]
    UnknownRunner(String),
    #[error("no job runner recorded for {0}")]
    MissingRunnerName(String),
    #[error("no job id recorded for {0}")]
    MissingJobId(String),
    #[error("{0}: no submit method")]
    NoSubmitMethod(String),
    #[error("{0}: no kill method")]
    NoKillMethod(String),
    #[error("cannot read job script: {0}")]
    JobScript(String),
    #[error("cannot read status file: {0}")]
    StatusFile(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Captured result of a finished (or failed-to-start) runner command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    pub ret_code: i32,
    pub out: String,
    pub err: String,
}

/// Per-job submission context, parsed from the job script header.
#[derive(Debug, Clone)]
pub struct SubmitContext<'a> {
    /// Path of the installed job script.
    pub job_script: &'a Path,
    /// Wall-clock limit in seconds, when the job declares one.
    pub execution_time_limit: Option<f64>,
}

/// One job runner integration.
///
/// Most runners only provide command templates and an id-recovery regex;
/// runners that own the job process directly (the background runner)
/// override [`submit_direct`](Self::submit_direct) and the proc-group
/// hooks instead.
#[async_trait]
pub trait JobRunnerHandler: Send + Sync {
    /// Runner name, as referenced by platform config and job script headers.
    fn name(&self) -> &str;

    /// Submission argv template; `{job}` expands to the job script path.
    ///
    /// A per-job template in the script header takes precedence. Runners
    /// that implement [`submit_direct`](Self::submit_direct) return `None`.
    fn submit_command_template(&self) -> Option<&str> {
        None
    }

    /// Submit by spawning the job process directly instead of shelling out
    /// to a queue command. Wins over any command template.
    async fn submit_direct(&self, ctx: &SubmitContext<'_>) -> Option<CommandResult> {
        let _ = ctx;
        None
    }

    /// Regex recovering the runner id from submit stdout, via a capture
    /// group named `id`. Applied line by line.
    fn rec_id_from_submit_out(&self) -> Option<&Regex> {
        None
    }

    /// Regex recovering the runner id from submit stderr.
    fn rec_id_from_submit_err(&self) -> Option<&Regex> {
        None
    }

    /// Normalize a recovered id before it is recorded.
    fn manip_job_id(&self, job_id: &str) -> String {
        job_id.to_string()
    }

    /// Bulk poll argv for a set of submitted runner ids.
    fn poll_command(&self, job_ids: &[String]) -> Vec<String>;

    /// Extract the ids still known to the runner from bulk poll stdout.
    ///
    /// `None` selects the default scan, which matches each queried id
    /// against the first column of every output line.
    fn filter_poll_output(&self, out: &str) -> Option<Vec<String>> {
        let _ = out;
        None
    }

    /// Kill argv template; `{job_id}` expands to the runner id. `None` for
    /// runners killed through their process group.
    fn kill_command_template(&self) -> Option<&str> {
        None
    }

    /// Kill the recorded process group by pid instead of running a kill
    /// command.
    fn should_kill_proc_group(&self) -> bool {
        false
    }

    /// Cross-check liveness against the local process table by pid.
    fn should_poll_proc_group(&self) -> bool {
        false
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
