// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `background` job runner: plain processes on the job host.
//!
//! Jobs run as direct children in a fresh process group, so the group id
//! equals the job's pid and doubles as the runner id. Liveness comes from
//! the process table and kill signals the whole group.

use std::io;
use std::path::Path;
use std::process::Stdio;
use std::sync::LazyLock;

use async_trait::async_trait;
use gyre_core::job::{JOB_ERR, JOB_OUT};
use regex::Regex;
use tokio::process::Command;

use crate::handler::{CommandResult, JobRunnerHandler, SubmitContext};

#[allow(clippy::expect_used)]
static REC_ID_FROM_SUBMIT_OUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<id>\d+)$").expect("constant regex pattern is valid"));

/// `ps` argv listing which of the given pids are still alive, one pid per
/// output line with the header suppressed.
pub(crate) fn ps_poll_argv(pids: &[String]) -> Vec<String> {
    vec![
        "ps".to_string(),
        "-o".to_string(),
        "pid=".to_string(),
        "-p".to_string(),
        pids.join(","),
    ]
}

/// `kill` argv delivering SIGKILL to a whole process group.
pub(crate) fn kill_process_group_argv(pid: &str) -> Vec<String> {
    vec![
        "kill".to_string(),
        "-KILL".to_string(),
        "--".to_string(),
        format!("-{pid}"),
    ]
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BackgroundHandler;

impl BackgroundHandler {
    /// Spawn the job script detached, with output captured next to it.
    ///
    /// The child leads its own process group and is not awaited; it must
    /// outlive this process.
    fn spawn_detached(job_script: &Path) -> io::Result<u32> {
        let dir = job_script.parent().ok_or_else(|| {
            io::Error::other(format!("{} has no parent dir", job_script.display()))
        })?;
        let stdout = std::fs::File::create(dir.join(JOB_OUT))?;
        let stderr = std::fs::File::create(dir.join(JOB_ERR))?;
        let mut cmd = Command::new(job_script);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .process_group(0);
        let child = cmd.spawn()?;
        child
            .id()
            .ok_or_else(|| io::Error::other("job exited before its pid could be read"))
    }
}

#[async_trait]
impl JobRunnerHandler for BackgroundHandler {
    fn name(&self) -> &str {
        "background"
    }

    async fn submit_direct(&self, ctx: &SubmitContext<'_>) -> Option<CommandResult> {
        let result = match Self::spawn_detached(ctx.job_script) {
            Ok(pid) => CommandResult {
                ret_code: 0,
                out: format!("{pid}\n"),
                err: String::new(),
            },
            Err(err) => CommandResult {
                ret_code: 1,
                out: String::new(),
                err: err.to_string(),
            },
        };
        Some(result)
    }

    fn rec_id_from_submit_out(&self) -> Option<&Regex> {
        Some(&REC_ID_FROM_SUBMIT_OUT)
    }

    fn poll_command(&self, job_ids: &[String]) -> Vec<String> {
        ps_poll_argv(job_ids)
    }

    fn should_kill_proc_group(&self) -> bool {
        true
    }

    fn should_poll_proc_group(&self) -> bool {
        true
    }
}

#[cfg(test)]
#[path = "background_tests.rs"]
mod tests;
