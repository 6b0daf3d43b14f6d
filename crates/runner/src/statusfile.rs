// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job status file access.
//!
//! The status file is an append-only `KEY=value` record shared between the
//! running job script (via its traps) and the runner manager. Lines that
//! are not recognized records are skipped, so a half-written trailing line
//! never poisons a poll.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use gyre_core::job::JOB_STATUS_FILE;
use gyre_core::protocol::JOB_STATUS_RUNNER_NAME;
use gyre_core::JobPollContext;

use crate::handler::RunnerError;

/// Path of the status file within one job log dir.
pub(crate) fn status_path(job_log_root: &Path, job_log_dir: &str) -> PathBuf {
    job_log_root.join(job_log_dir).join(JOB_STATUS_FILE)
}

/// Start a fresh status file recording the runner that owns the job.
pub(crate) fn init(path: &Path, job_runner_name: &str) -> Result<(), RunnerError> {
    fs::write(path, format!("{JOB_STATUS_RUNNER_NAME}={job_runner_name}\n"))?;
    Ok(())
}

/// Append one `KEY=value` record.
pub(crate) fn append(path: &Path, key: &str, value: &str) -> Result<(), RunnerError> {
    let mut file = fs::OpenOptions::new().append(true).create(true).open(path)?;
    writeln!(file, "{key}={value}")?;
    Ok(())
}

/// Parse the status file into a poll context.
pub(crate) fn read_context(
    job_log_root: &Path,
    job_log_dir: &str,
) -> Result<JobPollContext, RunnerError> {
    let path = status_path(job_log_root, job_log_dir);
    let text = fs::read_to_string(&path)
        .map_err(|err| RunnerError::StatusFile(format!("{}: {err}", path.display())))?;
    let mut ctx = JobPollContext::new(job_log_dir);
    for line in text.lines() {
        ctx.update_from_status_line(line);
    }
    Ok(ctx)
}

#[cfg(test)]
#[path = "statusfile_tests.rs"]
mod tests;
