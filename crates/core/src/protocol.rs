// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job-runner wire contract: status-file keys, batch-output line
//! formats, and the poll context exchanged between the runner side and the
//! orchestration side.
//!
//! The orchestration manager reads batch-command stdout as plain text from a
//! separate process, so every prefix and field ordering here is load-bearing
//! and must not change shape.

use crate::event::Severity;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Status-file keys (`key=value` lines, append-only)
// ---------------------------------------------------------------------------

pub const JOB_STATUS_RUNNER_NAME: &str = "CYLC_JOB_RUNNER_NAME";
pub const JOB_STATUS_JOB_ID: &str = "CYLC_JOB_ID";
pub const JOB_STATUS_SUBMIT_TIME: &str = "CYLC_JOB_RUNNER_SUBMIT_TIME";
pub const JOB_STATUS_PID: &str = "CYLC_JOB_PID";
pub const JOB_STATUS_INIT_TIME: &str = "CYLC_JOB_INIT_TIME";
pub const JOB_STATUS_EXIT: &str = "CYLC_JOB_EXIT";
pub const JOB_STATUS_EXIT_TIME: &str = "CYLC_JOB_EXIT_TIME";
pub const JOB_STATUS_EXIT_POLLED: &str = "CYLC_JOB_RUNNER_EXIT_POLLED";
pub const JOB_STATUS_MESSAGE: &str = "CYLC_MESSAGE";

/// `CYLC_JOB_EXIT` value for a clean exit; anything else is a signal name.
pub const JOB_EXIT_SUCCEEDED: &str = "SUCCEEDED";

// ---------------------------------------------------------------------------
// Batch-output line prefixes (stdout of submit/poll/kill commands)
// ---------------------------------------------------------------------------

pub const OUT_PREFIX_SUMMARY: &str = "[TASK JOB SUMMARY]";
pub const OUT_PREFIX_MESSAGE: &str = "[TASK JOB MESSAGE]";
pub const OUT_PREFIX_COMMAND: &str = "[TASK JOB COMMAND]";
pub const OUT_PREFIX_ERROR: &str = "[TASK JOB ERROR]";

// ---------------------------------------------------------------------------
// Job script header lines (written by the job-file writer, read back by the
// runner manager) and the stdin markers used for remote submission.
// ---------------------------------------------------------------------------

pub const LINE_PREFIX_JOB_RUNNER_NAME: &str = "# Job runner: ";
pub const LINE_PREFIX_COMMAND_TEMPLATE: &str = "# Job runner command template: ";
pub const LINE_PREFIX_EXECUTION_TIME_LIMIT: &str = "# Execution time limit: ";

/// Marker opening one job script on a remote-mode stdin stream; the job-log
/// dir follows the colon.
pub const STDIN_JOB_BEGIN: &str = "#GYRE-JOB-SCRIPT-BEGIN:";
/// Marker closing one job script on a remote-mode stdin stream.
pub const STDIN_JOB_END: &str = "#GYRE-JOB-SCRIPT-END";

/// Which process stream a `[TASK JOB COMMAND]` line was captured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn tag(&self) -> &'static str {
        match self {
            OutputStream::Stdout => "[STDOUT]",
            OutputStream::Stderr => "[STDERR]",
        }
    }
}

// ---------------------------------------------------------------------------
// Line formatting (runner side)
// ---------------------------------------------------------------------------

/// `[TASK JOB SUMMARY]<time>|<dir>|<ret>[|<job-id>]`
pub fn format_summary(time: &str, job_log_dir: &str, ret_code: i32, job_id: Option<&str>) -> String {
    match job_id {
        Some(id) => format!("{OUT_PREFIX_SUMMARY}{time}|{job_log_dir}|{ret_code}|{id}"),
        None => format!("{OUT_PREFIX_SUMMARY}{time}|{job_log_dir}|{ret_code}"),
    }
}

/// `[TASK JOB SUMMARY]<time>|<dir>|<poll-context-json>`
pub fn format_poll_summary(
    time: &str,
    ctx: &JobPollContext,
) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(ctx)?;
    Ok(format!(
        "{OUT_PREFIX_SUMMARY}{time}|{}|{json}",
        ctx.job_log_dir
    ))
}

/// `[TASK JOB MESSAGE]<time>|<dir>|<text>`
pub fn format_message(time: &str, job_log_dir: &str, text: &str) -> String {
    format!("{OUT_PREFIX_MESSAGE}{time}|{job_log_dir}|{text}")
}

/// `[TASK JOB COMMAND]<time>|<dir>|[STDOUT] <line>` (or `[STDERR]`)
pub fn format_command(time: &str, job_log_dir: &str, stream: OutputStream, line: &str) -> String {
    format!(
        "{OUT_PREFIX_COMMAND}{time}|{job_log_dir}|{} {line}",
        stream.tag()
    )
}

/// `[TASK JOB ERROR]<time>|<dir>|<text>`
pub fn format_error(time: &str, job_log_dir: &str, text: &str) -> String {
    format!("{OUT_PREFIX_ERROR}{time}|{job_log_dir}|{text}")
}

// ---------------------------------------------------------------------------
// Line parsing (orchestration side)
// ---------------------------------------------------------------------------

/// Errors from interpreting a summary line's payload.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("unparseable summary payload: {0:?}")]
    Summary(String),
    #[error("unparseable poll context: {0}")]
    PollContext(#[from] serde_json::Error),
}

/// A summary record with its payload left raw; the reader knows which batch
/// operation produced the line and interprets accordingly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryLine {
    pub time: String,
    pub job_log_dir: String,
    /// Everything after the second `|`.
    pub rest: String,
}

impl SummaryLine {
    /// Interpret the payload as a submit/kill record: return code plus an
    /// optional runner-assigned job id.
    pub fn ret_code_and_id(&self) -> Result<(i32, Option<String>), ProtocolError> {
        let mut fields = self.rest.splitn(2, '|');
        let ret = fields
            .next()
            .and_then(|f| f.parse::<i32>().ok())
            .ok_or_else(|| ProtocolError::Summary(self.rest.clone()))?;
        Ok((ret, fields.next().map(str::to_string)))
    }

    /// Interpret the payload as a poll record: a JSON-encoded poll context.
    pub fn poll_context(&self) -> Result<JobPollContext, ProtocolError> {
        Ok(JobPollContext::from_summary_json(
            &self.job_log_dir,
            &self.rest,
        )?)
    }
}

/// One parsed batch-output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchLine {
    Summary(SummaryLine),
    Message {
        time: String,
        job_log_dir: String,
        text: String,
    },
    Command {
        time: String,
        job_log_dir: String,
        text: String,
    },
    Error {
        time: String,
        job_log_dir: String,
        text: String,
    },
}

impl BatchLine {
    /// Parse one line of batch-command stdout. Returns `None` for lines
    /// without a recognized prefix or without the three `|` fields.
    pub fn parse(line: &str) -> Option<BatchLine> {
        let line = line.trim_end_matches(['\r', '\n']);
        if let Some(body) = line.strip_prefix(OUT_PREFIX_SUMMARY) {
            let (time, job_log_dir, rest) = split_fields(body)?;
            return Some(BatchLine::Summary(SummaryLine {
                time,
                job_log_dir,
                rest,
            }));
        }
        if let Some(body) = line.strip_prefix(OUT_PREFIX_MESSAGE) {
            let (time, job_log_dir, text) = split_fields(body)?;
            return Some(BatchLine::Message {
                time,
                job_log_dir,
                text,
            });
        }
        if let Some(body) = line.strip_prefix(OUT_PREFIX_COMMAND) {
            let (time, job_log_dir, text) = split_fields(body)?;
            return Some(BatchLine::Command {
                time,
                job_log_dir,
                text,
            });
        }
        if let Some(body) = line.strip_prefix(OUT_PREFIX_ERROR) {
            let (time, job_log_dir, text) = split_fields(body)?;
            return Some(BatchLine::Error {
                time,
                job_log_dir,
                text,
            });
        }
        None
    }

    /// The job-log dir field, whichever record shape the line holds.
    pub fn job_log_dir(&self) -> &str {
        match self {
            BatchLine::Summary(summary) => &summary.job_log_dir,
            BatchLine::Message { job_log_dir, .. }
            | BatchLine::Command { job_log_dir, .. }
            | BatchLine::Error { job_log_dir, .. } => job_log_dir,
        }
    }
}

fn split_fields(body: &str) -> Option<(String, String, String)> {
    let mut fields = body.splitn(3, '|');
    let (Some(time), Some(dir), Some(rest)) = (fields.next(), fields.next(), fields.next()) else {
        return None;
    };
    if time.is_empty() || dir.is_empty() {
        return None;
    }
    Some((time.to_string(), dir.to_string(), rest.to_string()))
}

/// True when a line carries one of the batch-output prefixes, whether or not
/// the rest of it parses. Used to decide what deserves a warning.
pub fn has_batch_prefix(line: &str) -> bool {
    [
        OUT_PREFIX_SUMMARY,
        OUT_PREFIX_MESSAGE,
        OUT_PREFIX_COMMAND,
        OUT_PREFIX_ERROR,
    ]
    .iter()
    .any(|prefix| line.starts_with(prefix))
}

/// Split a `CYLC_MESSAGE` status value (`<time>|<severity>|<text>`) into its
/// parts. Returns `None` when the severity token is unknown or fields are
/// missing, in which case callers treat the whole value as plain text.
pub fn parse_status_message(value: &str) -> Option<(String, Severity, String)> {
    let mut fields = value.splitn(3, '|');
    let time = fields.next()?;
    let severity = fields.next()?.parse::<Severity>().ok()?;
    let text = fields.next()?;
    Some((time.to_string(), severity, text.to_string()))
}

// ---------------------------------------------------------------------------
// Poll context
// ---------------------------------------------------------------------------

/// Snapshot of one job's observed state, built from its status file and
/// enriched by live poll output.
///
/// Serialized (without the job-log dir, which travels in the summary line's
/// own field) as the JSON payload of a poll summary; `None` fields are
/// omitted from the JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPollContext {
    #[serde(skip)]
    pub job_log_dir: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_runner_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    /// 1 once the runner no longer knows the job (set by poll, not the job).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_runner_exit_polled: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<String>,
    /// 0 = succeeded, 1 = failed; `None` until the job's exit trap ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_status: Option<i32>,
    /// Signal name for a failed run (`ERR`, `EXIT`, `TERM`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_signal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_submit_exit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_run: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_run_exit: Option<String>,
    /// Raw `CYLC_MESSAGE` values in file order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,
}

impl JobPollContext {
    pub fn new(job_log_dir: impl Into<String>) -> Self {
        Self {
            job_log_dir: job_log_dir.into(),
            ..Self::default()
        }
    }

    /// Fold one status-file line into the context. Returns false for lines
    /// that are not a recognized `key=value` entry.
    pub fn update_from_status_line(&mut self, line: &str) -> bool {
        let line = line.trim_end_matches(['\r', '\n']);
        let Some((key, value)) = line.split_once('=') else {
            return false;
        };
        match key {
            JOB_STATUS_RUNNER_NAME => self.job_runner_name = Some(value.to_string()),
            JOB_STATUS_JOB_ID => self.job_id = Some(value.to_string()),
            JOB_STATUS_SUBMIT_TIME => self.time_submit_exit = Some(value.to_string()),
            JOB_STATUS_PID => self.pid = Some(value.to_string()),
            JOB_STATUS_INIT_TIME => self.time_run = Some(value.to_string()),
            JOB_STATUS_EXIT_TIME => self.time_run_exit = Some(value.to_string()),
            JOB_STATUS_EXIT_POLLED => self.job_runner_exit_polled = Some(1),
            JOB_STATUS_MESSAGE => self.messages.push(value.to_string()),
            JOB_STATUS_EXIT => {
                if value == JOB_EXIT_SUCCEEDED {
                    self.run_status = Some(0);
                } else {
                    self.run_status = Some(1);
                    self.run_signal = Some(value.to_string());
                }
            }
            _ => return false,
        }
        true
    }

    /// Merge a fresher context into this one: `Some` fields win, non-empty
    /// message lists replace.
    pub fn update(&mut self, other: &JobPollContext) {
        macro_rules! take {
            ($field:ident) => {
                if other.$field.is_some() {
                    self.$field = other.$field.clone();
                }
            };
        }
        take!(job_runner_name);
        take!(job_id);
        take!(job_runner_exit_polled);
        take!(pid);
        take!(run_status);
        take!(run_signal);
        take!(time_submit_exit);
        take!(time_run);
        take!(time_run_exit);
        if !other.messages.is_empty() {
            self.messages = other.messages.clone();
        }
    }

    /// True while the runner may still be tracking the job: it has a runner
    /// id and neither a recorded exit status nor an exit-polled mark.
    pub fn is_in_flight(&self) -> bool {
        self.job_id.is_some()
            && self.run_status.is_none()
            && self.job_runner_exit_polled.is_none()
    }

    /// Rebuild a context from a poll summary's dir field and JSON payload.
    pub fn from_summary_json(job_log_dir: &str, json: &str) -> Result<Self, serde_json::Error> {
        let mut ctx: JobPollContext = serde_json::from_str(json)?;
        ctx.job_log_dir = job_log_dir.to_string();
        Ok(ctx)
    }
}

impl fmt::Display for JobPollContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.job_log_dir)?;
        match (self.run_status, &self.time_run, &self.job_runner_exit_polled) {
            (Some(0), _, _) => write!(f, " succeeded"),
            (Some(_), _, _) => match &self.run_signal {
                Some(signal) => write!(f, " failed ({signal})"),
                None => write!(f, " failed"),
            },
            (None, Some(_), _) => write!(f, " running"),
            (None, None, Some(_)) => write!(f, " gone"),
            (None, None, None) => write!(f, " submitted"),
        }
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
