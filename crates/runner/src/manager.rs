// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batch job submission, polling and killing on a job host.
//!
//! `JobRunnerManager` is the job-host end of the scheduler's pipeline. It
//! works through a batch of job log dirs and prints one framed record per
//! job to the output sink, in batch order. A job that cannot be handled
//! becomes a return-code-1 summary record; it never aborts the rest of
//! the batch.

use std::collections::{HashMap, HashSet};
use std::ffi::OsStr;
use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::SecondsFormat;
use gyre_core::job::{JOB_ERR, JOB_OUT, JOB_SCRIPT, NN};
use gyre_core::protocol::{
    format_command, format_error, format_message, format_poll_summary, format_summary,
    OutputStream, JOB_STATUS_EXIT_POLLED, JOB_STATUS_JOB_ID, JOB_STATUS_SUBMIT_TIME,
    LINE_PREFIX_COMMAND_TEMPLATE, LINE_PREFIX_EXECUTION_TIME_LIMIT, LINE_PREFIX_JOB_RUNNER_NAME,
    STDIN_JOB_BEGIN, STDIN_JOB_END,
};
use gyre_core::{format_time, Clock, JobPollContext};
use tokio::process::Command;

use crate::background;
use crate::handler::{CommandResult, JobRunnerHandler, RunnerError, SubmitContext};
use crate::registry::JobRunnerRegistry;
use crate::statusfile;

/// Timeout for runner commands (submit, poll, kill).
const RUNNER_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// Where `jobs_submit` finds the job scripts for a batch.
#[derive(Debug, Clone, Copy)]
pub enum SubmitSource<'a> {
    /// Scripts are already installed under the job log root.
    LocalFiles,
    /// Scripts arrive framed on the batch command's stdin, one block per
    /// job between begin/end marker lines.
    Stdin(&'a str),
}

/// Works through batches of jobs on one job host.
pub struct JobRunnerManager {
    registry: JobRunnerRegistry,
    clock: Arc<dyn Clock>,
    utc_mode: bool,
}

struct SubmitReport {
    result: CommandResult,
    job_id: Option<String>,
}

impl JobRunnerManager {
    pub fn new(registry: JobRunnerRegistry, clock: Arc<dyn Clock>, utc_mode: bool) -> Self {
        Self {
            registry,
            clock,
            utc_mode,
        }
    }

    fn time_string(&self) -> String {
        let now = self.clock.now();
        if self.utc_mode {
            format_time(&now)
        } else {
            now.with_timezone(&chrono::Local)
                .to_rfc3339_opts(SecondsFormat::Secs, false)
        }
    }

    /// Submit every job in the batch, one summary record each, with any
    /// submit command output echoed as command records.
    pub async fn jobs_submit(
        &self,
        job_log_root: &Path,
        job_log_dirs: &[String],
        source: SubmitSource<'_>,
        out: &mut (dyn Write + Send),
    ) -> io::Result<()> {
        if let SubmitSource::Stdin(text) = source {
            install_scripts(job_log_root, text);
        }
        let now = self.time_string();
        for job_log_dir in job_log_dirs {
            match self.submit_one(job_log_root, job_log_dir).await {
                Ok(report) => {
                    writeln!(
                        out,
                        "{}",
                        format_summary(
                            &now,
                            job_log_dir,
                            report.result.ret_code,
                            report.job_id.as_deref(),
                        )
                    )?;
                    write_command_output(out, &now, job_log_dir, &report.result)?;
                }
                Err(err) => {
                    tracing::warn!(job = %job_log_dir, error = %err, "job submission failed");
                    writeln!(out, "{}", format_summary(&now, job_log_dir, 1, None))?;
                    writeln!(out, "{}", format_error(&now, job_log_dir, &err.to_string()))?;
                }
            }
        }
        Ok(())
    }

    async fn submit_one(
        &self,
        job_log_root: &Path,
        job_log_dir: &str,
    ) -> Result<SubmitReport, RunnerError> {
        let job_dir = job_log_root.join(job_log_dir);
        let script_path = job_dir.join(JOB_SCRIPT);
        let script = fs::read_to_string(&script_path)
            .map_err(|err| RunnerError::JobScript(format!("{}: {err}", script_path.display())))?;
        let header = parse_script_header(&script);
        let runner_name = header
            .job_runner_name
            .ok_or_else(|| RunnerError::MissingRunnerName(job_log_dir.to_string()))?;
        let handler = self
            .registry
            .get(&runner_name)
            .ok_or_else(|| RunnerError::UnknownRunner(runner_name.clone()))?;

        create_nn(&job_dir)?;
        for name in [JOB_OUT, JOB_ERR] {
            let _ = fs::remove_file(job_dir.join(name));
        }
        let status_path = statusfile::status_path(job_log_root, job_log_dir);
        statusfile::init(&status_path, &runner_name)?;

        tracing::info!(job = %job_log_dir, runner = %runner_name, "submitting job");
        let ctx = SubmitContext {
            job_script: &script_path,
            execution_time_limit: header.execution_time_limit,
        };
        let result = match handler.submit_direct(&ctx).await {
            Some(result) => result,
            None => {
                let template = header
                    .command_template
                    .or_else(|| handler.submit_command_template().map(str::to_string))
                    .ok_or_else(|| RunnerError::NoSubmitMethod(runner_name.clone()))?;
                let argv =
                    expand_template(&template, "{job}", &script_path.to_string_lossy());
                run_argv(&argv).await
            }
        };

        let mut job_id = None;
        if result.ret_code == 0 {
            job_id = extract_job_id(handler.as_ref(), &result);
            if let Some(id) = &job_id {
                statusfile::append(&status_path, JOB_STATUS_JOB_ID, id)?;
                statusfile::append(&status_path, JOB_STATUS_SUBMIT_TIME, &self.time_string())?;
            }
        }
        tracing::debug!(
            job = %job_log_dir,
            ret_code = result.ret_code,
            id = job_id.as_deref().unwrap_or("-"),
            "job submission finished"
        );
        Ok(SubmitReport { result, job_id })
    }

    /// Poll every job in the batch: read status files, bulk-query each
    /// runner once for the jobs still in flight, then print any recorded
    /// messages and one summary record per job.
    pub async fn jobs_poll(
        &self,
        job_log_root: &Path,
        job_log_dirs: &[String],
        out: &mut (dyn Write + Send),
    ) -> io::Result<()> {
        let now = self.time_string();
        let mut contexts: Vec<JobPollContext> = Vec::new();
        let mut by_runner: HashMap<String, Vec<usize>> = HashMap::new();
        for job_log_dir in job_log_dirs {
            let ctx = match statusfile::read_context(job_log_root, job_log_dir) {
                Ok(ctx) => ctx,
                Err(err) => {
                    tracing::warn!(job = %job_log_dir, error = %err, "cannot poll job");
                    writeln!(out, "{}", format_error(&now, job_log_dir, &err.to_string()))?;
                    continue;
                }
            };
            if ctx.is_in_flight() {
                if let Some(name) = &ctx.job_runner_name {
                    by_runner.entry(name.clone()).or_default().push(contexts.len());
                }
            }
            contexts.push(ctx);
        }

        let mut groups: Vec<(String, Vec<usize>)> = by_runner.into_iter().collect();
        groups.sort_by(|a, b| a.0.cmp(&b.0));
        for (runner_name, indexes) in groups {
            match self.registry.get(&runner_name) {
                Some(handler) => {
                    self.poll_runner_group(job_log_root, handler, &mut contexts, &indexes)
                        .await;
                }
                None => {
                    for &i in &indexes {
                        let text = format!("unknown job runner: {runner_name}");
                        writeln!(out, "{}", format_error(&now, &contexts[i].job_log_dir, &text))?;
                    }
                }
            }
        }

        for ctx in &contexts {
            for message in &ctx.messages {
                writeln!(out, "{}", format_message(&now, &ctx.job_log_dir, message))?;
            }
            let line = format_poll_summary(&now, ctx).map_err(io::Error::other)?;
            writeln!(out, "{line}")?;
        }
        Ok(())
    }

    /// One bulk poll for every in-flight job of a single runner.
    ///
    /// Jobs whose id is no longer visible get a durable exit-polled mark,
    /// then a status file re-read: the job may have exited normally between
    /// the first read and the poll, leaving its exit records behind.
    async fn poll_runner_group(
        &self,
        job_log_root: &Path,
        handler: Arc<dyn JobRunnerHandler>,
        contexts: &mut [JobPollContext],
        indexes: &[usize],
    ) {
        let job_ids: Vec<String> = indexes
            .iter()
            .filter_map(|&i| contexts[i].job_id.clone())
            .collect();
        if job_ids.is_empty() {
            return;
        }
        let result = run_argv(&handler.poll_command(&job_ids)).await;
        if result.ret_code != 0 && !result.err.trim().is_empty() {
            tracing::debug!(
                runner = %handler.name(),
                error = %result.err.trim(),
                "poll command reported errors"
            );
        }
        let alive: HashSet<String> = match handler.filter_poll_output(&result.out) {
            Some(ids) => ids.into_iter().collect(),
            None => first_column_matches(&result.out, &job_ids),
        };
        let alive_pids = if handler.should_poll_proc_group() {
            let pids: Vec<String> = indexes
                .iter()
                .filter_map(|&i| contexts[i].pid.clone())
                .collect();
            if pids.is_empty() {
                None
            } else {
                let ps = run_argv(&background::ps_poll_argv(&pids)).await;
                Some(first_column_matches(&ps.out, &pids))
            }
        } else {
            None
        };

        for &i in indexes {
            let ctx = &mut contexts[i];
            let Some(job_id) = ctx.job_id.clone() else {
                continue;
            };
            let mut exited = !alive.contains(&job_id);
            if exited {
                if let (Some(pids), Some(pid)) = (&alive_pids, &ctx.pid) {
                    if pids.contains(pid) {
                        // Runner forgot the job but its process group lives on.
                        exited = false;
                    }
                }
            }
            if !exited {
                continue;
            }
            let status_path = statusfile::status_path(job_log_root, &ctx.job_log_dir);
            if let Err(err) =
                statusfile::append(&status_path, JOB_STATUS_EXIT_POLLED, &self.time_string())
            {
                tracing::warn!(job = %ctx.job_log_dir, error = %err, "cannot mark job exit");
            }
            match statusfile::read_context(job_log_root, &ctx.job_log_dir) {
                Ok(fresh) => ctx.update(&fresh),
                Err(_) => ctx.job_runner_exit_polled = Some(1),
            }
        }
    }

    /// Kill every job in the batch, one summary record each.
    pub async fn jobs_kill(
        &self,
        job_log_root: &Path,
        job_log_dirs: &[String],
        out: &mut (dyn Write + Send),
    ) -> io::Result<()> {
        let now = self.time_string();
        for job_log_dir in job_log_dirs {
            let (ret_code, err) = match self.kill_one(job_log_root, job_log_dir).await {
                Ok(result) => (result.ret_code, result.err),
                Err(err) => (1, err.to_string()),
            };
            writeln!(out, "{}", format_summary(&now, job_log_dir, ret_code, None))?;
            for line in err.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                writeln!(out, "{}", format_error(&now, job_log_dir, line))?;
            }
        }
        Ok(())
    }

    async fn kill_one(
        &self,
        job_log_root: &Path,
        job_log_dir: &str,
    ) -> Result<CommandResult, RunnerError> {
        let ctx = statusfile::read_context(job_log_root, job_log_dir)?;
        let runner_name = ctx
            .job_runner_name
            .clone()
            .ok_or_else(|| RunnerError::MissingRunnerName(job_log_dir.to_string()))?;
        let handler = self
            .registry
            .get(&runner_name)
            .ok_or_else(|| RunnerError::UnknownRunner(runner_name.clone()))?;
        let job_id = ctx
            .job_id
            .clone()
            .ok_or_else(|| RunnerError::MissingJobId(job_log_dir.to_string()))?;
        tracing::info!(job = %job_log_dir, runner = %runner_name, id = %job_id, "killing job");
        if handler.should_kill_proc_group() {
            let pid = ctx.pid.clone().unwrap_or_else(|| job_id.clone());
            Ok(run_argv(&background::kill_process_group_argv(&pid)).await)
        } else if let Some(template) = handler.kill_command_template() {
            let argv = expand_template(template, "{job_id}", &job_id);
            Ok(run_argv(&argv).await)
        } else {
            Err(RunnerError::NoKillMethod(runner_name))
        }
    }
}

/// Per-job header values parsed from an installed job script.
#[derive(Debug, Default)]
struct JobScriptHeader {
    job_runner_name: Option<String>,
    command_template: Option<String>,
    execution_time_limit: Option<f64>,
}

fn parse_script_header(text: &str) -> JobScriptHeader {
    let mut header = JobScriptHeader::default();
    for line in text.lines() {
        if let Some(value) = line.strip_prefix(LINE_PREFIX_JOB_RUNNER_NAME) {
            header.job_runner_name = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix(LINE_PREFIX_COMMAND_TEMPLATE) {
            header.command_template = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix(LINE_PREFIX_EXECUTION_TIME_LIMIT) {
            header.execution_time_limit = value.trim().parse().ok();
        }
    }
    header
}

/// Split a command template on whitespace and expand `key` in each token.
fn expand_template(template: &str, key: &str, value: &str) -> Vec<String> {
    template
        .split_whitespace()
        .map(|token| token.replace(key, value))
        .collect()
}

/// Run an argv, folding spawn failures and timeouts into the result.
async fn run_argv(argv: &[String]) -> CommandResult {
    let Some((program, args)) = argv.split_first() else {
        return CommandResult {
            ret_code: 1,
            out: String::new(),
            err: "empty command".to_string(),
        };
    };
    let mut cmd = Command::new(program);
    cmd.args(args).stdin(std::process::Stdio::null());
    match tokio::time::timeout(RUNNER_COMMAND_TIMEOUT, cmd.output()).await {
        Ok(Ok(output)) => CommandResult {
            ret_code: output.status.code().unwrap_or(1),
            out: String::from_utf8_lossy(&output.stdout).into_owned(),
            err: String::from_utf8_lossy(&output.stderr).into_owned(),
        },
        Ok(Err(io_err)) => CommandResult {
            ret_code: 1,
            out: String::new(),
            err: format!("{program} failed: {io_err}"),
        },
        Err(_elapsed) => CommandResult {
            ret_code: 1,
            out: String::new(),
            err: format!(
                "{program} timed out after {}s",
                RUNNER_COMMAND_TIMEOUT.as_secs()
            ),
        },
    }
}

fn extract_job_id(handler: &dyn JobRunnerHandler, result: &CommandResult) -> Option<String> {
    let sources = [
        (handler.rec_id_from_submit_out(), &result.out),
        (handler.rec_id_from_submit_err(), &result.err),
    ];
    for (regex, text) in sources {
        let Some(regex) = regex else { continue };
        for line in text.lines() {
            if let Some(id) = regex
                .captures(line)
                .and_then(|caps| caps.name("id").map(|m| m.as_str().to_string()))
            {
                return Some(handler.manip_job_id(&id));
            }
        }
    }
    None
}

/// Ids whose first-column appearance in `out` confirms them alive.
fn first_column_matches(out: &str, job_ids: &[String]) -> HashSet<String> {
    let mut alive = HashSet::new();
    for line in out.lines() {
        if let Some(first) = line.split_whitespace().next() {
            if job_ids.iter().any(|id| id == first) {
                alive.insert(first.to_string());
            }
        }
    }
    alive
}

fn write_command_output(
    out: &mut (dyn Write + Send),
    now: &str,
    job_log_dir: &str,
    result: &CommandResult,
) -> io::Result<()> {
    let streams = [
        (OutputStream::Stderr, &result.err),
        (OutputStream::Stdout, &result.out),
    ];
    for (stream, text) in streams {
        if text.trim().is_empty() {
            continue;
        }
        for line in text.lines() {
            writeln!(out, "{}", format_command(now, job_log_dir, stream, line))?;
        }
    }
    Ok(())
}

/// Maintain the `NN` symlink next to the submit dir and, on a first
/// submit, sweep away numbered dirs left over from earlier runs.
fn create_nn(job_dir: &Path) -> Result<(), RunnerError> {
    let source = job_dir
        .file_name()
        .ok_or_else(|| io::Error::other(format!("{} has no dir name", job_dir.display())))?;
    let task_dir = job_dir
        .parent()
        .ok_or_else(|| io::Error::other(format!("{} has no parent dir", job_dir.display())))?;
    let nn_path = task_dir.join(NN);
    match fs::read_link(&nn_path) {
        Ok(old) if old.as_os_str() == source => {}
        Ok(_) => {
            fs::remove_file(&nn_path)?;
            symlink(source, &nn_path)?;
        }
        Err(_) => {
            let _ = fs::remove_file(&nn_path);
            symlink(source, &nn_path)?;
        }
    }
    if source.to_str() == Some("01") {
        purge_old_submit_dirs(task_dir, source);
    }
    Ok(())
}

fn purge_old_submit_dirs(task_dir: &Path, keep: &OsStr) {
    let Ok(entries) = fs::read_dir(task_dir) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        if name.as_os_str() == keep {
            continue;
        }
        let numbered = name
            .to_str()
            .is_some_and(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()));
        if numbered {
            let _ = fs::remove_dir_all(entry.path());
        }
    }
}

/// Install job scripts streamed over stdin in remote mode. Failures are
/// logged and surface as per-job submission errors later in the batch.
fn install_scripts(job_log_root: &Path, text: &str) {
    let mut current: Option<(String, String)> = None;
    for line in text.lines() {
        if let Some(dir) = line.strip_prefix(STDIN_JOB_BEGIN) {
            current = Some((dir.trim().to_string(), String::new()));
        } else if line == STDIN_JOB_END {
            if let Some((dir, script)) = current.take() {
                if let Err(err) = install_one_script(job_log_root, &dir, &script) {
                    tracing::warn!(job = %dir, error = %err, "cannot install job script");
                }
            }
        } else if let Some((_, script)) = current.as_mut() {
            script.push_str(line);
            script.push('\n');
        }
    }
}

fn install_one_script(job_log_root: &Path, job_log_dir: &str, script: &str) -> io::Result<()> {
    let dir = job_log_root.join(job_log_dir);
    fs::create_dir_all(&dir)?;
    let path = dir.join(JOB_SCRIPT);
    fs::write(&path, script)?;
    let mut perms = fs::metadata(&path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms)?;
    Ok(())
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
