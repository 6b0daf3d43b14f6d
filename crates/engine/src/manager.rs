// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task job orchestration: prepare, submit, poll, and kill jobs in batches.
//!
//! Every batch operation is dispatched through the command pool and returns
//! immediately; the pool reports each finished command as a
//! [`CommandOutcome`] which the owner feeds back through
//! [`TaskJobManager::handle_outcome`]. Callbacks never hold task references
//! across that gap. They carry job keys and re-resolve them against the task
//! pool when the outcome lands, so outcomes for superseded or retired
//! submissions are dropped harmlessly.
//!
//! An ssh exit of 255 anywhere means "host unreachable", never "job failed":
//! the host is marked bad, the affected tasks stay in the preparing state,
//! and the next submission attempt moves on to the next host or platform.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use gyre_core::platform::LOCALHOST;
use gyre_core::protocol::{has_batch_prefix, parse_status_message, BatchLine, SummaryLine};
use gyre_core::{
    format_time, ActionTimer, Clock, JobPollContext, PlatformConfig, Platforms, Severity,
    TaskEvent, TaskJobKey, TaskProxy, TaskState,
};
use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::broadcast::BroadcastLookup;
use crate::db::{JobDatabase, JobRow, JobUpdate};
use crate::events::TaskEvents;
use crate::hosts::HostSelector;
use crate::jobfile;
use crate::pool::{CommandOutcome, CommandPool, CommandRequest};
use crate::remote::{ssh_argv, RemoteMgr, RemotePhase, RemoteState};
use crate::taskpool::TaskPool;

/// Extra seconds past the execution time limit before the deadline poll.
const TIME_LIMIT_POLL_PADDING: f64 = 60.0;

/// Per-job command echo and error records land here, next to the job script.
const JOB_ACTIVITY_LOG: &str = "job-activity.log";

/// What a pending batch was dispatched to do.
#[derive(Debug, Clone, PartialEq, Eq)]
enum BatchKind {
    Submit,
    Poll,
    Kill,
    RemoteInit { install_target: String },
    FileInstall { install_target: String },
}

/// Bookkeeping for one dispatched batch, keyed by the request key.
#[derive(Debug, Clone)]
struct PendingBatch {
    kind: BatchKind,
    platform: PlatformConfig,
    host: String,
    keys: Vec<TaskJobKey>,
}

/// Collaborators the manager writes through.
pub struct TaskJobDeps<P, E, D, B> {
    pub pool: P,
    pub events: E,
    pub db: D,
    pub broadcasts: B,
}

/// Orchestrates the job side of every live task.
pub struct TaskJobManager<P, E, D, B> {
    platforms: Platforms,
    job_log_root: PathBuf,
    tasks: Arc<Mutex<TaskPool>>,
    deps: TaskJobDeps<P, E, D, B>,
    clock: Arc<dyn Clock>,
    hosts: HostSelector,
    remotes: RemoteMgr,
    pending: Mutex<HashMap<String, PendingBatch>>,
}

impl<P, E, D, B> TaskJobManager<P, E, D, B>
where
    P: CommandPool,
    E: TaskEvents,
    D: JobDatabase,
    B: BroadcastLookup,
{
    pub fn new(
        platforms: Platforms,
        job_log_root: impl Into<PathBuf>,
        tasks: Arc<Mutex<TaskPool>>,
        deps: TaskJobDeps<P, E, D, B>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            platforms,
            job_log_root: job_log_root.into(),
            tasks,
            deps,
            clock,
            hosts: HostSelector::new(),
            remotes: RemoteMgr::new(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// The shared bad-host record.
    pub fn hosts(&self) -> &HostSelector {
        &self.hosts
    }

    /// Remote provisioning state per install target.
    pub fn remotes(&self) -> &RemoteMgr {
        &self.remotes
    }

    /// Batches dispatched but not yet reported back.
    pub fn pending_batches(&self) -> usize {
        self.pending.lock().len()
    }

    // ==== submit ===========================================================

    /// Prepare and submit jobs for the given tasks.
    ///
    /// Waiting tasks move to preparing and take a fresh submit number; tasks
    /// already preparing (an earlier attempt hit an unreachable host or a
    /// remote target still provisioning) keep theirs. Tasks with a batch in
    /// flight, or past preparing, are skipped.
    pub fn submit_task_jobs(&self, relative_ids: &[String]) {
        let time_now = format_time(&self.clock.now());
        let mut groups: IndexMap<String, Vec<String>> = IndexMap::new();
        {
            let mut tasks = self.tasks.lock();
            for id in relative_ids {
                let Some(task) = tasks.get_mut(id) else {
                    tracing::warn!(task = %id, "submit requested for unknown task");
                    continue;
                };
                if task.in_flight {
                    tracing::debug!(task = %id, "submit skipped, batch in flight");
                    continue;
                }
                match task.state {
                    TaskState::Waiting => {
                        task.advance(TaskState::Preparing);
                        task.next_submit_num();
                    }
                    TaskState::Preparing => {}
                    other => {
                        tracing::debug!(task = %id, state = %other, "submit skipped");
                        continue;
                    }
                }
                groups
                    .entry(task.platform_name.clone())
                    .or_default()
                    .push(id.clone());
            }
        }
        for (platform_name, ids) in groups {
            self.submit_group(&platform_name, &ids, &time_now);
        }
    }

    fn submit_group(&self, platform_name: &str, ids: &[String], time_now: &str) {
        let Some((platform, host)) = self.hosts.select(&self.platforms, platform_name) else {
            let all_hosts = self.hosts.candidate_hosts(&self.platforms, platform_name);
            if all_hosts.is_empty() {
                tracing::warn!(platform = %platform_name, "unknown platform for submission");
            } else {
                tracing::warn!(
                    platform = %platform_name,
                    hosts = all_hosts.len(),
                    "all submission hosts unreachable, giving up"
                );
                // Clear the marks so a later retry starts from a clean slate.
                self.hosts.forget(&all_hosts);
            }
            self.fail_submission(ids, time_now);
            return;
        };
        if !platform.is_local() && !self.remote_ready(&platform, &host, ids, time_now) {
            return;
        }

        let mut prepared: Vec<TaskJobKey> = Vec::new();
        let mut scripts: Vec<(String, String)> = Vec::new();
        {
            let mut tasks = self.tasks.lock();
            for id in ids {
                let Some(task) = tasks.get_mut(id) else {
                    continue;
                };
                if let Some(overrides) = self.deps.broadcasts.overrides_for(&task.point, &task.name)
                {
                    task.runtime.apply_overrides(&overrides);
                    tracing::info!(task = %id, "broadcast overrides applied");
                }
                let key = task.key();
                let script = jobfile::render(&key, &platform, &task.runtime);
                if let Err(err) = jobfile::install(&self.job_log_root, &key, &script) {
                    tracing::warn!(task = %id, error = %err, "cannot write job script");
                    self.process_state_event(task, &platform, TaskEvent::SubmitFailed, time_now);
                    continue;
                }
                task.selected_platform = Some(platform.name.clone());
                task.job_runner_name = Some(platform.job_runner_name.clone());
                task.job_id = None;
                task.in_flight = true;
                self.deps.db.insert_job(JobRow::new(
                    key.clone(),
                    &platform.name,
                    &platform.job_runner_name,
                ));
                scripts.push((key.job_log_dir(), script));
                prepared.push(key);
            }
        }
        if prepared.is_empty() {
            return;
        }

        // Jobs on a foreign filesystem travel to the runner over stdin.
        let remote_mode = !platform.is_local();
        let batch_size = platform.max_batch_size.max(1);
        for (chunk, chunk_scripts) in prepared.chunks(batch_size).zip(scripts.chunks(batch_size)) {
            let dirs: Vec<String> = chunk.iter().map(TaskJobKey::job_log_dir).collect();
            let argv = self.jobs_submit_argv(&dirs, remote_mode);
            let stdin = remote_mode.then(|| jobfile::frame_for_stdin(chunk_scripts));
            self.dispatch(BatchKind::Submit, &platform, &host, chunk.to_vec(), argv, stdin);
        }
        tracing::info!(
            platform = %platform.name,
            host = %host,
            jobs = prepared.len(),
            "job submission dispatched"
        );
    }

    /// Check (and if needed start) provisioning for a remote install target.
    /// Returns true when jobs may be submitted to it right now.
    fn remote_ready(
        &self,
        platform: &PlatformConfig,
        host: &str,
        ids: &[String],
        time_now: &str,
    ) -> bool {
        let target = platform.install_target();
        match self.remotes.state(target) {
            Some(RemoteState::Done(RemotePhase::FileInstall)) => true,
            Some(RemoteState::InProgress(phase)) => {
                tracing::debug!(
                    install_target = %target,
                    phase = ?phase,
                    "remote provisioning in progress, submission deferred"
                );
                false
            }
            Some(RemoteState::Done(RemotePhase::RemoteInit)) => {
                self.start_file_install(platform, host);
                false
            }
            Some(RemoteState::Failed) => {
                tracing::warn!(install_target = %target, "remote provisioning failed");
                self.remotes.clear(target);
                self.fail_submission(ids, time_now);
                false
            }
            Some(RemoteState::Failed255) | None => {
                if matches!(self.remotes.state(target), Some(RemoteState::Failed255)) {
                    self.remotes.clear(target);
                }
                self.start_remote_init(platform, host);
                false
            }
        }
    }

    fn start_remote_init(&self, platform: &PlatformConfig, host: &str) {
        let target = platform.install_target().to_string();
        self.remotes
            .set(&target, RemoteState::InProgress(RemotePhase::RemoteInit));
        let argv = self.remote_init_argv(&target);
        tracing::info!(install_target = %target, host = %host, "remote init started");
        self.dispatch(
            BatchKind::RemoteInit {
                install_target: target,
            },
            platform,
            host,
            Vec::new(),
            argv,
            None,
        );
    }

    fn start_file_install(&self, platform: &PlatformConfig, host: &str) {
        let target = platform.install_target().to_string();
        self.remotes
            .set(&target, RemoteState::InProgress(RemotePhase::FileInstall));
        let argv = self.file_install_argv(&target);
        tracing::info!(install_target = %target, host = %host, "file install started");
        self.dispatch(
            BatchKind::FileInstall {
                install_target: target,
            },
            platform,
            host,
            Vec::new(),
            argv,
            None,
        );
    }

    /// Mark every listed task submit-failed.
    fn fail_submission(&self, relative_ids: &[String], time_now: &str) {
        let mut tasks = self.tasks.lock();
        for id in relative_ids {
            let Some(task) = tasks.get_mut(id) else {
                continue;
            };
            let platform = self.platform_of(task);
            self.process_state_event(task, &platform, TaskEvent::SubmitFailed, time_now);
            task.in_flight = false;
        }
    }

    // ==== poll =============================================================

    /// Poll the latest job of each given task.
    pub fn poll_task_jobs(&self, relative_ids: &[String]) {
        let mut groups: IndexMap<String, Vec<TaskJobKey>> = IndexMap::new();
        {
            let mut tasks = self.tasks.lock();
            for id in relative_ids {
                let Some(task) = tasks.get_mut(id) else {
                    tracing::warn!(task = %id, "poll requested for unknown task");
                    continue;
                };
                if !task.is_active() {
                    tracing::debug!(task = %id, state = %task.state, "poll skipped");
                    continue;
                }
                if task.in_flight {
                    tracing::debug!(task = %id, "poll skipped, batch in flight");
                    continue;
                }
                task.in_flight = true;
                let platform_name = task
                    .selected_platform
                    .clone()
                    .unwrap_or_else(|| task.platform_name.clone());
                groups.entry(platform_name).or_default().push(task.key());
            }
        }
        for (platform_name, keys) in groups {
            self.dispatch_job_batches(BatchKind::Poll, &platform_name, keys);
        }
    }

    /// Ask the runner to kill the latest job of each given task.
    ///
    /// A kill does not finalize the task by itself: the job's exit trap (or
    /// its disappearance) is observed by the next poll.
    pub fn kill_task_jobs(&self, relative_ids: &[String]) {
        let mut groups: IndexMap<String, Vec<TaskJobKey>> = IndexMap::new();
        {
            let mut tasks = self.tasks.lock();
            for id in relative_ids {
                let Some(task) = tasks.get_mut(id) else {
                    tracing::warn!(task = %id, "kill requested for unknown task");
                    continue;
                };
                if !task.is_active() {
                    tracing::debug!(task = %id, state = %task.state, "kill skipped");
                    continue;
                }
                if task.in_flight {
                    tracing::debug!(task = %id, "kill skipped, batch in flight");
                    continue;
                }
                task.in_flight = true;
                let platform_name = task
                    .selected_platform
                    .clone()
                    .unwrap_or_else(|| task.platform_name.clone());
                groups.entry(platform_name).or_default().push(task.key());
            }
        }
        for (platform_name, keys) in groups {
            self.dispatch_job_batches(BatchKind::Kill, &platform_name, keys);
        }
    }

    /// Scan active tasks for due poll timers and expired deadlines, and poll
    /// whatever needs it. Deadlines trigger a poll, never a kill: the poll
    /// re-read decides what actually became of the job.
    pub fn check_task_jobs(&self) {
        let now = self.clock.now();
        let mut due: Vec<String> = Vec::new();
        {
            let mut tasks = self.tasks.lock();
            for task in tasks.iter_mut() {
                if !task.is_active() || task.in_flight {
                    continue;
                }
                let mut want_poll = false;
                if let Some(deadline) = task.submission_deadline {
                    if now >= deadline {
                        tracing::warn!(task = %task.relative_id(), "submission timeout, polling");
                        task.submission_deadline = None;
                        want_poll = true;
                    }
                }
                if let Some(deadline) = task.execution_deadline {
                    if now >= deadline {
                        tracing::warn!(task = %task.relative_id(), "execution timeout, polling");
                        task.execution_deadline = None;
                        want_poll = true;
                    }
                }
                if let Some(timer) = task.poll_timer.as_mut() {
                    if timer.is_due(now) {
                        timer.next(now, true);
                        want_poll = true;
                    }
                }
                if want_poll {
                    due.push(task.relative_id());
                }
            }
        }
        if !due.is_empty() {
            self.poll_task_jobs(&due);
        }
    }

    fn dispatch_job_batches(&self, kind: BatchKind, platform_name: &str, keys: Vec<TaskJobKey>) {
        let Some((platform, host)) = self.hosts.select(&self.platforms, platform_name) else {
            tracing::warn!(platform = %platform_name, "no reachable host for job batch");
            self.release_keys(&keys);
            return;
        };
        let batch_size = platform.max_batch_size.max(1);
        for chunk in keys.chunks(batch_size) {
            let dirs: Vec<String> = chunk.iter().map(TaskJobKey::job_log_dir).collect();
            let argv = match kind {
                BatchKind::Poll => self.jobs_poll_argv(&dirs),
                BatchKind::Kill => self.jobs_kill_argv(&dirs),
                _ => return,
            };
            self.dispatch(kind.clone(), &platform, &host, chunk.to_vec(), argv, None);
        }
        tracing::debug!(
            kind = ?kind,
            platform = %platform.name,
            host = %host,
            jobs = keys.len(),
            "job batch dispatched"
        );
    }

    // ==== outcomes =========================================================

    /// Route one finished batch command back to its callback.
    pub fn handle_outcome(&self, outcome: CommandOutcome) {
        let Some(batch) = self.pending.lock().remove(&outcome.key) else {
            tracing::warn!(key = %outcome.key, "outcome for unknown batch dropped");
            return;
        };
        if !outcome.stderr.trim().is_empty() {
            tracing::debug!(
                key = %outcome.key,
                host = %outcome.host,
                stderr = %outcome.stderr.trim(),
                "batch command stderr"
            );
        }
        match &batch.kind {
            BatchKind::Submit if outcome.ret_code == 255 => self.host_unreachable(&batch, &outcome),
            BatchKind::Submit => self.submit_callback(&batch, &outcome),
            BatchKind::Poll if outcome.ret_code == 255 => self.host_unreachable(&batch, &outcome),
            BatchKind::Poll => self.poll_callback(&batch, &outcome),
            BatchKind::Kill if outcome.ret_code == 255 => self.host_unreachable(&batch, &outcome),
            BatchKind::Kill => self.kill_callback(&batch, &outcome),
            BatchKind::RemoteInit { install_target } => {
                self.remote_init_callback(install_target, &batch, &outcome)
            }
            BatchKind::FileInstall { install_target } => {
                self.file_install_callback(install_target, &batch, &outcome)
            }
        }
    }

    /// Shared 255 path for submit, poll, and kill batches: the host is bad,
    /// nothing is known about the jobs, and the tasks are freed for another
    /// attempt.
    fn host_unreachable(&self, batch: &PendingBatch, outcome: &CommandOutcome) {
        tracing::debug!(
            host = %outcome.host,
            kind = ?batch.kind,
            stderr = %outcome.stderr.trim(),
            "batch host unreachable"
        );
        self.hosts.mark_bad(&outcome.host);
        self.release_batch(batch);
    }

    fn submit_callback(&self, batch: &PendingBatch, outcome: &CommandOutcome) {
        let time_now = format_time(&self.clock.now());
        let output = self.parse_batch_output(outcome);
        let mut tasks = self.tasks.lock();
        for key in &batch.keys {
            let dir = key.job_log_dir();
            let Some(task) = live_task(&mut tasks, key) else {
                continue;
            };
            task.in_flight = false;
            match output.summaries.get(&dir) {
                Some(summary) => match summary.ret_code_and_id() {
                    Ok((0, job_id)) => {
                        task.job_id = job_id.clone();
                        self.process_state_event(
                            task,
                            &batch.platform,
                            TaskEvent::Submitted,
                            &summary.time,
                        );
                        self.deps.db.update_job(
                            key,
                            JobUpdate {
                                job_id,
                                submitted_time: Some(summary.time.clone()),
                                ret_code: Some(0),
                                ..JobUpdate::default()
                            },
                        );
                    }
                    Ok((ret_code, _)) => {
                        tracing::warn!(job = %dir, ret_code, "job submission failed");
                        self.process_state_event(
                            task,
                            &batch.platform,
                            TaskEvent::SubmitFailed,
                            &summary.time,
                        );
                        self.deps.db.update_job(
                            key,
                            JobUpdate {
                                ret_code: Some(ret_code),
                                ..JobUpdate::default()
                            },
                        );
                    }
                    Err(err) => {
                        tracing::warn!(job = %dir, error = %err, "bad submission record");
                        self.process_state_event(
                            task,
                            &batch.platform,
                            TaskEvent::SubmitFailed,
                            &time_now,
                        );
                    }
                },
                None => {
                    // The batch ran but never reported this job.
                    tracing::warn!(job = %dir, "no submission record in batch output");
                    self.process_state_event(
                        task,
                        &batch.platform,
                        TaskEvent::SubmitFailed,
                        &time_now,
                    );
                    self.deps.db.update_job(
                        key,
                        JobUpdate {
                            ret_code: Some(1),
                            ..JobUpdate::default()
                        },
                    );
                }
            }
        }
    }

    fn poll_callback(&self, batch: &PendingBatch, outcome: &CommandOutcome) {
        let time_now = format_time(&self.clock.now());
        let output = self.parse_batch_output(outcome);
        let mut tasks = self.tasks.lock();
        for key in &batch.keys {
            let dir = key.job_log_dir();
            let Some(task) = live_task(&mut tasks, key) else {
                continue;
            };
            task.in_flight = false;
            match output.summaries.get(&dir) {
                Some(summary) => match summary.poll_context() {
                    Ok(ctx) => {
                        self.apply_poll_context(task, key, &batch.platform, &ctx, &time_now)
                    }
                    Err(err) => {
                        // Job state stays unknown until the next poll.
                        tracing::warn!(job = %dir, error = %err, "bad poll record");
                    }
                },
                None => {
                    // An active job the runner knows nothing about is gone.
                    tracing::warn!(job = %dir, "no poll record in batch output, job lost");
                    self.process_state_event(
                        task,
                        &batch.platform,
                        TaskEvent::Failed { signal: None },
                        &time_now,
                    );
                }
            }
        }
    }

    /// Translate one polled job context into task events.
    fn apply_poll_context(
        &self,
        task: &mut TaskProxy,
        key: &TaskJobKey,
        platform: &PlatformConfig,
        ctx: &JobPollContext,
        time_now: &str,
    ) {
        // Progress messages first, then the overall judgement.
        for raw in &ctx.messages {
            match parse_status_message(raw) {
                Some((time, severity, text)) => {
                    self.deps
                        .events
                        .process(task, TaskEvent::Message { severity, text }, &time);
                }
                None => {
                    tracing::warn!(job = %key, message = %raw, "malformed status message");
                    self.deps.events.process(
                        task,
                        TaskEvent::Message {
                            severity: Severity::Info,
                            text: raw.clone(),
                        },
                        time_now,
                    );
                }
            }
        }
        if task.job_id.is_none() {
            task.job_id = ctx.job_id.clone();
        }

        let exit_polled = ctx.job_runner_exit_polled == Some(1);
        let time_run = ctx.time_run.clone().unwrap_or_else(|| time_now.to_string());
        let time_run_exit = ctx
            .time_run_exit
            .clone()
            .unwrap_or_else(|| time_now.to_string());
        if ctx.run_status == Some(1)
            && matches!(ctx.run_signal.as_deref(), Some("ERR") | Some("EXIT"))
        {
            // The error trap ran: a plain failure.
            self.process_state_event(
                task,
                platform,
                TaskEvent::Failed { signal: None },
                &time_run_exit,
            );
        } else if ctx.run_status == Some(1) && exit_polled {
            // Failed by signal, and no longer in the runner.
            self.process_state_event(
                task,
                platform,
                TaskEvent::Failed {
                    signal: ctx.run_signal.clone(),
                },
                &time_run_exit,
            );
        } else if ctx.run_status == Some(1) {
            // Terminated but still managed; some runners restart such jobs.
            self.process_state_event(task, platform, TaskEvent::Started, &time_run);
        } else if ctx.run_status == Some(0) {
            self.process_state_event(task, platform, TaskEvent::Succeeded, &time_run_exit);
        } else if ctx.time_run.is_some() && exit_polled {
            // Gone without running its exit trap.
            self.process_state_event(
                task,
                platform,
                TaskEvent::Failed { signal: None },
                time_now,
            );
        } else if ctx.time_run.is_some() {
            self.process_state_event(task, platform, TaskEvent::Started, &time_run);
        } else if exit_polled {
            // Never ran, and no longer in the runner.
            self.process_state_event(task, platform, TaskEvent::SubmitFailed, time_now);
        } else {
            let time = ctx
                .time_submit_exit
                .clone()
                .unwrap_or_else(|| time_now.to_string());
            self.process_state_event(task, platform, TaskEvent::Submitted, &time);
        }

        self.deps.db.update_job(
            key,
            JobUpdate {
                job_id: ctx.job_id.clone(),
                submitted_time: ctx.time_submit_exit.clone(),
                started_time: ctx.time_run.clone(),
                finished_time: ctx.time_run_exit.clone(),
                ret_code: ctx.run_status,
            },
        );
    }

    fn kill_callback(&self, batch: &PendingBatch, outcome: &CommandOutcome) {
        let output = self.parse_batch_output(outcome);
        let mut tasks = self.tasks.lock();
        for key in &batch.keys {
            let dir = key.job_log_dir();
            let Some(task) = live_task(&mut tasks, key) else {
                continue;
            };
            task.in_flight = false;
            match output.summaries.get(&dir).map(SummaryLine::ret_code_and_id) {
                Some(Ok((0, _))) => {
                    tracing::info!(job = %dir, "job kill acknowledged");
                }
                Some(Ok((ret_code, _))) => {
                    tracing::warn!(job = %dir, ret_code, "job kill failed");
                }
                Some(Err(err)) => {
                    tracing::warn!(job = %dir, error = %err, "bad kill record");
                }
                None => {
                    tracing::warn!(job = %dir, "no kill record in batch output");
                }
            }
        }
    }

    fn remote_init_callback(
        &self,
        install_target: &str,
        batch: &PendingBatch,
        outcome: &CommandOutcome,
    ) {
        match outcome.ret_code {
            0 => {
                tracing::info!(install_target = %install_target, "remote init done");
                self.remotes
                    .set(install_target, RemoteState::Done(RemotePhase::RemoteInit));
                self.start_file_install(&batch.platform, &batch.host);
            }
            255 => {
                tracing::debug!(
                    install_target = %install_target,
                    host = %outcome.host,
                    "remote init host unreachable"
                );
                self.hosts.mark_bad(&outcome.host);
                self.remotes.set(install_target, RemoteState::Failed255);
            }
            ret_code => {
                tracing::warn!(
                    install_target = %install_target,
                    ret_code,
                    stderr = %outcome.stderr.trim(),
                    "remote init failed"
                );
                self.remotes.set(install_target, RemoteState::Failed);
            }
        }
    }

    fn file_install_callback(
        &self,
        install_target: &str,
        _batch: &PendingBatch,
        outcome: &CommandOutcome,
    ) {
        match outcome.ret_code {
            0 => {
                tracing::info!(install_target = %install_target, "file install done");
                self.remotes
                    .set(install_target, RemoteState::Done(RemotePhase::FileInstall));
            }
            255 => {
                tracing::debug!(
                    install_target = %install_target,
                    host = %outcome.host,
                    "file install host unreachable"
                );
                self.hosts.mark_bad(&outcome.host);
                self.remotes.set(install_target, RemoteState::Failed255);
            }
            ret_code => {
                tracing::warn!(
                    install_target = %install_target,
                    ret_code,
                    stderr = %outcome.stderr.trim(),
                    "file install failed"
                );
                self.remotes.set(install_target, RemoteState::Failed);
            }
        }
    }

    // ==== shared ===========================================================

    /// Apply a lifecycle event, then re-arm or clear the task's timers when
    /// its state actually changed.
    fn process_state_event(
        &self,
        task: &mut TaskProxy,
        platform: &PlatformConfig,
        event: TaskEvent,
        time: &str,
    ) {
        let before = task.state;
        self.deps.events.process(task, event, time);
        if task.state == before {
            return;
        }
        let now = self.clock.now();
        match task.state {
            TaskState::Submitted => {
                let delays = if task.runtime.submission_polling_intervals.is_empty() {
                    platform.submission_polling_intervals.clone()
                } else {
                    task.runtime.submission_polling_intervals.clone()
                };
                let mut timer = ActionTimer::new(delays);
                timer.next(now, true);
                task.poll_timer = Some(timer);
                task.submission_deadline = task.runtime.submission_timeout.map(|secs| {
                    now + chrono::Duration::milliseconds((secs * 1000.0).round() as i64)
                });
                task.execution_deadline = None;
            }
            TaskState::Running => {
                let delays = if task.runtime.execution_polling_intervals.is_empty() {
                    platform.execution_polling_intervals.clone()
                } else {
                    task.runtime.execution_polling_intervals.clone()
                };
                let mut timer = ActionTimer::new(delays);
                timer.next(now, true);
                task.poll_timer = Some(timer);
                // Without an explicit timeout the execution time limit,
                // padded, still forces a deadline poll.
                let deadline_secs = task.runtime.execution_timeout.or(task
                    .runtime
                    .execution_time_limit
                    .map(|limit| limit + TIME_LIMIT_POLL_PADDING));
                task.execution_deadline = deadline_secs.map(|secs| {
                    now + chrono::Duration::milliseconds((secs * 1000.0).round() as i64)
                });
                task.submission_deadline = None;
            }
            state if state.is_final() => {
                task.poll_timer = None;
                task.submission_deadline = None;
                task.execution_deadline = None;
            }
            _ => {}
        }
    }

    /// The platform a task was (or would be) submitted through.
    fn platform_of(&self, task: &TaskProxy) -> PlatformConfig {
        let name = task
            .selected_platform
            .as_deref()
            .unwrap_or(&task.platform_name);
        self.platforms
            .get(name)
            .cloned()
            .unwrap_or_else(PlatformConfig::localhost)
    }

    /// Sorted batch output, with command echo and error records logged and
    /// archived along the way.
    fn parse_batch_output(&self, outcome: &CommandOutcome) -> BatchOutput {
        let mut output = BatchOutput::default();
        for line in outcome.stdout.lines() {
            match BatchLine::parse(line) {
                Some(BatchLine::Summary(summary)) => {
                    output.summaries.insert(summary.job_log_dir.clone(), summary);
                }
                Some(BatchLine::Message {
                    job_log_dir, text, ..
                }) => {
                    // Poll summaries carry the same messages in their
                    // context, which is where they are consumed.
                    tracing::debug!(job = %job_log_dir, text = %text, "runner message record");
                }
                Some(BatchLine::Command {
                    job_log_dir, text, ..
                }) => {
                    tracing::debug!(job = %job_log_dir, text = %text, "runner command echo");
                    self.append_activity(&job_log_dir, line);
                }
                Some(BatchLine::Error {
                    job_log_dir, text, ..
                }) => {
                    tracing::warn!(job = %job_log_dir, text = %text, "runner error record");
                    self.append_activity(&job_log_dir, line);
                }
                None if line.trim().is_empty() => {}
                None if has_batch_prefix(line) => {
                    tracing::warn!(line = %line, "malformed batch output line");
                }
                None => {
                    tracing::warn!(line = %line, "unhandled batch output line");
                }
            }
        }
        output
    }

    fn append_activity(&self, job_log_dir: &str, line: &str) {
        let path = self.job_log_root.join(job_log_dir).join(JOB_ACTIVITY_LOG);
        let result = fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .and_then(|mut file| writeln!(file, "{line}"));
        if let Err(err) = result {
            tracing::debug!(job = %job_log_dir, error = %err, "cannot append activity log");
        }
    }

    /// Free a batch's tasks for the next operation.
    fn release_batch(&self, batch: &PendingBatch) {
        self.release_keys(&batch.keys);
    }

    fn release_keys(&self, keys: &[TaskJobKey]) {
        let mut tasks = self.tasks.lock();
        for key in keys {
            if let Some(task) = live_task(&mut tasks, key) {
                task.in_flight = false;
            }
        }
    }

    fn dispatch(
        &self,
        kind: BatchKind,
        platform: &PlatformConfig,
        host: &str,
        keys: Vec<TaskJobKey>,
        argv: Vec<String>,
        stdin: Option<String>,
    ) {
        let argv = if host == LOCALHOST {
            argv
        } else {
            ssh_argv(host, platform.communication_timeout, &argv)
        };
        let key = uuid::Uuid::new_v4().to_string();
        self.pending.lock().insert(
            key.clone(),
            PendingBatch {
                kind,
                platform: platform.clone(),
                host: host.to_string(),
                keys,
            },
        );
        self.deps.pool.enqueue(CommandRequest {
            key,
            host: host.to_string(),
            argv,
            stdin,
        });
    }

    // ==== batch argv =======================================================

    fn jobs_submit_argv(&self, dirs: &[String], remote_mode: bool) -> Vec<String> {
        let mut argv = vec![
            "gyre".to_string(),
            "jobs-submit".to_string(),
            "--utc-mode".to_string(),
        ];
        if remote_mode {
            argv.push("--remote-mode".to_string());
        }
        argv.push("--".to_string());
        argv.push(self.job_log_root.display().to_string());
        argv.extend(dirs.iter().cloned());
        argv
    }

    fn jobs_poll_argv(&self, dirs: &[String]) -> Vec<String> {
        let mut argv = vec![
            "gyre".to_string(),
            "jobs-poll".to_string(),
            "--".to_string(),
            self.job_log_root.display().to_string(),
        ];
        argv.extend(dirs.iter().cloned());
        argv
    }

    fn jobs_kill_argv(&self, dirs: &[String]) -> Vec<String> {
        let mut argv = vec![
            "gyre".to_string(),
            "jobs-kill".to_string(),
            "--".to_string(),
            self.job_log_root.display().to_string(),
        ];
        argv.extend(dirs.iter().cloned());
        argv
    }

    fn remote_init_argv(&self, install_target: &str) -> Vec<String> {
        vec![
            "gyre".to_string(),
            "remote-init".to_string(),
            install_target.to_string(),
            self.job_log_root.display().to_string(),
        ]
    }

    fn file_install_argv(&self, install_target: &str) -> Vec<String> {
        vec![
            "gyre".to_string(),
            "file-install".to_string(),
            install_target.to_string(),
            self.job_log_root.display().to_string(),
        ]
    }
}

#[derive(Debug, Default)]
struct BatchOutput {
    summaries: HashMap<String, SummaryLine>,
}

/// The live task for a job key, unless the submission has been superseded
/// or the task retired since the batch was dispatched.
fn live_task<'a>(tasks: &'a mut TaskPool, key: &TaskJobKey) -> Option<&'a mut TaskProxy> {
    match tasks.get_mut(&key.relative_id()) {
        Some(task) if task.submit_num == key.submit_num => Some(task),
        Some(task) => {
            tracing::debug!(
                job = %key,
                current_submit = task.submit_num,
                "outcome for superseded submission dropped"
            );
            None
        }
        None => {
            tracing::debug!(job = %key, "outcome for retired task dropped");
            None
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
