// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded subprocess pool for batch job commands.
//!
//! Batch commands are queued with [`CommandPool::enqueue`] and run
//! concurrently up to a fixed limit. Each finished command is reported as a
//! [`CommandOutcome`] on the pool's results channel; the owner drains the
//! channel and routes outcomes back to whatever queued them, matched by key.
//! There is no cancellation: a queued command always runs (or times out) and
//! always produces an outcome.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::{mpsc, Semaphore};

/// Hard ceiling on any single pooled command.
pub const POOL_COMMAND_TIMEOUT: Duration = Duration::from_secs(600);

/// One queued batch command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    /// Matches the outcome back to the batch that queued it.
    pub key: String,
    /// Host the command targets. Informational only: remote argv is already
    /// wrapped in ssh by the caller.
    pub host: String,
    pub argv: Vec<String>,
    /// Piped to the child on stdin when present.
    pub stdin: Option<String>,
}

/// Result of one finished batch command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub key: String,
    pub host: String,
    pub ret_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Where batch commands go to run.
///
/// `enqueue` must not block; the outcome is delivered asynchronously.
pub trait CommandPool: Send + Sync {
    fn enqueue(&self, request: CommandRequest);
}

/// Runs queued commands as local subprocesses, at most `max_concurrent` at a
/// time. Remote commands are ssh invocations and run through the same pool.
pub struct SubprocessPool {
    permits: Arc<Semaphore>,
    results: mpsc::UnboundedSender<CommandOutcome>,
}

impl SubprocessPool {
    /// Create a pool together with the channel its outcomes arrive on.
    pub fn new(max_concurrent: usize) -> (Self, mpsc::UnboundedReceiver<CommandOutcome>) {
        let (results, rx) = mpsc::unbounded_channel();
        let pool = Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            results,
        };
        (pool, rx)
    }
}

impl CommandPool for SubprocessPool {
    fn enqueue(&self, request: CommandRequest) {
        let permits = self.permits.clone();
        let results = self.results.clone();
        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            let outcome = run_request(request).await;
            // Send fails only when the owner has dropped the receiver.
            let _ = results.send(outcome);
        });
    }
}

async fn run_request(request: CommandRequest) -> CommandOutcome {
    let CommandRequest {
        key,
        host,
        argv,
        stdin,
    } = request;
    let (ret_code, stdout, stderr) = match run_argv(&argv, stdin.as_deref()).await {
        Ok(output) => (
            output.status.code().unwrap_or(1),
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ),
        Err(message) => (1, String::new(), message),
    };
    tracing::debug!(key = %key, host = %host, ret_code, "pooled command finished");
    CommandOutcome {
        key,
        host,
        ret_code,
        stdout,
        stderr,
    }
}

async fn run_argv(argv: &[String], stdin: Option<&str>) -> Result<std::process::Output, String> {
    let Some((program, args)) = argv.split_first() else {
        return Err("empty command".to_string());
    };
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = command
        .spawn()
        .map_err(|err| format!("{program} failed: {err}"))?;
    if let Some(text) = stdin {
        if let Some(mut pipe) = child.stdin.take() {
            // Dropping the pipe after the write gives the child its EOF.
            if let Err(err) = pipe.write_all(text.as_bytes()).await {
                tracing::warn!(program = %program, error = %err, "writing command stdin failed");
            }
        }
    }
    match tokio::time::timeout(POOL_COMMAND_TIMEOUT, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(err)) => Err(format!("{program} failed: {err}")),
        Err(_) => Err(format!(
            "{program} timed out after {}s",
            POOL_COMMAND_TIMEOUT.as_secs()
        )),
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
