//! Jobs that vanish without running their exit traps.
//!
//! SIGKILL cannot be trapped, so a killed background job leaves no exit
//! record behind. The poll notices the pid is gone from the process table,
//! marks the status file durably, and the re-read drives the task to failed.

use crate::prelude::*;
use gyre_core::protocol::{JOB_STATUS_EXIT_POLLED, JOB_STATUS_PID, OUT_PREFIX_SUMMARY};
use gyre_core::TaskState;

/// The poll-context json from a summary line for the given job.
fn summary_context(output: &str, job_log_dir: &str) -> serde_json::Value {
    let line = output
        .lines()
        .find(|line| {
            line.starts_with(OUT_PREFIX_SUMMARY) && line.contains(&format!("|{job_log_dir}|"))
        })
        .unwrap_or_else(|| panic!("no summary for {job_log_dir} in:\n{output}"));
    let payload = line
        .strip_prefix(OUT_PREFIX_SUMMARY)
        .and_then(|rest| rest.splitn(3, '|').nth(2))
        .unwrap();
    serde_json::from_str(payload).unwrap()
}

#[tokio::test]
async fn a_job_killed_outside_the_runner_is_failed_by_the_poll() {
    let harness = Harness::new();
    harness.add_task_with_script("1", "doomed", "localhost", "kill -KILL $$");

    harness.submit(&["1/doomed"]);
    harness.pump().await;
    assert_eq!(harness.task_state("1/doomed"), TaskState::Submitted);

    harness.wait_for_status_key("1/doomed/01", JOB_STATUS_PID).await;
    let pid = harness.status_value("1/doomed/01", JOB_STATUS_PID).unwrap();
    harness.wait_for_pid_gone(&pid).await;

    harness.poll(&["1/doomed"]);
    let outputs = harness.pump().await;

    assert_eq!(harness.task_state("1/doomed"), TaskState::Failed);
    // The runner marked the vanishing in the status file and reported it.
    let status = harness.status_text("1/doomed/01");
    assert!(status.lines().any(|l| l.starts_with(JOB_STATUS_EXIT_POLLED)));
    let ctx = summary_context(&outputs[0], "1/doomed/01");
    assert_eq!(ctx["job_runner_exit_polled"], 1);
    assert!(ctx.get("run_status").is_none(), "no exit trap ever ran");
}

#[tokio::test]
async fn an_engine_kill_is_finalized_by_the_following_poll() {
    let harness = Harness::new();
    harness.add_task_with_script("1", "spin", "localhost", "sleep 60");

    harness.submit(&["1/spin"]);
    harness.pump().await;
    harness.wait_for_status_key("1/spin/01", JOB_STATUS_PID).await;
    let pid = harness.status_value("1/spin/01", JOB_STATUS_PID).unwrap();

    harness.kill(&["1/spin"]);
    harness.pump().await;
    // A kill acknowledgment alone never finalizes the task.
    assert_eq!(harness.task_state("1/spin"), TaskState::Submitted);

    harness.wait_for_pid_gone(&pid).await;
    harness.poll(&["1/spin"]);
    harness.pump().await;

    assert_eq!(harness.task_state("1/spin"), TaskState::Failed);
}
