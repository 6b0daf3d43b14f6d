//! The submit-poll job loop against real background processes.

use crate::prelude::*;
use gyre_core::protocol::JOB_STATUS_EXIT;
use gyre_core::{PlatformConfig, Platforms, Severity, TaskEvent, TaskState};

#[tokio::test]
async fn a_job_runs_to_success_and_the_poll_observes_it() {
    let harness = Harness::new();
    harness.add_task_with_script(
        "1",
        "fetch",
        "localhost",
        "echo fetched\ngyre_message INFO 'halfway there'",
    );

    harness.submit(&["1/fetch"]);
    harness.pump().await;

    let task = harness.task("1/fetch");
    assert_eq!(task.state, TaskState::Submitted);
    let pid = task.job_id.expect("background submission reports the pid");
    assert!(pid.chars().all(|c| c.is_ascii_digit()));

    harness.wait_for_status_key("1/fetch/01", JOB_STATUS_EXIT).await;
    harness.poll(&["1/fetch"]);
    harness.pump().await;

    assert_eq!(harness.task_state("1/fetch"), TaskState::Succeeded);
    assert!(harness.job_out("1/fetch/01").contains("fetched"));

    let recorded = harness.events.recorded_for("1/fetch");
    assert!(recorded.iter().any(|r| {
        r.event
            == TaskEvent::Message {
                severity: Severity::Info,
                text: "halfway there".to_string(),
            }
    }));
    assert_eq!(recorded.last().unwrap().event, TaskEvent::Succeeded);

    let row = harness.db.rows().remove(0);
    assert_eq!(row.job_id.as_deref(), Some(pid.as_str()));
    assert_eq!(row.ret_code, Some(0));
    assert!(row.started_time.is_some());
    assert!(row.finished_time.is_some());
}

#[tokio::test]
async fn a_failing_job_is_observed_as_failed() {
    let harness = Harness::new();
    harness.add_task_with_script("1", "broken", "localhost", "false");

    harness.submit(&["1/broken"]);
    harness.pump().await;
    harness.wait_for_status_key("1/broken/01", JOB_STATUS_EXIT).await;
    harness.poll(&["1/broken"]);
    harness.pump().await;

    assert_eq!(harness.task_state("1/broken"), TaskState::Failed);
    let recorded = harness.events.recorded_for("1/broken");
    assert_eq!(
        recorded.last().unwrap().event,
        TaskEvent::Failed { signal: None }
    );
    assert_eq!(harness.db.rows().remove(0).ret_code, Some(1));
}

#[tokio::test]
async fn remote_mode_submissions_travel_over_stdin() {
    // A platform whose install target is not the scheduler's filesystem:
    // provisioning runs first and job scripts travel on the batch command's
    // stdin. The tempdir stands in for the shared remote filesystem.
    let mut platforms = Platforms::with_localhost();
    let mut cluster = PlatformConfig::new("cluster");
    cluster.hosts = vec!["localhost".to_string()];
    platforms.insert(cluster);
    let harness = Harness::with_platforms(platforms);
    harness.add_task_with_script("1", "fetch", "cluster", "echo over-stdin");

    // First attempt provisions: remote-init, then file-install.
    harness.submit(&["1/fetch"]);
    harness.pump().await;
    harness.pump().await;
    assert_eq!(harness.task_state("1/fetch"), TaskState::Preparing);

    // Provisioned: the next attempt carries the script on stdin.
    harness.submit(&["1/fetch"]);
    let requests = harness.pool.requests();
    assert!(requests[0].argv.contains(&"--remote-mode".to_string()));
    assert!(requests[0].stdin.is_some());
    harness.pump().await;
    assert_eq!(harness.task_state("1/fetch"), TaskState::Submitted);

    harness.wait_for_status_key("1/fetch/01", JOB_STATUS_EXIT).await;
    harness.poll(&["1/fetch"]);
    harness.pump().await;

    assert_eq!(harness.task_state("1/fetch"), TaskState::Succeeded);
    assert!(harness.job_out("1/fetch/01").contains("over-stdin"));
}
