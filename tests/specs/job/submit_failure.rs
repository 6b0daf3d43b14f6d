//! Submissions that fail before any job process exists.

use crate::prelude::*;
use gyre_core::protocol::OUT_PREFIX_SUMMARY;
use gyre_core::TaskState;

#[tokio::test]
async fn a_missing_runner_binary_fails_every_job_in_the_batch() {
    // sbatch does not exist on the test host, so every submission in the
    // batch must come back as its own non-zero summary record.
    let harness = Harness::with_platforms(local_platform_with_runner("cluster", "slurm"));
    harness.add_task("1", "alpha", "cluster");
    harness.add_task("1", "beta", "cluster");

    harness.submit(&["1/alpha", "1/beta"]);
    let outputs = harness.pump().await;

    let summaries: Vec<&str> = outputs[0]
        .lines()
        .filter(|line| line.starts_with(OUT_PREFIX_SUMMARY))
        .collect();
    assert_eq!(summaries.len(), 2, "one summary per job:\n{}", outputs[0]);
    for dir in ["1/alpha/01", "1/beta/01"] {
        assert!(summaries.iter().any(|line| line.contains(dir)));
    }

    for id in ["1/alpha", "1/beta"] {
        assert_eq!(harness.task_state(id), TaskState::SubmitFailed);
    }
    for row in harness.db.rows() {
        assert_eq!(row.ret_code, Some(1));
    }
    // The submit command's stderr lands in the job's activity log.
    let activity = std::fs::read_to_string(
        harness.root.path().join("1/alpha/01/job-activity.log"),
    )
    .unwrap();
    assert!(activity.contains("sbatch"));
}

#[tokio::test]
async fn an_unknown_runner_name_is_reported_per_job() {
    let harness = Harness::with_platforms(local_platform_with_runner("odd", "tornado"));
    harness.add_task("1", "alpha", "odd");

    harness.submit(&["1/alpha"]);
    let outputs = harness.pump().await;

    assert_eq!(harness.task_state("1/alpha"), TaskState::SubmitFailed);
    assert!(outputs[0].contains("unknown job runner: tornado"));
}
