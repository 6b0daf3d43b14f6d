// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::fs;

fn job_dir(root: &Path, job_log_dir: &str) -> PathBuf {
    let dir = root.join(job_log_dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn init_truncates_and_records_the_runner() {
    let tmp = tempfile::tempdir().unwrap();
    job_dir(tmp.path(), "1/model/01");
    let path = status_path(tmp.path(), "1/model/01");

    fs::write(&path, "STALE=1\n").unwrap();
    init(&path, "background").unwrap();

    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "CYLC_JOB_RUNNER_NAME=background\n"
    );
}

#[test]
fn append_extends_the_record() {
    let tmp = tempfile::tempdir().unwrap();
    job_dir(tmp.path(), "1/model/01");
    let path = status_path(tmp.path(), "1/model/01");

    init(&path, "background").unwrap();
    append(&path, "CYLC_JOB_ID", "4242").unwrap();

    let ctx = read_context(tmp.path(), "1/model/01").unwrap();
    assert_eq!(ctx.job_runner_name.as_deref(), Some("background"));
    assert_eq!(ctx.job_id.as_deref(), Some("4242"));
    assert!(ctx.is_in_flight());
}

#[test]
fn read_context_skips_unrecognized_lines() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = job_dir(tmp.path(), "2/post/03");
    fs::write(
        dir.join(JOB_STATUS_FILE),
        "CYLC_JOB_RUNNER_NAME=slurm\n\
         CYLC_JOB_ID=77\n\
         # comment noise\n\
         CYLC_JOB_EXIT=SUCCEEDED\n\
         half-written",
    )
    .unwrap();

    let ctx = read_context(tmp.path(), "2/post/03").unwrap();
    assert_eq!(ctx.job_id.as_deref(), Some("77"));
    assert_eq!(ctx.run_status, Some(0));
    assert!(!ctx.is_in_flight());
}

#[test]
fn missing_file_is_a_status_file_error() {
    let tmp = tempfile::tempdir().unwrap();
    let err = read_context(tmp.path(), "1/model/01").unwrap_err();
    assert!(matches!(err, RunnerError::StatusFile(_)), "{err:?}");
}
