// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use async_trait::async_trait;

/// Minimal handler relying on every default.
struct BareHandler;

#[async_trait]
impl JobRunnerHandler for BareHandler {
    fn name(&self) -> &str {
        "bare"
    }

    fn poll_command(&self, job_ids: &[String]) -> Vec<String> {
        let mut argv = vec!["true".to_string()];
        argv.extend(job_ids.iter().cloned());
        argv
    }
}

/// Handler overriding the optional hooks.
struct ClusterHandler;

#[async_trait]
impl JobRunnerHandler for ClusterHandler {
    fn name(&self) -> &str {
        "cluster"
    }

    fn poll_command(&self, _job_ids: &[String]) -> Vec<String> {
        vec!["true".to_string()]
    }

    fn manip_job_id(&self, job_id: &str) -> String {
        job_id.trim_end_matches(".cluster").to_string()
    }

    fn filter_poll_output(&self, out: &str) -> Option<Vec<String>> {
        Some(out.lines().map(|line| line.trim().to_string()).collect())
    }
}

// ============================================================================
// Default capability surface
// ============================================================================

#[tokio::test]
async fn defaults_are_inert() {
    let handler = BareHandler;
    let ctx = SubmitContext {
        job_script: Path::new("/nope/job"),
        execution_time_limit: None,
    };
    assert_eq!(handler.submit_command_template(), None);
    assert!(handler.submit_direct(&ctx).await.is_none());
    assert!(handler.rec_id_from_submit_out().is_none());
    assert!(handler.rec_id_from_submit_err().is_none());
    assert_eq!(handler.manip_job_id("42.cluster"), "42.cluster");
    assert!(handler.filter_poll_output("42\n").is_none());
    assert_eq!(handler.kill_command_template(), None);
    assert!(!handler.should_kill_proc_group());
    assert!(!handler.should_poll_proc_group());
}

// ============================================================================
// Overridden hooks
// ============================================================================

#[test]
fn manip_job_id_can_rewrite_ids() {
    assert_eq!(ClusterHandler.manip_job_id("42.cluster"), "42");
    assert_eq!(ClusterHandler.manip_job_id("42"), "42");
}

#[test]
fn filter_poll_output_can_replace_the_line_scan() {
    let ids = ClusterHandler.filter_poll_output(" 7 \n8\n");
    assert_eq!(ids, Some(vec!["7".to_string(), "8".to_string()]));
}

#[test]
fn errors_render_for_batch_records() {
    assert_eq!(
        RunnerError::UnknownRunner("nonesuch".to_string()).to_string(),
        "unknown job runner: nonesuch"
    );
    assert_eq!(
        RunnerError::NoKillMethod("bare".to_string()).to_string(),
        "bare: no kill method"
    );
}
