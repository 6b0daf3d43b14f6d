// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `pbs` job runner: qsub/qstat/qdel.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::handler::JobRunnerHandler;

// qsub prints the id alone on stdout, e.g. `1978.pbsserver`.
#[allow(clippy::expect_used)]
static REC_ID_FROM_SUBMIT_OUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<id>\d+(?:\.\S+)?)\s*$").expect("constant regex pattern is valid")
});

#[derive(Debug, Default, Clone, Copy)]
pub struct PbsHandler;

#[async_trait]
impl JobRunnerHandler for PbsHandler {
    fn name(&self) -> &str {
        "pbs"
    }

    fn submit_command_template(&self) -> Option<&str> {
        Some("qsub {job}")
    }

    fn rec_id_from_submit_out(&self) -> Option<&Regex> {
        Some(&REC_ID_FROM_SUBMIT_OUT)
    }

    /// `qstat` output carries the full id in its first column, so the
    /// default line scan applies.
    fn poll_command(&self, job_ids: &[String]) -> Vec<String> {
        let mut argv = vec!["qstat".to_string()];
        argv.extend(job_ids.iter().cloned());
        argv
    }

    fn kill_command_template(&self) -> Option<&str> {
        Some("qdel {job_id}")
    }
}

#[cfg(test)]
#[path = "pbs_tests.rs"]
mod tests;
