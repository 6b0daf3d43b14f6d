// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `slurm` job runner: sbatch/squeue/scancel.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::handler::JobRunnerHandler;

#[allow(clippy::expect_used)]
static REC_ID_FROM_SUBMIT_OUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Submitted batch job (?P<id>\d+)").expect("constant regex pattern is valid")
});

#[derive(Debug, Default, Clone, Copy)]
pub struct SlurmHandler;

#[async_trait]
impl JobRunnerHandler for SlurmHandler {
    fn name(&self) -> &str {
        "slurm"
    }

    fn submit_command_template(&self) -> Option<&str> {
        Some("sbatch {job}")
    }

    fn rec_id_from_submit_out(&self) -> Option<&Regex> {
        Some(&REC_ID_FROM_SUBMIT_OUT)
    }

    fn poll_command(&self, job_ids: &[String]) -> Vec<String> {
        vec![
            "squeue".to_string(),
            "-h".to_string(),
            "-j".to_string(),
            job_ids.join(","),
        ]
    }

    /// `squeue -h` lines start with the job id; job array tasks render as
    /// `<id>_<index>` and collapse onto the submitted id.
    fn filter_poll_output(&self, out: &str) -> Option<Vec<String>> {
        let ids = out
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .map(|first| first.split('_').next().unwrap_or(first).to_string())
            .collect();
        Some(ids)
    }

    fn kill_command_template(&self) -> Option<&str> {
        Some("scancel {job_id}")
    }
}

#[cfg(test)]
#[path = "slurm_tests.rs"]
mod tests;
