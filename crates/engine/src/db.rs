// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence seam for per-submission job facts.
//!
//! The orchestration layer records one row per submission attempt and
//! patches it as callbacks report ids, timestamps, and exit codes. The
//! in-memory implementation backs tests and single-run schedulers; a durable
//! store implements the same trait.

use std::sync::Arc;

use gyre_core::TaskJobKey;
use indexmap::IndexMap;
use parking_lot::Mutex;

/// One job submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRow {
    pub key: TaskJobKey,
    pub platform_name: String,
    pub job_runner_name: String,
    pub job_id: Option<String>,
    pub submitted_time: Option<String>,
    pub started_time: Option<String>,
    pub finished_time: Option<String>,
    pub ret_code: Option<i32>,
}

impl JobRow {
    pub fn new(key: TaskJobKey, platform_name: &str, job_runner_name: &str) -> Self {
        Self {
            key,
            platform_name: platform_name.to_string(),
            job_runner_name: job_runner_name.to_string(),
            job_id: None,
            submitted_time: None,
            started_time: None,
            finished_time: None,
            ret_code: None,
        }
    }
}

/// Partial update; `None` fields leave the row untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobUpdate {
    pub job_id: Option<String>,
    pub submitted_time: Option<String>,
    pub started_time: Option<String>,
    pub finished_time: Option<String>,
    pub ret_code: Option<i32>,
}

/// Write interface for job rows.
pub trait JobDatabase: Send + Sync {
    /// Record a fresh submission attempt, replacing any row with the same key.
    fn insert_job(&self, row: JobRow);

    /// Patch an existing row. Unknown keys are ignored with a log line.
    fn update_job(&self, key: &TaskJobKey, update: JobUpdate);
}

/// In-memory [`JobDatabase`] keeping rows in insertion order. Clones share
/// the same rows.
#[derive(Debug, Clone, Default)]
pub struct MemJobDatabase {
    rows: Arc<Mutex<IndexMap<TaskJobKey, JobRow>>>,
}

impl MemJobDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all rows.
    pub fn rows(&self) -> Vec<JobRow> {
        self.rows.lock().values().cloned().collect()
    }

    pub fn get(&self, key: &TaskJobKey) -> Option<JobRow> {
        self.rows.lock().get(key).cloned()
    }
}

impl JobDatabase for MemJobDatabase {
    fn insert_job(&self, row: JobRow) {
        self.rows.lock().insert(row.key.clone(), row);
    }

    fn update_job(&self, key: &TaskJobKey, update: JobUpdate) {
        let mut rows = self.rows.lock();
        let Some(row) = rows.get_mut(key) else {
            tracing::warn!(key = %key, "job update for unknown row dropped");
            return;
        };
        if update.job_id.is_some() {
            row.job_id = update.job_id;
        }
        if update.submitted_time.is_some() {
            row.submitted_time = update.submitted_time;
        }
        if update.started_time.is_some() {
            row.started_time = update.started_time;
        }
        if update.finished_time.is_some() {
            row.finished_time = update.finished_time;
        }
        if update.ret_code.is_some() {
            row.ret_code = update.ret_code;
        }
    }
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
