// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Platform definitions: where jobs run and how they are submitted.
//!
//! A platform names a job runner plus the hosts it can be reached on. A
//! platform group is an ordered fallback list of platforms tried in turn
//! when hosts are unreachable. Callers load these from their own config
//! source; everything here is plain serde data.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Install target marking jobs that share the scheduler's own filesystem.
pub const LOCALHOST: &str = "localhost";

/// One platform: a job runner and the hosts it is reachable on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub name: String,
    /// Submission hosts in preference order; empty means "the platform name
    /// is the host".
    pub hosts: Vec<String>,
    /// Registered job runner handler name.
    pub job_runner_name: String,
    /// Overrides the handler's submit command template when set.
    pub job_runner_command_template: Option<String>,
    /// Remote-provisioning identity; defaults to the platform name.
    pub install_target: Option<String>,
    /// Upper bound on jobs per dispatched batch command.
    pub max_batch_size: usize,
    /// Default poll schedule for submitted jobs, seconds.
    pub submission_polling_intervals: Vec<f64>,
    /// Default poll schedule for running jobs, seconds.
    pub execution_polling_intervals: Vec<f64>,
    /// Timeout for remote communication commands, seconds.
    pub communication_timeout: f64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            name: LOCALHOST.to_string(),
            hosts: Vec::new(),
            job_runner_name: "background".to_string(),
            job_runner_command_template: None,
            install_target: None,
            max_batch_size: 100,
            submission_polling_intervals: vec![900.0],
            execution_polling_intervals: vec![900.0],
            communication_timeout: 10.0,
        }
    }
}

impl PlatformConfig {
    /// The built-in platform for jobs on the scheduler host.
    pub fn localhost() -> Self {
        Self::default()
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Hosts to try in order; the platform name doubles as the host when
    /// none are listed.
    pub fn effective_hosts(&self) -> Vec<String> {
        if self.hosts.is_empty() {
            vec![self.name.clone()]
        } else {
            self.hosts.clone()
        }
    }

    /// The remote-provisioning identity for this platform.
    pub fn install_target(&self) -> &str {
        match &self.install_target {
            Some(target) => target,
            None => &self.name,
        }
    }

    /// True when jobs land on the scheduler's own filesystem, so no
    /// remote initialization is needed.
    pub fn is_local(&self) -> bool {
        self.install_target() == LOCALHOST
    }
}

/// Ordered fallback list of platforms sharing a logical name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformGroup {
    pub name: String,
    pub platforms: Vec<String>,
}

impl PlatformGroup {
    pub fn new(name: impl Into<String>, platforms: Vec<String>) -> Self {
        Self {
            name: name.into(),
            platforms,
        }
    }
}

/// The full set of configured platforms and platform groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Platforms {
    pub platforms: IndexMap<String, PlatformConfig>,
    pub groups: IndexMap<String, PlatformGroup>,
}

impl Platforms {
    /// A registry pre-seeded with the localhost platform.
    pub fn with_localhost() -> Self {
        let mut platforms = Self::default();
        platforms.insert(PlatformConfig::localhost());
        platforms
    }

    pub fn insert(&mut self, platform: PlatformConfig) {
        self.platforms.insert(platform.name.clone(), platform);
    }

    pub fn insert_group(&mut self, group: PlatformGroup) {
        self.groups.insert(group.name.clone(), group);
    }

    pub fn get(&self, name: &str) -> Option<&PlatformConfig> {
        self.platforms.get(name)
    }

    /// Expand a platform or group name into candidate platforms, in the
    /// order they should be attempted. Unknown names yield no candidates.
    pub fn candidates(&self, name: &str) -> Vec<&PlatformConfig> {
        if let Some(group) = self.groups.get(name) {
            return group
                .platforms
                .iter()
                .filter_map(|member| self.platforms.get(member))
                .collect();
        }
        self.platforms.get(name).into_iter().collect()
    }
}

#[cfg(test)]
#[path = "platform_tests.rs"]
mod tests;
