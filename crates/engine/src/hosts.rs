// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Submission host selection with unreachable-host tracking.
//!
//! An ssh exit of 255 marks the host bad; selection walks a platform's (or
//! platform group's) candidates in order and returns the first platform/host
//! pair not currently marked. When every host is marked, the caller clears
//! the marks for those hosts so a later retry starts fresh.

use std::collections::HashSet;
use std::sync::Arc;

use gyre_core::{PlatformConfig, Platforms};
use parking_lot::Mutex;

/// Shared record of hosts that recently refused a connection.
///
/// Clones share the same underlying set, so the submit, poll, and remote
/// provisioning paths all see each other's marks.
#[derive(Debug, Clone, Default)]
pub struct HostSelector {
    bad_hosts: Arc<Mutex<HashSet<String>>>,
}

impl HostSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_bad(&self, host: &str) {
        if self.bad_hosts.lock().insert(host.to_string()) {
            tracing::warn!(host = %host, "host marked unreachable");
        }
    }

    pub fn is_bad(&self, host: &str) -> bool {
        self.bad_hosts.lock().contains(host)
    }

    /// Forget marks for the given hosts only.
    pub fn forget<I, S>(&self, hosts: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut bad_hosts = self.bad_hosts.lock();
        for host in hosts {
            bad_hosts.remove(host.as_ref());
        }
    }

    /// Current marks, for logs and tests.
    pub fn bad_hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = self.bad_hosts.lock().iter().cloned().collect();
        hosts.sort();
        hosts
    }

    /// First usable platform/host pair for a platform or group name.
    ///
    /// Walks the candidate platforms in fallback order and each platform's
    /// hosts in preference order. `None` means every host is currently
    /// marked bad (or the name is unknown).
    pub fn select(&self, platforms: &Platforms, name: &str) -> Option<(PlatformConfig, String)> {
        let bad_hosts = self.bad_hosts.lock();
        for candidate in platforms.candidates(name) {
            for host in candidate.effective_hosts() {
                if !bad_hosts.contains(&host) {
                    return Some((candidate.clone(), host));
                }
            }
        }
        None
    }

    /// Every host reachable through a platform or group name, in order.
    pub fn candidate_hosts(&self, platforms: &Platforms, name: &str) -> Vec<String> {
        let mut hosts = Vec::new();
        for candidate in platforms.candidates(name) {
            for host in candidate.effective_hosts() {
                if !hosts.contains(&host) {
                    hosts.push(host);
                }
            }
        }
        hosts
    }
}

#[cfg(test)]
#[path = "hosts_tests.rs"]
mod tests;
