// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote install-target provisioning state.
//!
//! Before jobs can be submitted to a platform whose filesystem is not the
//! scheduler's own, its install target must be initialized (remote-init)
//! and then have the service files installed (file-install). Both steps run
//! as pooled ssh commands; this module tracks where each target is in that
//! sequence. Platforms sharing an install target share its state.

use std::collections::HashMap;

use parking_lot::Mutex;

/// Provisioning steps, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemotePhase {
    RemoteInit,
    FileInstall,
}

/// Where an install target currently is in the provisioning sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteState {
    InProgress(RemotePhase),
    Done(RemotePhase),
    /// Provisioning failed because the host was unreachable; cleared and
    /// retried on the next submission attempt.
    Failed255,
    /// Provisioning itself failed; surfaced as a submit failure.
    Failed,
}

/// Tracks provisioning state per install target.
#[derive(Debug, Default)]
pub struct RemoteMgr {
    targets: Mutex<HashMap<String, RemoteState>>,
}

impl RemoteMgr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state; `None` means provisioning has not been attempted.
    pub fn state(&self, install_target: &str) -> Option<RemoteState> {
        self.targets.lock().get(install_target).copied()
    }

    pub fn set(&self, install_target: &str, state: RemoteState) {
        self.targets
            .lock()
            .insert(install_target.to_string(), state);
    }

    /// Forget a target so the next submission attempt starts over.
    pub fn clear(&self, install_target: &str) {
        self.targets.lock().remove(install_target);
    }

    /// True once both provisioning steps have completed.
    pub fn is_ready(&self, install_target: &str) -> bool {
        matches!(
            self.state(install_target),
            Some(RemoteState::Done(RemotePhase::FileInstall))
        )
    }
}

/// Wrap a command for execution on a remote host.
///
/// `BatchMode` makes unreachable hosts fail fast with exit 255 instead of
/// prompting; the connect timeout comes from the platform's communication
/// timeout.
pub fn ssh_argv(host: &str, connect_timeout: f64, argv: &[String]) -> Vec<String> {
    let mut wrapped = vec![
        "ssh".to_string(),
        "-oBatchMode=yes".to_string(),
        format!("-oConnectTimeout={}", connect_timeout.ceil().max(1.0) as u64),
        host.to_string(),
    ];
    wrapped.extend(argv.iter().cloned());
    wrapped
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;
