// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::task::{RuntimeConfig, TaskProxy};

/// A runtime config that just runs the given script body.
pub fn runtime_with_script(script: &str) -> RuntimeConfig {
    RuntimeConfig {
        script: script.to_string(),
        ..RuntimeConfig::default()
    }
}

/// A waiting task proxy on the given platform.
pub fn task_proxy(point: &str, name: &str, platform: &str) -> TaskProxy {
    TaskProxy::new(point, name, platform, runtime_with_script("true"))
}

/// A task proxy with a custom script body.
pub fn task_proxy_with_script(point: &str, name: &str, platform: &str, script: &str) -> TaskProxy {
    TaskProxy::new(point, name, platform, runtime_with_script(script))
}
