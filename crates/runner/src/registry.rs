// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Name to handler lookup.

use std::collections::HashMap;
use std::sync::Arc;

use crate::background::BackgroundHandler;
use crate::handler::JobRunnerHandler;
use crate::pbs::PbsHandler;
use crate::slurm::SlurmHandler;

/// Registry of job runner handlers, keyed by runner name.
///
/// Starts with the built-in handlers; registering a handler under an
/// existing name replaces it.
pub struct JobRunnerRegistry {
    handlers: HashMap<String, Arc<dyn JobRunnerHandler>>,
}

impl JobRunnerRegistry {
    /// Registry with the built-in handlers.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(BackgroundHandler));
        registry.register(Arc::new(SlurmHandler));
        registry.register(Arc::new(PbsHandler));
        registry
    }

    /// Registry with no handlers at all.
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, handler: Arc<dyn JobRunnerHandler>) {
        self.handlers.insert(handler.name().to_string(), handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn JobRunnerHandler>> {
        self.handlers.get(name).cloned()
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for JobRunnerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
