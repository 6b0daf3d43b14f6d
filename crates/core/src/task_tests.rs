// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn proxy() -> TaskProxy {
    TaskProxy::new("1", "fetch", "localhost", RuntimeConfig::default())
}

// ===========================================================================
// State machine
// ===========================================================================

#[parameterized(
    waiting_to_preparing        = { TaskState::Waiting,   TaskState::Preparing,    true },
    preparing_to_submitted      = { TaskState::Preparing, TaskState::Submitted,    true },
    preparing_to_submit_failed  = { TaskState::Preparing, TaskState::SubmitFailed, true },
    submitted_to_running        = { TaskState::Submitted, TaskState::Running,      true },
    submitted_to_submit_failed  = { TaskState::Submitted, TaskState::SubmitFailed, true },
    running_to_succeeded        = { TaskState::Running,   TaskState::Succeeded,    true },
    running_to_failed           = { TaskState::Running,   TaskState::Failed,       true },
    waiting_skips_preparing     = { TaskState::Waiting,   TaskState::Submitted,    false },
    preparing_to_running        = { TaskState::Preparing, TaskState::Running,      false },
    submitted_to_succeeded      = { TaskState::Submitted, TaskState::Succeeded,    false },
    running_to_submit_failed    = { TaskState::Running,   TaskState::SubmitFailed, false },
    succeeded_is_final          = { TaskState::Succeeded, TaskState::Running,      false },
    failed_is_final             = { TaskState::Failed,    TaskState::Preparing,    false },
    no_self_edge                = { TaskState::Running,   TaskState::Running,      false },
)]
fn transition_guards(from: TaskState, to: TaskState, allowed: bool) {
    assert_eq!(from.can_advance_to(to), allowed);
}

#[parameterized(
    waiting       = { TaskState::Waiting,      "waiting",       false, false },
    preparing     = { TaskState::Preparing,    "preparing",     false, false },
    submitted     = { TaskState::Submitted,    "submitted",     true,  false },
    running       = { TaskState::Running,      "running",       true,  false },
    succeeded     = { TaskState::Succeeded,    "succeeded",     false, true },
    failed        = { TaskState::Failed,       "failed",        false, true },
    submit_failed = { TaskState::SubmitFailed, "submit-failed", false, true },
)]
fn state_display_and_predicates(state: TaskState, name: &str, active: bool, fin: bool) {
    assert_eq!(state.to_string(), name);
    assert_eq!(state.is_active(), active);
    assert_eq!(state.is_final(), fin);
}

#[test]
fn advance_applies_only_legal_edges() {
    let mut task = proxy();
    assert!(task.advance(TaskState::Preparing));
    assert!(task.advance(TaskState::Submitted));
    assert!(!task.advance(TaskState::Succeeded));
    assert_eq!(task.state, TaskState::Submitted);
    assert!(task.advance(TaskState::Running));
    assert!(task.advance(TaskState::Succeeded));
    assert!(task.state.is_final());
}

// ===========================================================================
// TaskProxy
// ===========================================================================

#[test]
fn proxy_key_follows_submit_num() {
    let mut task = proxy();
    assert_eq!(task.key(), TaskJobKey::new("1", "fetch", 0));
    assert_eq!(task.next_submit_num(), 1);
    assert_eq!(task.key().job_log_dir(), "1/fetch/01");
    assert_eq!(task.next_submit_num(), 2);
    assert_eq!(task.key().job_log_dir(), "1/fetch/02");
    assert_eq!(task.relative_id(), "1/fetch");
}

#[test]
fn new_proxy_starts_waiting_with_nothing_in_flight() {
    let task = proxy();
    assert_eq!(task.state, TaskState::Waiting);
    assert!(!task.in_flight);
    assert!(!task.is_active());
    assert_eq!(task.poll_timer, None);
    assert_eq!(task.job_id, None);
}

// ===========================================================================
// RuntimeConfig
// ===========================================================================

#[test]
fn overrides_replace_scalars_and_merge_maps() {
    let mut runtime = RuntimeConfig {
        script: "run-model".to_string(),
        execution_time_limit: Some(60.0),
        ..Default::default()
    };
    runtime.env.insert("KEEP".to_string(), "yes".to_string());
    runtime.env.insert("COLOR".to_string(), "red".to_string());

    let mut overrides = RuntimeOverrides {
        script: Some("run-model --fast".to_string()),
        execution_time_limit: None,
        ..Default::default()
    };
    overrides
        .env
        .insert("COLOR".to_string(), "blue".to_string());
    overrides
        .env
        .insert("EXTRA".to_string(), "1".to_string());
    overrides
        .directives
        .insert("--mem".to_string(), "4G".to_string());

    runtime.apply_overrides(&overrides);
    assert_eq!(runtime.script, "run-model --fast");
    assert_eq!(runtime.execution_time_limit, Some(60.0));
    assert_eq!(runtime.env.get("KEEP").map(String::as_str), Some("yes"));
    assert_eq!(runtime.env.get("COLOR").map(String::as_str), Some("blue"));
    assert_eq!(runtime.env.get("EXTRA").map(String::as_str), Some("1"));
    assert_eq!(
        runtime.directives.get("--mem").map(String::as_str),
        Some("4G")
    );
}

#[test]
fn runtime_config_deserializes_with_defaults() {
    let runtime: RuntimeConfig =
        serde_json::from_str(r#"{"script": "true", "execution_time_limit": 30.0}"#).unwrap();
    assert_eq!(runtime.script, "true");
    assert_eq!(runtime.execution_time_limit, Some(30.0));
    assert!(runtime.env.is_empty());
    assert!(runtime.submission_polling_intervals.is_empty());
}

#[test]
fn env_preserves_definition_order() {
    let runtime: RuntimeConfig = serde_json::from_str(
        r#"{"env": {"ZEBRA": "1", "APPLE": "2", "MANGO": "3"}}"#,
    )
    .unwrap();
    let keys: Vec<&str> = runtime.env.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["ZEBRA", "APPLE", "MANGO"]);
}
