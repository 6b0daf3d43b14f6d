// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job script rendering.
//!
//! A job script is a self-contained bash program: header comments the job
//! runner manager reads back (runner name, command template, time limit),
//! runner directives, a prologue that records the job's progress in its
//! `job.status` file via exit traps, the task's environment, the user
//! script body, and an epilogue that records success. Everything the
//! scheduler later learns by polling comes from what this script writes.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use gyre_core::job::JOB_SCRIPT;
use gyre_core::protocol::{
    LINE_PREFIX_COMMAND_TEMPLATE, LINE_PREFIX_EXECUTION_TIME_LIMIT, LINE_PREFIX_JOB_RUNNER_NAME,
    STDIN_JOB_BEGIN, STDIN_JOB_END,
};
use gyre_core::{PlatformConfig, RuntimeConfig, TaskJobKey};

/// Render the full job script text.
pub fn render(key: &TaskJobKey, platform: &PlatformConfig, runtime: &RuntimeConfig) -> String {
    let mut script = String::new();
    script.push_str("#!/bin/bash\n");
    script.push_str(&format!(
        "{LINE_PREFIX_JOB_RUNNER_NAME}{}\n",
        platform.job_runner_name
    ));
    if let Some(template) = &platform.job_runner_command_template {
        script.push_str(&format!("{LINE_PREFIX_COMMAND_TEMPLATE}{template}\n"));
    }
    if let Some(limit) = runtime.execution_time_limit {
        script.push_str(&format!("{LINE_PREFIX_EXECUTION_TIME_LIMIT}{limit}\n"));
    }
    for line in directive_lines(&platform.job_runner_name, runtime) {
        script.push_str(&line);
        script.push('\n');
    }
    script.push_str(PROLOGUE);
    script.push_str(&identity_exports(key));
    for (name, value) in &runtime.env {
        script.push_str(&format!("export {name}={}\n", sh_quote(value)));
    }
    script.push('\n');
    script.push_str(runtime.script.trim_end());
    script.push('\n');
    script.push_str("\ngyre_job_finish\n");
    script
}

/// Render and write the script to `<root>/<point>/<name>/<NN>/job`.
pub fn write(
    job_log_root: &Path,
    key: &TaskJobKey,
    platform: &PlatformConfig,
    runtime: &RuntimeConfig,
) -> io::Result<PathBuf> {
    install(job_log_root, key, &render(key, platform, runtime))
}

/// Write an already-rendered script into its submit directory, executable.
///
/// The `NN` symlink is not touched here: the runner manager repoints it when
/// it accepts the submission.
pub fn install(job_log_root: &Path, key: &TaskJobKey, script: &str) -> io::Result<PathBuf> {
    let submit_dir = job_log_root.join(key.job_log_dir());
    fs::create_dir_all(&submit_dir)?;
    let script_path = submit_dir.join(JOB_SCRIPT);
    fs::write(&script_path, script)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&script_path, fs::Permissions::from_mode(0o755))?;
    }
    Ok(script_path)
}

/// Concatenate rendered scripts for remote-mode submission over stdin.
///
/// Each script travels between a begin marker naming its job-log directory
/// and an end marker; the runner manager installs them before submitting.
pub fn frame_for_stdin(scripts: &[(String, String)]) -> String {
    let mut framed = String::new();
    for (job_log_dir, script) in scripts {
        framed.push_str(STDIN_JOB_BEGIN);
        framed.push_str(job_log_dir);
        framed.push('\n');
        framed.push_str(script);
        if !script.ends_with('\n') {
            framed.push('\n');
        }
        framed.push_str(STDIN_JOB_END);
        framed.push('\n');
    }
    framed
}

// Status-file writes and exit traps. KILL cannot be trapped, so a killed
// background job leaves no CYLC_JOB_EXIT entry; the poll re-read covers it.
const PROLOGUE: &str = r#"set -euo pipefail
set -o errtrace

GYRE_JOB_STATUS="$(dirname "$0")/job.status"

gyre_job_exit() {
    trap '' EXIT ERR TERM INT
    {
        echo "CYLC_JOB_EXIT=$1"
        echo "CYLC_JOB_EXIT_TIME=$(date -u +%Y-%m-%dT%H:%M:%SZ)"
    } >>"${GYRE_JOB_STATUS}"
    exit "$2"
}

gyre_job_finish() {
    trap '' EXIT ERR TERM INT
    {
        echo "CYLC_JOB_EXIT=SUCCEEDED"
        echo "CYLC_JOB_EXIT_TIME=$(date -u +%Y-%m-%dT%H:%M:%SZ)"
    } >>"${GYRE_JOB_STATUS}"
    exit 0
}

gyre_message() {
    echo "CYLC_MESSAGE=$(date -u +%Y-%m-%dT%H:%M:%SZ)|$1|$2" >>"${GYRE_JOB_STATUS}"
}

trap 'gyre_job_exit EXIT 1' EXIT
trap 'gyre_job_exit ERR 1' ERR
trap 'gyre_job_exit TERM 143' TERM
trap 'gyre_job_exit INT 130' INT

{
    echo "CYLC_JOB_PID=$$"
    echo "CYLC_JOB_INIT_TIME=$(date -u +%Y-%m-%dT%H:%M:%SZ)"
} >>"${GYRE_JOB_STATUS}"

"#;

fn identity_exports(key: &TaskJobKey) -> String {
    format!(
        "export GYRE_TASK_JOB={}\n\
         export GYRE_TASK_CYCLE_POINT={}\n\
         export GYRE_TASK_NAME={}\n\
         export GYRE_TASK_SUBMIT_NUM={}\n",
        sh_quote(&key.job_log_dir()),
        sh_quote(&key.point),
        sh_quote(&key.name),
        key.submit_num
    )
}

/// Directive comment lines in the syntax of the target runner.
fn directive_lines(job_runner_name: &str, runtime: &RuntimeConfig) -> Vec<String> {
    runtime
        .directives
        .iter()
        .map(|(name, value)| match job_runner_name {
            "slurm" if value.is_empty() => format!("#SBATCH {name}"),
            "slurm" => format!("#SBATCH {name}={value}"),
            "pbs" if value.is_empty() => format!("#PBS {name}"),
            "pbs" => format!("#PBS {name} {value}"),
            _ if value.is_empty() => format!("# {name}"),
            _ => format!("# {name}={value}"),
        })
        .collect()
}

fn sh_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
#[path = "jobfile_tests.rs"]
mod tests;
