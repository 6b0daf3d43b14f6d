// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

// ============================================================================
// Id recovery
// ============================================================================

#[parameterized(
    normal        = { "Submitted batch job 12345",          Some("12345") },
    with_trailer  = { "Submitted batch job 987 on cluster", Some("987") },
    indented      = { "  Submitted batch job 1",            None },
    sbatch_error  = { "sbatch: error: invalid partition",   None },
)]
fn rec_id_reads_sbatch_stdout(line: &str, expected: Option<&str>) {
    let regex = SlurmHandler.rec_id_from_submit_out().unwrap();
    let found = regex
        .captures(line)
        .and_then(|caps| caps.name("id").map(|m| m.as_str().to_string()));
    assert_eq!(found.as_deref(), expected);
}

// ============================================================================
// Command shapes
// ============================================================================

#[test]
fn command_templates_use_the_standard_tools() {
    assert_eq!(SlurmHandler.submit_command_template(), Some("sbatch {job}"));
    assert_eq!(SlurmHandler.kill_command_template(), Some("scancel {job_id}"));
    assert!(!SlurmHandler.should_kill_proc_group());
    assert!(!SlurmHandler.should_poll_proc_group());
}

#[test]
fn poll_command_queries_all_ids_at_once() {
    let ids = vec!["11".to_string(), "22".to_string()];
    assert_eq!(
        SlurmHandler.poll_command(&ids),
        vec!["squeue", "-h", "-j", "11,22"]
    );
}

// ============================================================================
// Poll output filtering
// ============================================================================

#[test]
fn filter_collapses_job_array_tasks_onto_the_submitted_id() {
    let out = "  101 debug  model  user R  0:01  1 nid0001\n\
               102_3 debug  post   user PD 0:00  1 (Priority)\n";
    let ids = SlurmHandler.filter_poll_output(out).unwrap();
    assert_eq!(ids, vec!["101".to_string(), "102".to_string()]);
}

#[test]
fn filter_of_empty_output_yields_no_ids() {
    assert_eq!(SlurmHandler.filter_poll_output(""), Some(Vec::new()));
}
