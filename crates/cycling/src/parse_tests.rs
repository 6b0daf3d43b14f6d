// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn spec(expr: &str) -> RecurrenceSpec {
    classify_integer(expr).unwrap()
}

#[test]
fn bounded_form_captures_both_points() {
    let s = spec("R3/1/10");
    assert_eq!(s.kind, RecurrenceKind::Bounded);
    assert_eq!(s.reps, Some(3));
    assert_eq!(s.start.as_deref(), Some("1"));
    assert_eq!(s.end.as_deref(), Some("10"));
    assert_eq!(s.interval, None);
}

#[test]
fn bounded_repeat_count_needs_no_interval() {
    // The step comes out of the two bounds, not an interval token.
    let s = spec("R5/1/9");
    assert_eq!(s.kind, RecurrenceKind::Bounded);
    assert_eq!(s.reps, Some(5));
    assert_eq!(s.interval, None);

    let s = classify_iso("R2/20000105T00Z/20000101T00Z").unwrap();
    assert_eq!(s.kind, RecurrenceKind::Bounded);
    assert_eq!(s.reps, Some(2));
}

#[yare::parameterized(
    counted = { "R5/2/P3", Some(5), Some("2"), Some("P3") },
    uncounted = { "R/2/P3", None, Some("2"), Some("P3") },
    bare_pair = { "4/P2", None, Some("4"), Some("P2") },
    interval_only = { "P2", None, None, Some("P2") },
    offset_start = { "+P1/P2", None, Some("+P1"), Some("P2") },
)]
fn start_anchored_forms(
    expr: &str,
    reps: Option<u64>,
    start: Option<&str>,
    interval: Option<&str>,
) {
    let s = spec(expr);
    assert_eq!(s.kind, RecurrenceKind::FromStart);
    assert_eq!(s.reps, reps);
    assert_eq!(s.start.as_deref(), start);
    assert_eq!(s.interval.as_deref(), interval);
    assert_eq!(s.end, None);
}

#[yare::parameterized(
    counted = { "R4/P2/8", Some(4), Some("P2"), Some("8") },
    uncounted = { "R/P2/8", None, Some("P2"), Some("8") },
    bare_pair = { "P2/8", None, Some("P2"), Some("8") },
    interval_no_end = { "R2/P6", Some(2), Some("P6"), None },
    one_off_at_end = { "R1//5", Some(1), None, Some("5") },
)]
fn end_anchored_forms(expr: &str, reps: Option<u64>, interval: Option<&str>, end: Option<&str>) {
    let s = spec(expr);
    assert_eq!(s.kind, RecurrenceKind::FromEnd);
    assert_eq!(s.reps, reps);
    assert_eq!(s.interval.as_deref(), interval);
    assert_eq!(s.end.as_deref(), end);
    assert_eq!(s.start, None);
}

#[test]
fn one_off_forms_anchor_at_start() {
    let s = spec("R1/5");
    assert_eq!(s.kind, RecurrenceKind::FromStart);
    assert_eq!(s.reps, Some(1));
    assert_eq!(s.start.as_deref(), Some("5"));

    let s = spec("R1");
    assert_eq!(s.kind, RecurrenceKind::FromStart);
    assert_eq!(s.reps, Some(1));
    assert_eq!(s.start, None);
    assert_eq!(s.interval, None);
}

#[test]
fn iso_rows_split_point_and_duration_tokens() {
    let s = classify_iso("PT1H").unwrap();
    assert_eq!(s.kind, RecurrenceKind::FromStart);
    assert_eq!(s.interval.as_deref(), Some("PT1H"));

    let s = classify_iso("R/20000101T00/P1D").unwrap();
    assert_eq!(s.start.as_deref(), Some("20000101T00"));
    assert_eq!(s.interval.as_deref(), Some("P1D"));

    let s = classify_iso("R1/P0Y").unwrap();
    assert_eq!(s.kind, RecurrenceKind::FromEnd);
    assert_eq!(s.reps, Some(1));
    assert_eq!(s.interval.as_deref(), Some("P0Y"));
    assert_eq!(s.end, None);

    // Truncated time-of-day counts as a point token
    let s = classify_iso("T00/P1D").unwrap();
    assert_eq!(s.start.as_deref(), Some("T00"));
}

#[yare::parameterized(
    no_format = { "R/5" },
    empty = { "" },
    zero_reps = { "R0/1/10" },
    count_without_interval = { "R5/2" },
    unbounded_two_points = { "R/1/10" },
)]
fn unclassifiable_expressions_error(expr: &str) {
    assert!(matches!(
        classify_integer(expr),
        Err(CyclingError::SequenceParsing { .. })
    ));
}

#[yare::parameterized(
    none = { "R/P1", "R/P1", &[] },
    single = { "R/P1!3", "R/P1", &["3"] },
    single_parens = { "R/P1!(3)", "R/P1", &["3"] },
    multiple = { "R/P1!(2,3,7)", "R/P1", &["2", "3", "7"] },
    spaced = { "R/P1 ! (2, 3)", "R/P1", &["2", "3"] },
    nested_sequence = { "P1!P2", "P1", &["P2"] },
)]
fn exclusion_split(expr: &str, core: &str, entries: &[&str]) {
    let (got_core, got_entries) = parse_exclusion(expr).unwrap();
    assert_eq!(got_core, core);
    assert_eq!(got_entries, entries);
}

#[yare::parameterized(
    double_bang = { "R/P1!3!4" },
    commas_without_parens = { "R/P1!2,3" },
    dangling_paren = { "R/P1!(2,3" },
    nested_parens = { "R/P1!((2),3)" },
    trailing_text = { "R/P1!(2,3)x" },
)]
fn malformed_exclusions_error(expr: &str) {
    assert!(parse_exclusion(expr).is_err());
}

#[test]
fn empty_exclusion_entry_errors() {
    assert!(matches!(
        parse_exclusion("R/P1!(2,,3)"),
        Err(CyclingError::ExclusionParsing { .. })
    ));
    assert!(parse_exclusion("R/P1!").is_err());
}
