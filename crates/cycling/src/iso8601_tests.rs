// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn pt(expr: &str) -> IsoPoint {
    IsoPoint::parse(expr, &IsoConfig::utc()).unwrap()
}

fn seq(expr: &str, start: &str, stop: &str) -> IsoSequence {
    IsoSequence::new(expr, &pt(start), Some(&pt(stop))).unwrap()
}

fn forward(sequence: &IsoSequence, from: &str, limit: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut cursor = sequence.get_first_point(&pt(from)).unwrap();
    while let Some(point) = cursor {
        out.push(point.to_string());
        if out.len() >= limit {
            break;
        }
        cursor = sequence.get_next_point(&point).unwrap();
    }
    out
}

fn backward(sequence: &IsoSequence, from: &str, limit: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut cursor = sequence.get_nearest_prev_point(&pt(from)).unwrap();
    while let Some(point) = cursor {
        out.push(point.to_string());
        if out.len() >= limit {
            break;
        }
        cursor = sequence.get_prev_point(&point).unwrap();
    }
    out
}

// =============================================================================
// points
// =============================================================================

#[test]
fn point_renderings_compare_by_instant() {
    assert_eq!(pt("20000101T00Z"), pt("2000-01-01T00:00Z"));
    assert_eq!(pt("20000101T0530+0530"), pt("20000101T0000Z"));
    assert!(pt("20000101T00Z") < pt("20000101T01Z"));
}

#[test]
fn standardise_rewrites_to_the_canonical_form() {
    let point = pt("2000-01-01T06:30+05:30").standardise();
    assert_eq!(point.as_str(), "20000101T0100Z");
}

#[test]
fn point_keeps_the_expression_it_was_parsed_from() {
    let point = pt("2000-01-01T00:00Z");
    assert_eq!(point.as_str(), "2000-01-01T00:00Z");
    assert_eq!(point.to_string(), "2000-01-01T00:00Z");
}

#[test]
fn dump_respects_a_non_utc_config_zone() {
    let config = IsoConfig::with_time_zone(5, 30);
    let point = IsoPoint::parse("20000101T00Z", &config).unwrap();
    assert_eq!(point.standardise().as_str(), "20000101T0530+0530");
}

#[test]
fn point_resolution_handles_offsets_and_selectors() {
    let config = IsoConfig::utc();
    let context = pt("20150815T00Z");
    let resolved = IsoPoint::resolve("next(T06)", Some(&context), &config).unwrap();
    assert_eq!(resolved.as_str(), "20150815T0600Z");
    let shifted = IsoPoint::resolve("20000131T00Z+P1M", None, &config).unwrap();
    assert_eq!(shifted.as_str(), "20000229T0000Z");
}

#[test]
fn point_add_and_diff_round_trip() {
    let base = pt("20000101T00Z");
    let day = IsoInterval::parse("P1D").unwrap();
    let next = base.add(&day).unwrap();
    assert_eq!(next.as_str(), "20000102T0000Z");
    assert_eq!(next.diff(&base), day);
    assert_eq!(next.sub_interval(&day).unwrap(), base);
}

// =============================================================================
// intervals
// =============================================================================

#[yare::parameterized(
    days          = { "P3D", "P3D" },
    composite     = { "P1Y2M3DT4H5M6S", "P1Y2M3DT4H5M6S" },
    weeks         = { "P2W", "P2W" },
    time_only     = { "PT30M", "PT30M" },
    null          = { "P0Y", "P0Y" },
    null_plus     = { "+P0Y", "+P0Y" },
    negative      = { "-PT1H", "-PT1H" },
)]
fn interval_round_trips_through_display(expr: &str, rendered: &str) {
    assert_eq!(IsoInterval::parse(expr).unwrap().to_string(), rendered);
}

#[yare::parameterized(
    empty            = { "" },
    bare_p           = { "P" },
    dangling_t       = { "P1DT" },
    wrong_order      = { "PT1H2D" },
    missing_p        = { "1D" },
)]
fn malformed_intervals_are_rejected(expr: &str) {
    assert!(matches!(
        IsoInterval::parse(expr),
        Err(CyclingError::IntervalParsing { .. })
    ));
}

#[test]
fn exact_intervals_compare_by_total_seconds() {
    assert_eq!(
        IsoInterval::parse("P1D").unwrap(),
        IsoInterval::parse("PT24H").unwrap()
    );
    assert_eq!(
        IsoInterval::parse("P1W").unwrap(),
        IsoInterval::parse("P7D").unwrap()
    );
    assert_ne!(
        IsoInterval::parse("P1M").unwrap(),
        IsoInterval::parse("P30D").unwrap()
    );
}

#[test]
fn null_offset_equals_null_interval() {
    assert_eq!(IsoInterval::get_null_offset(), IsoInterval::get_null());
    assert_eq!(IsoInterval::get_null_offset().to_string(), "+P0Y");
    assert_eq!(IsoInterval::get_null().to_string(), "P0Y");
    assert!(IsoInterval::parse("PT0S").unwrap().is_null());
}

#[test]
fn interval_arithmetic_reduces_like_components() {
    let sum = IsoInterval::parse("P1M")
        .unwrap()
        .add(&IsoInterval::parse("P2M").unwrap())
        .unwrap();
    assert_eq!(sum, IsoInterval::parse("P3M").unwrap());
    let diff = IsoInterval::parse("PT3H")
        .unwrap()
        .sub(&IsoInterval::parse("PT1H").unwrap())
        .unwrap();
    assert_eq!(diff, IsoInterval::parse("PT2H").unwrap());
}

#[test]
fn mixed_sign_nominal_and_exact_sums_are_rejected() {
    let nominal = IsoInterval::parse("P1M").unwrap();
    let exact = IsoInterval::parse("-PT1H").unwrap();
    assert!(matches!(
        nominal.add(&exact),
        Err(CyclingError::IntervalArithmetic { .. })
    ));
}

#[test]
fn scale_multiplies_each_component() {
    let scaled = IsoInterval::parse("P1DT2H").unwrap().scale(3);
    assert_eq!(scaled, IsoInterval::parse("P3DT6H").unwrap());
    let negated = IsoInterval::parse("PT1H").unwrap().scale(-2);
    assert_eq!(negated, IsoInterval::parse("-PT2H").unwrap());
}

#[test]
fn from_seconds_breaks_down_into_days_and_time() {
    assert_eq!(IsoInterval::from_seconds(90_061).to_string(), "P1DT1H1M1S");
    assert_eq!(IsoInterval::from_seconds(-3_600).to_string(), "-PT1H");
    assert_eq!(IsoInterval::from_seconds(0).to_string(), "P0Y");
}

// =============================================================================
// sequence construction
// =============================================================================

#[yare::parameterized(
    hourly = {
        "PT1H", "20000101T00Z", "20000101T03Z",
        &["20000101T0000Z", "20000101T0100Z", "20000101T0200Z", "20000101T0300Z"]
    },
    daily_from_point = {
        "20000103T00Z/P1D", "20000101T00Z", "20000105T00Z",
        &["20000103T0000Z", "20000104T0000Z", "20000105T0000Z"]
    },
    weekly = {
        "P1W", "20000101T00Z", "20000131T00Z",
        &["20000101T0000Z", "20000108T0000Z", "20000115T0000Z", "20000122T0000Z", "20000129T0000Z"]
    },
    truncated_start = {
        "T06/PT12H", "20000101T00Z", "20000102T12Z",
        &["20000101T0600Z", "20000101T1800Z", "20000102T0600Z"]
    },
    bounded_divides_the_span = {
        "R3/20000101T00Z/20000102T06Z", "20000101T00Z", "20000103T00Z",
        &["20000101T0000Z", "20000101T1500Z", "20000102T0600Z"]
    },
    end_anchored_exact = {
        "R/PT6H", "20000101T01Z", "20000102T00Z",
        &["20000101T0600Z", "20000101T1200Z", "20000101T1800Z", "20000102T0000Z"]
    },
)]
fn realized_points(expr: &str, start: &str, stop: &str, expected: &[&str]) {
    let sequence = seq(expr, start, stop);
    assert_eq!(forward(&sequence, start, 50), expected);
}

#[test]
fn context_cloned_bounds_standardise_to_canonical_form() {
    let sequence = seq("PT1H", "20000101T00Z", "20000101T03Z");
    assert_eq!(
        sequence.get_start_point().unwrap().unwrap().as_str(),
        "20000101T0000Z"
    );
    assert_eq!(
        sequence.get_stop_point().unwrap().unwrap().as_str(),
        "20000101T0300Z"
    );
}

#[test]
fn one_off_at_the_final_context_point() {
    let sequence = seq("R1/P0Y", "20000101T00Z", "20000105T00Z");
    assert_eq!(forward(&sequence, "20000101T00Z", 10), &["20000105T0000Z"]);
    assert_eq!(
        sequence.get_stop_point().unwrap().unwrap().as_str(),
        "20000105T0000Z"
    );
}

#[test]
fn backward_bounds_swap_into_an_ascending_grid() {
    let sequence = seq("R2/20000105T00Z/20000101T00Z", "20000101T00Z", "20000110T00Z");
    assert_eq!(
        forward(&sequence, "20000101T00Z", 10),
        &["20000101T0000Z", "20000105T0000Z"]
    );
}

#[test]
fn uneven_bounded_span_snaps_the_stop_onto_the_grid() {
    // A 7-second span over three points floors the step to PT3S; the raw
    // end is off the grid.
    let sequence = seq(
        "R3/20000101T000000Z/20000101T000007Z",
        "20000101T00Z",
        "20000101T01Z",
    );
    assert_eq!(
        sequence.get_stop_point().unwrap(),
        Some(pt("20000101T000006Z"))
    );
    assert!(!sequence.is_valid(&pt("20000101T000007Z")));
}

#[test]
fn monthly_steps_clamp_at_month_ends_cumulatively() {
    let sequence = seq("P1M", "20000131T00Z", "20000601T00Z");
    assert_eq!(
        forward(&sequence, "20000131T00Z", 10),
        &[
            "20000131T0000Z",
            "20000229T0000Z",
            "20000329T0000Z",
            "20000429T0000Z",
            "20000529T0000Z",
        ]
    );
}

#[test]
fn end_anchored_monthly_walks_down_from_the_final_point() {
    let sequence = seq("R/P1M", "20000101T00Z", "20000331T00Z");
    assert_eq!(
        forward(&sequence, "20000101T00Z", 10),
        &["20000129T0000Z", "20000229T0000Z", "20000331T0000Z"]
    );
    assert_eq!(
        backward(&sequence, "20000331T00Z", 10),
        &["20000331T0000Z", "20000229T0000Z", "20000129T0000Z"]
    );
}

#[test]
fn end_anchored_count_takes_the_last_n_points() {
    let sequence = seq("R2/P1D/20000110T00Z", "20000101T00Z", "20000110T00Z");
    assert_eq!(
        forward(&sequence, "20000101T00Z", 10),
        &["20000109T0000Z", "20000110T0000Z"]
    );
}

#[test]
fn degenerate_step_errors_on_navigation() {
    let sequence = seq("R/P0D", "20000101T00Z", "20000105T00Z");
    assert!(sequence.is_on_sequence(&pt("20000105T00Z")));
    assert!(matches!(
        sequence.get_next_point(&pt("20000101T00Z")),
        Err(CyclingError::SequenceDegenerate { .. })
    ));
}

// =============================================================================
// navigation
// =============================================================================

#[test]
fn hourly_navigation_contracts() {
    let sequence = seq("PT1H", "20000101T00Z", "20000101T04Z");
    assert_eq!(
        sequence.get_next_point(&pt("19991231T00Z")).unwrap(),
        Some(pt("20000101T00Z"))
    );
    assert_eq!(
        sequence.get_next_point(&pt("20000101T0030Z")).unwrap(),
        Some(pt("20000101T01Z"))
    );
    assert_eq!(sequence.get_next_point(&pt("20000101T04Z")).unwrap(), None);
    assert_eq!(
        sequence.get_prev_point(&pt("20000101T02Z")).unwrap(),
        Some(pt("20000101T01Z"))
    );
    assert_eq!(
        sequence
            .get_nearest_prev_point(&pt("20000109T0030Z"))
            .unwrap(),
        Some(pt("20000101T04Z"))
    );
    assert!(sequence.is_on_sequence(&pt("20000101T09Z")));
    assert!(!sequence.is_valid(&pt("20000101T09Z")));
}

#[test]
fn repeated_validity_checks_are_cache_coherent() {
    let sequence = seq("PT1H", "20000101T00Z", "20000101T04Z");
    let point = pt("20000101T02Z");
    for _ in 0..3 {
        assert!(sequence.is_valid(&point));
        assert!(!sequence.is_valid(&pt("20000101T0230Z")));
    }
    for _ in 0..3 {
        assert_eq!(
            sequence.get_next_point(&point).unwrap(),
            Some(pt("20000101T03Z"))
        );
    }
}

// =============================================================================
// exclusions
// =============================================================================

#[test]
fn excluded_hour_is_skipped_in_both_directions() {
    let sequence = seq("PT1H!20000101T02Z", "20000101T00Z", "20000101T04Z");
    assert_eq!(
        forward(&sequence, "20000101T00Z", 10),
        &[
            "20000101T0000Z",
            "20000101T0100Z",
            "20000101T0300Z",
            "20000101T0400Z",
        ]
    );
    assert_eq!(
        backward(&sequence, "20000101T04Z", 10),
        &[
            "20000101T0400Z",
            "20000101T0300Z",
            "20000101T0100Z",
            "20000101T0000Z",
        ]
    );
    assert!(!sequence.is_valid(&pt("20000101T02Z")));
}

#[test]
fn excluded_sequence_removes_a_whole_grid() {
    let sequence = seq("PT1H!PT2H", "20000101T00Z", "20000101T04Z");
    assert_eq!(
        forward(&sequence, "20000101T00Z", 10),
        &["20000101T0100Z", "20000101T0300Z"]
    );
    assert_eq!(
        sequence.get_start_point().unwrap(),
        Some(pt("20000101T01Z"))
    );
    assert_eq!(
        sequence.get_stop_point().unwrap(),
        Some(pt("20000101T03Z"))
    );
}

#[test]
fn offset_exclusion_resolves_against_the_sequence_start() {
    let sequence = seq("PT1H!+PT1H", "20000101T00Z", "20000101T03Z");
    assert_eq!(
        forward(&sequence, "20000101T00Z", 10),
        &["20000101T0000Z", "20000101T0200Z", "20000101T0300Z"]
    );
}

#[test]
fn offset_exclusion_anchors_at_a_resolved_start_inside_the_window() {
    // +PT2H names resolved-start + 2h, not window-start + 2h.
    let sequence = seq("R/20000101T06Z/PT2H!+PT2H", "20000101T00Z", "20000101T12Z");
    assert_eq!(
        forward(&sequence, "20000101T00Z", 10),
        &["20000101T0600Z", "20000101T1000Z", "20000101T1200Z"]
    );
}

#[test]
fn grouped_exclusions_combine_points_and_sequences() {
    let sequence = seq(
        "PT1H!(20000101T01Z, PT4H)",
        "20000101T00Z",
        "20000101T06Z",
    );
    assert_eq!(
        forward(&sequence, "20000101T00Z", 10),
        &[
            "20000101T0200Z",
            "20000101T0300Z",
            "20000101T0500Z",
            "20000101T0600Z",
        ]
    );
}

// =============================================================================
// offsets
// =============================================================================

#[test]
fn set_offset_shifts_and_snaps_back_into_the_window() {
    let mut sequence = seq("PT6H", "20000101T00Z", "20000101T18Z");
    sequence
        .set_offset(&IsoInterval::parse("-PT1H").unwrap())
        .unwrap();
    assert_eq!(
        forward(&sequence, "20000101T00Z", 10),
        &["20000101T0500Z", "20000101T1100Z", "20000101T1700Z"]
    );
    assert_eq!(
        sequence.accumulated_offset(),
        IsoInterval::parse("-PT1H").unwrap()
    );
}

#[test]
fn set_offset_accumulates_across_calls() {
    let mut sequence = seq("PT6H", "20000101T00Z", "20000101T18Z");
    for _ in 0..2 {
        sequence
            .set_offset(&IsoInterval::parse("-PT1H").unwrap())
            .unwrap();
    }
    assert_eq!(
        forward(&sequence, "20000101T00Z", 10),
        &["20000101T0400Z", "20000101T1000Z", "20000101T1600Z"]
    );
    assert_eq!(
        sequence.accumulated_offset(),
        IsoInterval::parse("-PT2H").unwrap()
    );
}

// =============================================================================
// equality and expression forms
// =============================================================================

#[test]
fn equivalent_expressions_compare_equal() {
    assert_eq!(
        seq("PT1H", "20000101T00Z", "20000101T04Z"),
        seq("20000101T00Z/PT1H", "20000101T00Z", "20000101T04Z")
    );
    assert_ne!(
        seq("PT1H", "20000101T00Z", "20000101T04Z"),
        seq("PT2H", "20000101T00Z", "20000101T04Z")
    );
}

#[test]
fn async_expr_names_a_one_off() {
    assert_eq!(
        IsoSequence::get_async_expr(Some(&pt("20000101T00Z"))),
        "R1/20000101T00Z"
    );
    assert_eq!(IsoSequence::get_async_expr(None), "R1");
}

#[test]
fn cloned_sequences_navigate_identically() {
    let sequence = seq("PT1H!20000101T02Z", "20000101T00Z", "20000101T04Z");
    let clone = sequence.clone();
    assert_eq!(sequence, clone);
    assert_eq!(
        clone.get_next_point(&pt("20000101T01Z")).unwrap(),
        Some(pt("20000101T03Z"))
    );
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn exact_step_next_point_is_on_sequence_and_ahead(
            step in 1i64..120,
            query in 0i64..1440,
        ) {
            let expr = format!("R/20000101T00Z/PT{step}M");
            let sequence =
                IsoSequence::new(&expr, &pt("20000101T00Z"), Some(&pt("20000102T00Z"))).unwrap();
            let point = pt(&format!("20000101T{:02}{:02}Z", query / 60, query % 60));
            if let Some(next) = sequence.get_next_point(&point).unwrap() {
                prop_assert!(next > point);
                prop_assert!(sequence.is_on_sequence(&next));
                prop_assert!(sequence.is_valid(&next));
            }
        }

        #[test]
        fn exact_step_prev_then_next_round_trips(
            step in 1i64..120,
            hops in 1i64..12,
        ) {
            let expr = format!("R/20000101T00Z/PT{step}M");
            let sequence =
                IsoSequence::new(&expr, &pt("20000101T00Z"), Some(&pt("20000102T00Z"))).unwrap();
            let total = step * hops;
            let point = pt(&format!("20000101T{:02}{:02}Z", total / 60, total % 60));
            let prev = sequence.get_prev_point(&point).unwrap().unwrap();
            let back = sequence.get_next_point(&prev).unwrap().unwrap();
            prop_assert_eq!(back, point);
        }
    }
}
