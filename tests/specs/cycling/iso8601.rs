//! ISO 8601 cycling scenarios.

use gyre_cycling::{IsoConfig, IsoPoint, IsoSequence, PointOps, SequenceOps};
use similar_asserts::assert_eq;

fn pt(expr: &str) -> IsoPoint {
    IsoPoint::parse(expr, &IsoConfig::utc()).unwrap()
}

fn take_forward(sequence: &IsoSequence, limit: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut cursor = sequence.get_start_point().unwrap();
    while let Some(point) = cursor {
        out.push(point.to_string());
        if out.len() >= limit {
            break;
        }
        cursor = sequence.get_next_point(&point).unwrap();
    }
    out
}

#[test]
fn an_hourly_sequence_skips_its_excluded_hour() {
    let sequence = IsoSequence::new("PT1H!20000101T02Z", &pt("20000101T00Z"), None).unwrap();
    assert_eq!(
        take_forward(&sequence, 4),
        vec![
            "20000101T0000Z",
            "20000101T0100Z",
            "20000101T0300Z",
            "20000101T0400Z",
        ]
    );
    assert!(!sequence.is_on_sequence(&pt("20000101T02Z")));
}

#[test]
fn standardising_twice_is_the_same_as_once() {
    let once = pt("2000-01-01T06:30+05:30").standardise();
    let twice = once.clone().standardise();
    assert_eq!(once.as_str(), "20000101T0100Z");
    assert_eq!(twice, once);
    assert_eq!(twice.as_str(), once.as_str());
}

#[test]
fn navigation_round_trips_between_neighbors() {
    let sequence =
        IsoSequence::new("PT1H", &pt("20000101T00Z"), Some(&pt("20000101T04Z"))).unwrap();
    let point = pt("20000101T02Z");
    let prev = sequence.get_prev_point(&point).unwrap().unwrap();
    assert_eq!(
        sequence.get_next_point(&prev).unwrap().unwrap().as_str(),
        "20000101T0200Z"
    );
    let next = sequence.get_next_point(&point).unwrap().unwrap();
    assert_eq!(
        sequence.get_prev_point(&next).unwrap().unwrap().as_str(),
        "20000101T0200Z"
    );
}
