//! Integer cycling scenarios: canonical enumerations and the navigation
//! properties every sequence must hold.

use gyre_cycling::{IntegerPoint, IntegerSequence, SequenceOps};
use similar_asserts::assert_eq;

fn sequence(expr: &str, start: i64, stop: i64) -> IntegerSequence {
    IntegerSequence::new(expr, start, Some(stop)).unwrap()
}

fn forward(sequence: &IntegerSequence) -> Vec<i64> {
    let mut out = Vec::new();
    let mut cursor = sequence.get_start_point().unwrap();
    while let Some(point) = cursor {
        out.push(point.value());
        cursor = sequence.get_next_point(&point).unwrap();
    }
    out
}

fn backward(sequence: &IntegerSequence) -> Vec<i64> {
    let mut out = Vec::new();
    let mut cursor = sequence.get_stop_point().unwrap();
    while let Some(point) = cursor {
        out.push(point.value());
        cursor = sequence.get_prev_point(&point).unwrap();
    }
    out
}

#[test]
fn a_single_exclusion_drops_just_that_point() {
    let sequence = sequence("R/P1!3", 1, 5);
    assert_eq!(forward(&sequence), vec![1, 2, 4, 5]);
    assert!(!sequence.is_on_sequence(&IntegerPoint::new(3)));
}

#[test]
fn an_exclusion_list_drops_every_member() {
    let sequence = sequence("R/P1!(2,3,7)", 1, 10);
    assert_eq!(forward(&sequence), vec![1, 4, 5, 6, 8, 9, 10]);
}

#[test]
fn a_stride_walks_the_same_grid_in_both_directions() {
    let sequence = sequence("R/1/P3", 1, 10);
    assert_eq!(forward(&sequence), vec![1, 4, 7, 10]);
    assert_eq!(backward(&sequence), vec![10, 7, 4, 1]);
}

#[test]
fn navigation_round_trips_between_neighbors() {
    let sequence = sequence("R/1/P3", 1, 10);
    for value in [4, 7, 10] {
        let point = IntegerPoint::new(value);
        let prev = sequence.get_prev_point(&point).unwrap().unwrap();
        assert_eq!(sequence.get_next_point(&prev).unwrap(), Some(point));
    }
    for value in [1, 4, 7] {
        let point = IntegerPoint::new(value);
        let next = sequence.get_next_point(&point).unwrap().unwrap();
        assert_eq!(sequence.get_prev_point(&next).unwrap(), Some(point));
    }
}

#[test]
fn every_returned_point_lies_inside_the_window() {
    let sequence = sequence("R/1/P3", 1, 10);
    assert_eq!(sequence.get_next_point(&IntegerPoint::new(10)).unwrap(), None);
    assert_eq!(sequence.get_prev_point(&IntegerPoint::new(1)).unwrap(), None);
    let first = sequence.get_start_point().unwrap().unwrap();
    let last = sequence.get_stop_point().unwrap().unwrap();
    for point in forward(&sequence) {
        assert!(point >= first.value() && point <= last.value());
    }
}
