// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    utc = { 0, 0, "Z" },
    plus_hours = { 13, 0, "+1300" },
    minus_hours = { -8, 0, "-0800" },
    half_hour = { 5, 30, "+0530" },
    negative_half = { -5, -30, "-0530" },
)]
fn designator_renders_offset(hours: i8, minutes: i8, expected: &str) {
    assert_eq!(TimeZoneOffset::new(hours, minutes).designator(), expected);
}

#[test]
fn total_minutes_sums_signed_fields() {
    assert_eq!(TimeZoneOffset::new(-5, -30).total_minutes(), -330);
    assert_eq!(TimeZoneOffset::new(1, 15).total_minutes(), 75);
}

#[test]
fn fixed_offset_round_trips() {
    let off = TimeZoneOffset::new(5, 30).to_fixed_offset().unwrap();
    assert_eq!(off.local_minus_utc(), 330 * 60);
}

#[test]
fn default_config_is_utc() {
    let config = IsoConfig::default();
    assert!(config.time_zone.is_utc());
    assert_eq!(config.expanded_year_digits, 0);
    assert_eq!(config, IsoConfig::utc());
}

#[test]
fn config_serializes_round_trip() {
    let config = IsoConfig::with_time_zone(-8, 0);
    let json = serde_json::to_string(&config).unwrap();
    let back: IsoConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}
