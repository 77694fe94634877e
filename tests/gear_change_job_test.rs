//! End-to-end runs of the gear change job over JSON-lines captures.

mod common;

use common::*;
use gearshift::config::load_config;
use serde_json::json;
use std::io::Write;

#[tokio::test]
async fn test_counts_transitions_per_car() {
    let file = write_values(&[
        telemetry(9, "3.000000", "0.000000"),
        telemetry(4, "2.000000", "0.250000"),
        telemetry(9, "3.000000", "0.500000"),
        telemetry(9, "4.000000", "1.000000"),
        telemetry(9, "4.000000", "1.500000"),
        telemetry(9, "5.000000", "2.000000"),
    ]);

    let (summary, mut lines) = run_to_memory(event_time_config(&file)).await;
    lines.sort();

    assert_eq!(lines, vec!["Car4 : 0", "Car9 : 2"]);
    assert_eq!(summary.records_read, 6);
    assert_eq!(summary.events_parsed, 6);
    assert_eq!(summary.results_emitted, 2);
    assert_eq!(summary.lines_dispatched, 2);
    assert!(!summary.cancelled);
}

#[tokio::test]
async fn test_window_end_is_exclusive() {
    let file = write_values(&[
        telemetry(1, "1", "0.000000"),
        telemetry(1, "2", "2.999000"),
        telemetry(1, "3", "3.000000"),
    ]);

    let (summary, lines) = run_to_memory(event_time_config(&file)).await;

    // [0s, 3s) sees 1 -> 2; the reading at exactly 3s opens the next window
    assert_eq!(lines, vec!["Car1 : 1", "Car1 : 0"]);
    assert_eq!(summary.late_events, 0);
}

#[tokio::test]
async fn test_bad_records_are_dropped_and_counting_continues() {
    let mut file = write_values(&[
        telemetry(9, "1.000000", "0.100000"),
        json!({"Car": 9, "time": "0.200000"}),
        telemetry(9, "1.000000", "0.300000"),
        telemetry(3, "N", "0.400000"),
        telemetry(9, "2.000000", "0.500000"),
    ]);
    writeln!(file, "{{not json").unwrap();

    let (summary, lines) = run_to_memory(event_time_config(&file)).await;

    assert_eq!(lines, vec!["Car9 : 1"]);
    assert_eq!(summary.records_read, 5);
    assert_eq!(summary.dropped_records, 2);
    assert_eq!(summary.malformed_records, 1);
}

#[tokio::test]
async fn test_interleaved_keys_are_independent() {
    let file = write_values(&[
        telemetry(1, "1", "0.100000"),
        telemetry(2, "5", "0.200000"),
        telemetry(1, "2", "0.300000"),
        telemetry(2, "5", "0.400000"),
        telemetry(1, "1", "0.500000"),
        telemetry(2, "5", "0.600000"),
    ]);

    let (_, mut lines) = run_to_memory(event_time_config(&file)).await;
    lines.sort();

    assert_eq!(lines, vec!["Car1 : 2", "Car2 : 0"]);
}

#[tokio::test]
async fn test_out_of_orderness_keeps_window_open() {
    let file = write_values(&[
        telemetry(1, "1", "0.000000"),
        telemetry(1, "2", "3.500000"),
        telemetry(1, "3", "2.900000"),
        telemetry(1, "2", "4.500000"),
    ]);
    let mut config = event_time_config(&file);
    config.window.max_out_of_orderness_ms = 1000;

    let (summary, lines) = run_to_memory(config).await;

    assert_eq!(lines, vec!["Car1 : 1", "Car1 : 0"]);
    assert_eq!(summary.late_events, 0);
}

#[tokio::test]
async fn test_late_event_after_close_is_dropped() {
    let file = write_values(&[
        telemetry(1, "1", "0.000000"),
        telemetry(1, "2", "3.500000"),
        telemetry(1, "3", "2.900000"),
    ]);

    let (summary, lines) = run_to_memory(event_time_config(&file)).await;

    assert_eq!(lines, vec!["Car1 : 0", "Car1 : 0"]);
    assert_eq!(summary.late_events, 1);
}

#[tokio::test]
async fn test_yaml_config_drives_field_paths_and_window() {
    let data = write_values(&[
        json!({"vehicle": "A", "ts": 0, "gearbox": {"gear": 1}}),
        json!({"vehicle": "A", "ts": 4000, "gearbox": {"gear": 2}}),
        json!({"vehicle": "A", "ts": 9000, "gearbox": {"gear": 3}}),
    ]);

    let mut config_file = tempfile::NamedTempFile::new().unwrap();
    write!(
        config_file,
        r#"
window:
  length_seconds: 5
  clock: event_time
fields:
  key: vehicle
  gear: gearbox.gear
  event_time: ts
  event_time_unit: millis
source:
  type: file
  path: {}
runtime:
  shards: 1
"#,
        data.path().display()
    )
    .unwrap();

    let config = load_config(config_file.path()).unwrap();
    let (_, lines) = run_to_memory(config).await;

    assert_eq!(lines, vec!["CarA : 1", "CarA : 0"]);
}
