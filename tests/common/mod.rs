// Shared fixtures for the end-to-end tests

#![allow(dead_code)]

use gearshift::config::{GearshiftConfig, SourceConfig, WindowClock};
use gearshift::datasink::{MemorySink, SinkDispatcher};
use gearshift::datasource::JsonLinesFileSource;
use gearshift::server::{GearChangeJob, JobSummary, ShutdownCoordinator};
use serde_json::{json, Value};
use std::io::Write;
use tempfile::NamedTempFile;

/// One telemetry line shaped like the classic producer output.
pub fn telemetry(car: i64, gear: &str, time: &str) -> Value {
    json!({"Car": car, "time": time, "telemetry": {"Gear": gear, "Speed": "120.5"}})
}

pub fn write_lines(lines: &[String]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    for line in lines {
        writeln!(file, "{}", line).expect("write line");
    }
    file
}

pub fn write_values(values: &[Value]) -> NamedTempFile {
    let lines: Vec<String> = values.iter().map(Value::to_string).collect();
    write_lines(&lines)
}

/// Event-time config reading the `time` field (seconds as text).
pub fn event_time_config(file: &NamedTempFile) -> GearshiftConfig {
    let mut config = GearshiftConfig::default();
    config.window.clock = WindowClock::EventTime;
    config.fields.event_time = Some("time".to_string());
    config.source = SourceConfig::File {
        path: file.path().to_path_buf(),
    };
    config
}

/// Run a job over the config's file source into a memory sink.
pub async fn run_to_memory(config: GearshiftConfig) -> (JobSummary, Vec<String>) {
    let path = match &config.source {
        SourceConfig::File { path } => path.clone(),
        other => panic!("expected a file source, got {:?}", other),
    };
    let job = GearChangeJob::new(config).expect("valid config");
    let source = JsonLinesFileSource::open(&path, 100)
        .await
        .expect("open source");
    let sink = MemorySink::new();
    let dispatcher = SinkDispatcher::new().with_sink(Box::new(sink.clone()));
    let coordinator = ShutdownCoordinator::new();

    let summary = job
        .run(Box::new(source), dispatcher, coordinator.subscribe())
        .await
        .expect("job succeeds");
    (summary, sink.lines())
}
