//! # gearshift
//!
//! Counts per-vehicle gear transitions over keyed tumbling windows.
//!
//! Telemetry records are read from Kafka or a JSON-lines file, reduced to
//! `(key, gear, event_time)` events, folded per key and window in arrival order,
//! and emitted as one `Car<key> : <count>` line per key per window when the
//! window closes.
//!
//! ## Features
//!
//! - **Order-preserving folds**: every key is owned by exactly one shard worker fed over a FIFO channel
//! - **Processing or event time**: wall-clock ticks or a monotonic event-time watermark close windows
//! - **Pluggable I/O**: `EventSource` and `LineSink` traits with Kafka, file, console and in-memory implementations
//! - **Graceful shutdown**: signals discard open windows; end of input flushes them
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gearshift::config::{GearshiftConfig, SourceConfig};
//! use gearshift::server::{run_from_config, ShutdownCoordinator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = GearshiftConfig::default();
//!     config.source = SourceConfig::File {
//!         path: "telemetry.jsonl".into(),
//!     };
//!
//!     let coordinator = ShutdownCoordinator::new();
//!     let summary = run_from_config(config, coordinator.subscribe()).await?;
//!     println!("{}", summary);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod datasink;
pub mod datasource;
pub mod execution;
pub mod server;

pub use config::{ConfigError, EventTimeUnit, GearshiftConfig, WindowClock};
pub use datasink::{LineSink, SinkDispatcher, SinkError};
pub use datasource::{EventSource, SourceBatch, SourceError};
pub use execution::{
    format_line, merge, AccumulatorState, GearChangeCount, ParseError, TelemetryEvent,
    TelemetryParser, WindowAggregator,
};
pub use server::{GearChangeJob, JobError, JobSummary, RelayJob};
