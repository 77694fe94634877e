//! Job runtime
//!
//! - [`job::GearChangeJob`]: parse, shard, window and dispatch gear transition counts
//! - [`relay::RelayJob`]: forward raw records to the sinks unchanged
//! - [`shutdown`]: OS signal handling and cancellation broadcast

pub mod job;
pub mod relay;
pub mod shard;
pub mod shutdown;

pub use job::{run_from_config, GearChangeJob};
pub use relay::{RelayJob, RelaySummary};
pub use shard::{ShardMessage, ShardReport, ShardWorker};
pub use shutdown::{ShutdownCoordinator, ShutdownSignal};

use crate::config::ConfigError;
use crate::datasink::SinkError;
use crate::datasource::SourceError;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// A worker task panicked or a channel closed unexpectedly
    #[error("Task failure: {0}")]
    Task(String),
}

/// Counters reported when a gear change job ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobSummary {
    /// Records decoded by the source
    pub records_read: u64,
    /// Records turned into telemetry events
    pub events_parsed: u64,
    /// Records rejected by the parser
    pub dropped_records: u64,
    /// Payloads the source could not decode
    pub malformed_records: u64,
    /// Events whose window had already closed
    pub late_events: u64,
    /// Per-key window results produced by the shards
    pub results_emitted: u64,
    pub lines_dispatched: u64,
    pub delivery_failures: u64,
    /// True when the job stopped on a shutdown signal
    pub cancelled: bool,
}

impl fmt::Display for JobSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "read={} parsed={} dropped={} malformed={} late={} results={} dispatched={} failures={}{}",
            self.records_read,
            self.events_parsed,
            self.dropped_records,
            self.malformed_records,
            self.late_events,
            self.results_emitted,
            self.lines_dispatched,
            self.delivery_failures,
            if self.cancelled { " (cancelled)" } else { "" }
        )
    }
}
