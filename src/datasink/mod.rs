//! Result sinks
//!
//! Formatted lines are handed to a [`SinkDispatcher`], which fans them out to every
//! configured [`LineSink`]. Dispatch is fire-and-forget: a failed delivery is logged
//! and counted, never retried, and never stops the job.

pub mod console;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;

pub use console::ConsoleSink;
#[cfg(feature = "kafka")]
pub use kafka::KafkaSink;
pub use memory::MemorySink;

use crate::config::SinkConfig;
use async_trait::async_trait;
use log::{debug, error};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[cfg(feature = "kafka")]
    #[error("Kafka sink error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Sink IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sink '{0}' is not available in this build")]
    Unavailable(String),
}

/// Destination for formatted output lines.
#[async_trait]
pub trait LineSink: Send + 'static {
    fn name(&self) -> String;

    async fn deliver(&mut self, line: &str) -> Result<(), SinkError>;

    async fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Delivery counters reported when a dispatcher is finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Lines handed to the dispatcher
    pub lines: u64,
    /// Individual sink deliveries that failed
    pub failures: u64,
}

/// Fans lines out to every sink.
pub struct SinkDispatcher {
    sinks: Vec<Box<dyn LineSink>>,
    stats: DispatchStats,
}

impl SinkDispatcher {
    pub fn new() -> Self {
        Self {
            sinks: Vec::new(),
            stats: DispatchStats::default(),
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn LineSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Build sinks from configuration.
    pub fn from_config(configs: &[SinkConfig]) -> Result<Self, SinkError> {
        let mut dispatcher = Self::new();
        for config in configs {
            let sink: Box<dyn LineSink> = match config {
                SinkConfig::Console => Box::new(ConsoleSink::new()),
                #[cfg(feature = "kafka")]
                SinkConfig::Kafka { brokers, topic } => Box::new(KafkaSink::new(brokers, topic)?),
                #[cfg(not(feature = "kafka"))]
                SinkConfig::Kafka { topic, .. } => {
                    return Err(SinkError::Unavailable(format!("kafka:{}", topic)))
                }
            };
            debug!("Registered sink {}", sink.name());
            dispatcher.sinks.push(sink);
        }
        Ok(dispatcher)
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Deliver one line to every sink.
    pub async fn dispatch(&mut self, line: &str) {
        self.stats.lines += 1;
        for sink in self.sinks.iter_mut() {
            if let Err(e) = sink.deliver(line).await {
                self.stats.failures += 1;
                error!("Failed to deliver to sink {}: {}", sink.name(), e);
            }
        }
    }

    /// Flush every sink, logging failures, and return the final counters.
    pub async fn finish(mut self) -> DispatchStats {
        for sink in self.sinks.iter_mut() {
            if let Err(e) = sink.flush().await {
                error!("Failed to flush sink {}: {}", sink.name(), e);
            }
        }
        self.stats
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }
}

impl Default for SinkDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
