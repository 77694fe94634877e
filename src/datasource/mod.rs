//! Record sources
//!
//! - [`file::JsonLinesFileSource`]: newline-delimited JSON file (bounded)
//! - [`kafka::KafkaJsonSource`]: JSON messages from a Kafka topic (unbounded, `kafka` feature)

pub mod file;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod traits;

pub use file::JsonLinesFileSource;
#[cfg(feature = "kafka")]
pub use kafka::KafkaJsonSource;
pub use traits::{EventSource, SourceBatch};

use crate::config::SourceConfig;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    /// Kafka client error
    #[cfg(feature = "kafka")]
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source type not compiled into this build
    #[error("Source '{0}' is not available in this build")]
    Unavailable(String),
}

/// Build the configured source.
pub async fn create_source(
    config: &SourceConfig,
    batch_size: usize,
) -> Result<Box<dyn EventSource>, SourceError> {
    match config {
        SourceConfig::File { path } => {
            Ok(Box::new(JsonLinesFileSource::open(path, batch_size).await?))
        }
        #[cfg(feature = "kafka")]
        SourceConfig::Kafka {
            brokers,
            topic,
            group_id,
        } => Ok(Box::new(KafkaJsonSource::new(
            brokers, topic, group_id, batch_size,
        )?)),
        #[cfg(not(feature = "kafka"))]
        SourceConfig::Kafka { topic, .. } => Err(SourceError::Unavailable(format!("kafka:{}", topic))),
    }
}
