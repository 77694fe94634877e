//! Event source abstraction
//!
//! A source hands the job batches of decoded [`StreamRecord`]s. Records whose
//! payload cannot be decoded are logged and counted by the source; they never
//! reach the parser and never stop the stream.

use super::SourceError;
use crate::execution::types::StreamRecord;
use async_trait::async_trait;

/// One read from a source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceBatch {
    pub records: Vec<StreamRecord>,
    /// Payloads skipped because they were not valid JSON objects
    pub malformed: u64,
}

impl SourceBatch {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.malformed == 0
    }
}

/// Core trait for record input sources.
#[async_trait]
pub trait EventSource: Send + 'static {
    /// Short description used in logs (e.g. `kafka:flink-demo`)
    fn name(&self) -> String;

    /// Read the next batch.
    ///
    /// Returns `Ok(None)` once a bounded source is exhausted. Unbounded sources may
    /// return an empty batch when nothing arrived within their poll timeout.
    async fn read(&mut self) -> Result<Option<SourceBatch>, SourceError>;

    /// Commit the current reading position (for sources that support it)
    async fn commit(&mut self) -> Result<(), SourceError> {
        Ok(())
    }
}
