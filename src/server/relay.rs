//! Raw record relay
//!
//! Forwards every decoded record, re-encoded as compact JSON, to all sinks. No
//! parsing or windowing happens here; this is the pass-through counterpart of
//! [`GearChangeJob`](crate::server::GearChangeJob).

use crate::config::GearshiftConfig;
use crate::datasink::SinkDispatcher;
use crate::datasource::{create_source, EventSource};
use crate::server::shutdown::ShutdownSignal;
use crate::server::JobError;
use log::{debug, error, info, warn};
use std::fmt;
use tokio::sync::broadcast::{self, error::RecvError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelaySummary {
    pub records_read: u64,
    pub malformed_records: u64,
    pub lines_dispatched: u64,
    pub delivery_failures: u64,
    pub cancelled: bool,
}

impl fmt::Display for RelaySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "read={} malformed={} dispatched={} failures={}{}",
            self.records_read,
            self.malformed_records,
            self.lines_dispatched,
            self.delivery_failures,
            if self.cancelled { " (cancelled)" } else { "" }
        )
    }
}

pub struct RelayJob;

impl RelayJob {
    /// Relay until the source is exhausted or a shutdown signal arrives.
    pub async fn run(
        mut source: Box<dyn EventSource>,
        mut dispatcher: SinkDispatcher,
        mut shutdown: broadcast::Receiver<ShutdownSignal>,
    ) -> Result<RelaySummary, JobError> {
        info!(
            "Starting relay: source={}, sinks={}",
            source.name(),
            dispatcher.sink_count()
        );
        let mut summary = RelaySummary::default();
        let mut shutdown_open = true;

        loop {
            // dropping an in-flight read on shutdown loses nothing we would still relay
            let batch = tokio::select! {
                batch = source.read() => batch,
                signal = shutdown.recv(), if shutdown_open => match signal {
                    Ok(_) | Err(RecvError::Lagged(_)) => {
                        summary.cancelled = true;
                        break;
                    }
                    Err(RecvError::Closed) => {
                        shutdown_open = false;
                        continue;
                    }
                },
            };

            let batch = match batch {
                Ok(Some(batch)) => batch,
                Ok(None) => {
                    debug!("Relay source {} exhausted", source.name());
                    break;
                }
                Err(e) => {
                    error!("Relay source {} failed: {}", source.name(), e);
                    dispatcher.finish().await;
                    return Err(e.into());
                }
            };

            summary.malformed_records += batch.malformed;
            for record in batch.records {
                summary.records_read += 1;
                let line = record.to_json().to_string();
                dispatcher.dispatch(&line).await;
            }
            if let Err(e) = source.commit().await {
                warn!("Failed to commit position for {}: {}", source.name(), e);
            }
        }

        let stats = dispatcher.finish().await;
        summary.lines_dispatched = stats.lines;
        summary.delivery_failures = stats.failures;
        info!("Relay finished: {}", summary);
        Ok(summary)
    }

    /// Build the configured source and sinks, then relay between them.
    pub async fn run_from_config(
        config: GearshiftConfig,
        shutdown: broadcast::Receiver<ShutdownSignal>,
    ) -> Result<RelaySummary, JobError> {
        config.validate()?;
        let source = create_source(&config.source, config.runtime.batch_size).await?;
        let dispatcher = SinkDispatcher::from_config(&config.sinks)?;
        Self::run(source, dispatcher, shutdown).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasink::MemorySink;
    use crate::datasource::JsonLinesFileSource;
    use crate::server::shutdown::ShutdownCoordinator;
    use std::io::Write;

    #[tokio::test]
    async fn test_relay_forwards_every_record() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"Car": 2, "telemetry": {{"Gear": "3.000000"}}}}"#).unwrap();
        writeln!(file, "garbage").unwrap();
        writeln!(file, r#"{{"Car": 5}}"#).unwrap();

        let source = JsonLinesFileSource::open(file.path(), 10).await.unwrap();
        let sink = MemorySink::new();
        let dispatcher = SinkDispatcher::new().with_sink(Box::new(sink.clone()));
        let coordinator = ShutdownCoordinator::new();

        let summary = RelayJob::run(Box::new(source), dispatcher, coordinator.subscribe())
            .await
            .unwrap();

        assert_eq!(
            sink.lines(),
            vec![
                r#"{"Car":2,"telemetry":{"Gear":"3.000000"}}"#,
                r#"{"Car":5}"#
            ]
        );
        assert_eq!(summary.records_read, 2);
        assert_eq!(summary.malformed_records, 1);
        assert_eq!(summary.lines_dispatched, 2);
        assert!(!summary.cancelled);
    }
}
