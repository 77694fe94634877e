//! Gear change counting job
//!
//! ```text
//! reader task ──batches──► router ──ShardMessage──► shard workers ──WindowResult──► dispatcher task
//! ```
//!
//! The reader owns the source so that a slow `read` never blocks watermark ticks or
//! shutdown handling in the router. The router parses records, hashes each key to a
//! shard and drives the watermark. When the input is exhausted every shard flushes its
//! open windows; on shutdown they are discarded instead.

use crate::config::{GearshiftConfig, WindowClock};
use crate::datasink::{DispatchStats, SinkDispatcher};
use crate::datasource::{create_source, EventSource, SourceBatch, SourceError};
use crate::execution::emitter::{format_line, WindowResult};
use crate::execution::parser::TelemetryParser;
use crate::execution::types::current_time_millis;
use crate::execution::window::{TumblingWindowAssigner, WatermarkConfig, WatermarkTracker};
use crate::server::shard::{shard_for_key, ShardMessage, ShardWorker};
use crate::server::shutdown::ShutdownSignal;
use crate::server::{JobError, JobSummary};
use futures::future::join_all;
use log::{debug, error, info, warn};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

/// Batches buffered between the reader task and the router
const READ_AHEAD_BATCHES: usize = 4;

/// How intake ended.
#[derive(Debug)]
enum Intake {
    Exhausted,
    Cancelled,
    Failed(SourceError),
}

pub struct GearChangeJob {
    config: GearshiftConfig,
    parser: TelemetryParser,
}

impl GearChangeJob {
    /// Create a job. Invalid configuration is rejected before anything starts.
    pub fn new(config: GearshiftConfig) -> Result<Self, JobError> {
        config.validate()?;

        let mut fields = config.fields.clone();
        if config.window.clock == WindowClock::ProcessingTime && fields.event_time.is_some() {
            warn!(
                "Ignoring event time field '{}' under the processing_time clock",
                fields.event_time.as_deref().unwrap_or_default()
            );
            fields.event_time = None;
        }

        Ok(Self {
            parser: TelemetryParser::from_config(&fields),
            config,
        })
    }

    pub fn config(&self) -> &GearshiftConfig {
        &self.config
    }

    /// Run until the source is exhausted, a shutdown signal arrives or the source fails.
    pub async fn run(
        &self,
        source: Box<dyn EventSource>,
        dispatcher: SinkDispatcher,
        mut shutdown: broadcast::Receiver<ShutdownSignal>,
    ) -> Result<JobSummary, JobError> {
        let runtime = &self.config.runtime;
        let window_size_ms = self.config.window_size_ms();
        info!(
            "Starting gear change job: source={}, window={}ms, clock={}, shards={}, sinks={}",
            source.name(),
            window_size_ms,
            self.config.window.clock,
            runtime.shards,
            dispatcher.sink_count()
        );

        let (results_tx, results_rx) = mpsc::channel(runtime.channel_capacity);
        let dispatch_handle = tokio::spawn(dispatch_results(results_rx, dispatcher));

        let mut shard_senders = Vec::with_capacity(runtime.shards);
        let mut shard_handles = Vec::with_capacity(runtime.shards);
        for id in 0..runtime.shards {
            let (tx, rx) = mpsc::channel(runtime.channel_capacity);
            let worker = ShardWorker::new(id, window_size_ms, rx, results_tx.clone());
            shard_handles.push(tokio::spawn(worker.run()));
            shard_senders.push(tx);
        }
        drop(results_tx);

        let (batch_tx, mut batch_rx) = mpsc::channel(READ_AHEAD_BATCHES);
        let reader_handle = tokio::spawn(read_source(source, batch_tx));

        let mut router = Router::new(&self.config, &self.parser, shard_senders);
        let intake = router.run(&mut batch_rx, &mut shutdown).await;
        reader_handle.abort();
        let intake = intake?;

        let last = match intake {
            Intake::Exhausted => ShardMessage::Finish,
            Intake::Cancelled | Intake::Failed(_) => ShardMessage::Cancel,
        };
        router.broadcast(last).await?;
        let mut summary = router.into_summary();

        for joined in join_all(shard_handles).await {
            let report =
                joined.map_err(|e| JobError::Task(format!("shard worker failed: {}", e)))?;
            debug!("Shard report: {:?}", report);
            summary.late_events += report.late_events;
            summary.results_emitted += report.results_emitted;
        }

        let stats = dispatch_handle
            .await
            .map_err(|e| JobError::Task(format!("dispatcher failed: {}", e)))?;
        summary.lines_dispatched = stats.lines;
        summary.delivery_failures = stats.failures;

        match intake {
            Intake::Failed(e) => {
                error!("Gear change job stopped on source error: {}", e);
                return Err(e.into());
            }
            Intake::Cancelled => summary.cancelled = true,
            Intake::Exhausted => {}
        }

        info!("Gear change job finished: {}", summary);
        Ok(summary)
    }
}

/// Build the configured source and sinks, then run a job over them.
pub async fn run_from_config(
    config: GearshiftConfig,
    shutdown: broadcast::Receiver<ShutdownSignal>,
) -> Result<JobSummary, JobError> {
    let job = GearChangeJob::new(config)?;
    let source = create_source(&job.config.source, job.config.runtime.batch_size).await?;
    let dispatcher = SinkDispatcher::from_config(&job.config.sinks)?;
    job.run(source, dispatcher, shutdown).await
}

/// Parses records, assigns shards and drives the watermark.
struct Router<'a> {
    parser: &'a TelemetryParser,
    assigner: TumblingWindowAssigner,
    clock: WindowClock,
    tick_interval: Duration,
    shards: Vec<mpsc::Sender<ShardMessage>>,
    tracker: WatermarkTracker,
    /// End of the latest window already closed by a broadcast watermark
    closed_through: Option<i64>,
    /// Wall clock in epoch millis at `started`; stamps advance with the runtime clock from there
    wall_start: i64,
    started: Instant,
    /// Last processing-time stamp handed out; stamps never go backwards
    last_stamp: i64,
    summary: JobSummary,
}

impl<'a> Router<'a> {
    fn new(
        config: &GearshiftConfig,
        parser: &'a TelemetryParser,
        shards: Vec<mpsc::Sender<ShardMessage>>,
    ) -> Self {
        Self {
            parser,
            assigner: TumblingWindowAssigner::new(config.window_size_ms()),
            clock: config.window.clock,
            tick_interval: Duration::from_millis(config.window.tick_interval_ms),
            shards,
            tracker: WatermarkTracker::with_config(WatermarkConfig::with_out_of_orderness(
                config.window.max_out_of_orderness_ms,
            )),
            closed_through: None,
            wall_start: current_time_millis(),
            started: Instant::now(),
            last_stamp: i64::MIN,
            summary: JobSummary::default(),
        }
    }

    async fn run(
        &mut self,
        batches: &mut mpsc::Receiver<Result<SourceBatch, SourceError>>,
        shutdown: &mut broadcast::Receiver<ShutdownSignal>,
    ) -> Result<Intake, JobError> {
        let processing_time = self.clock == WindowClock::ProcessingTime;
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut shutdown_open = true;

        loop {
            tokio::select! {
                batch = batches.recv() => match batch {
                    Some(Ok(batch)) => self.route_batch(batch).await?,
                    Some(Err(e)) => return Ok(Intake::Failed(e)),
                    None => {
                        info!("Input exhausted; closing all open windows");
                        return Ok(Intake::Exhausted);
                    }
                },
                _ = ticker.tick(), if processing_time => {
                    let now = self.stamp();
                    self.broadcast(ShardMessage::Watermark(now)).await?;
                }
                signal = shutdown.recv(), if shutdown_open => match signal {
                    Ok(signal) => {
                        info!("Shutdown requested by {}; discarding open windows", signal);
                        return Ok(Intake::Cancelled);
                    }
                    Err(RecvError::Lagged(_)) => {
                        info!("Shutdown requested; discarding open windows");
                        return Ok(Intake::Cancelled);
                    }
                    Err(RecvError::Closed) => {
                        debug!("Shutdown channel closed; running until input ends");
                        shutdown_open = false;
                    }
                },
            }
        }
    }

    async fn route_batch(&mut self, batch: SourceBatch) -> Result<(), JobError> {
        self.summary.malformed_records += batch.malformed;

        for mut record in batch.records {
            self.summary.records_read += 1;
            if self.clock == WindowClock::ProcessingTime {
                record.timestamp = self.stamp();
            }

            let event = match self.parser.parse(&record) {
                Ok(event) => event,
                Err(e) => {
                    self.summary.dropped_records += 1;
                    warn!(
                        "Dropping record at {}/{}: {}",
                        record.partition, record.offset, e
                    );
                    continue;
                }
            };
            self.summary.events_parsed += 1;

            let event_time = event.event_time;
            let shard = shard_for_key(&event.key, self.shards.len());
            self.send(shard, ShardMessage::Event(event)).await?;

            if self.clock == WindowClock::EventTime {
                if let Some(watermark) = self.observe(event_time) {
                    self.broadcast(ShardMessage::Watermark(watermark)).await?;
                }
            }
        }
        Ok(())
    }

    /// Track event time. Returns a watermark worth broadcasting, which is one that
    /// crosses at least one more window end than the last broadcast did.
    fn observe(&mut self, event_time: i64) -> Option<i64> {
        if !self.tracker.observe_event_time(event_time) {
            debug!("Event at {} is behind the watermark", event_time);
        }
        let watermark = self.tracker.watermark()?;
        let closes_through = self.assigner.window_start(watermark);
        if self.closed_through.is_some_and(|end| closes_through <= end) {
            return None;
        }
        self.closed_through = Some(closes_through);
        Some(watermark)
    }

    fn stamp(&mut self) -> i64 {
        let elapsed = i64::try_from(self.started.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.last_stamp = self
            .wall_start
            .saturating_add(elapsed)
            .max(self.last_stamp);
        self.last_stamp
    }

    async fn send(&self, shard: usize, message: ShardMessage) -> Result<(), JobError> {
        self.shards[shard]
            .send(message)
            .await
            .map_err(|_| JobError::Task(format!("shard {} stopped unexpectedly", shard)))
    }

    async fn broadcast(&self, message: ShardMessage) -> Result<(), JobError> {
        for shard in 0..self.shards.len() {
            self.send(shard, message.clone()).await?;
        }
        Ok(())
    }

    fn into_summary(self) -> JobSummary {
        self.summary
    }
}

/// Pull batches until the source ends, fails or the router stops listening.
async fn read_source(
    mut source: Box<dyn EventSource>,
    batches: mpsc::Sender<Result<SourceBatch, SourceError>>,
) {
    let name = source.name();
    loop {
        match source.read().await {
            Ok(Some(batch)) => {
                if batch.is_empty() {
                    continue;
                }
                if batches.send(Ok(batch)).await.is_err() {
                    break;
                }
                if let Err(e) = source.commit().await {
                    warn!("Failed to commit position for {}: {}", name, e);
                }
            }
            Ok(None) => {
                debug!("Source {} exhausted", name);
                break;
            }
            Err(e) => {
                error!("Source {} failed: {}", name, e);
                let _ = batches.send(Err(e)).await;
                break;
            }
        }
    }
}

async fn dispatch_results(
    mut results: mpsc::Receiver<WindowResult>,
    mut dispatcher: SinkDispatcher,
) -> DispatchStats {
    while let Some(result) = results.recv().await {
        let line = format_line(&result.count);
        debug!(
            "Window [{}, {}) closed: {}",
            result.window_start, result.window_end, line
        );
        dispatcher.dispatch(&line).await;
    }
    dispatcher.finish().await
}
