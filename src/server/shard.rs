//! Shard workers
//!
//! Every key is routed to exactly one shard, and each shard owns its own
//! [`WindowAggregator`]. The router feeds a shard over a FIFO channel, so events for
//! one key are folded in the order they were read.

use crate::execution::emitter::WindowResult;
use crate::execution::parser::TelemetryEvent;
use crate::execution::window::{AddOutcome, WindowAggregator};
use log::{debug, warn};
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};
use tokio::sync::mpsc;

/// Control and data messages consumed by a shard.
#[derive(Debug, Clone, PartialEq)]
pub enum ShardMessage {
    /// Fold one event into its bucket
    Event(TelemetryEvent),
    /// Close every window ending at or before this timestamp
    Watermark(i64),
    /// Input is exhausted: close and emit every open window, then stop
    Finish,
    /// Job is cancelled: drop open windows without emitting, then stop
    Cancel,
}

/// What a shard did over its lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardReport {
    pub shard_id: usize,
    pub events_folded: u64,
    pub late_events: u64,
    pub windows_closed: u64,
    pub results_emitted: u64,
    /// Buckets dropped by cancellation
    pub discarded_buckets: usize,
}

/// Pick the shard for a key. FxHash is unkeyed, so a key lands on the same shard in
/// every process.
pub fn shard_for_key(key: &str, shard_count: usize) -> usize {
    if shard_count <= 1 {
        return 0;
    }
    let mut hasher = FxHasher::default();
    key.hash(&mut hasher);
    (hasher.finish() % shard_count as u64) as usize
}

pub struct ShardWorker {
    id: usize,
    aggregator: WindowAggregator,
    input: mpsc::Receiver<ShardMessage>,
    results: mpsc::Sender<WindowResult>,
    results_emitted: u64,
}

impl ShardWorker {
    pub fn new(
        id: usize,
        window_size_ms: i64,
        input: mpsc::Receiver<ShardMessage>,
        results: mpsc::Sender<WindowResult>,
    ) -> Self {
        Self {
            id,
            aggregator: WindowAggregator::new(window_size_ms),
            input,
            results,
            results_emitted: 0,
        }
    }

    /// Process messages until `Finish`, `Cancel` or the input channel closes.
    ///
    /// A closed input without `Finish` is treated like a cancellation.
    pub async fn run(mut self) -> ShardReport {
        let mut discarded_buckets = 0;

        loop {
            match self.input.recv().await {
                Some(ShardMessage::Event(event)) => {
                    if self.aggregator.add(&event) == AddOutcome::Late {
                        debug!("Shard {} dropped late event for '{}'", self.id, event.key);
                    }
                }
                Some(ShardMessage::Watermark(watermark)) => {
                    let closed = self.aggregator.advance_watermark(watermark);
                    if !self.emit(closed).await {
                        break;
                    }
                }
                Some(ShardMessage::Finish) => {
                    let closed = self.aggregator.close_all();
                    self.emit(closed).await;
                    break;
                }
                Some(ShardMessage::Cancel) => {
                    discarded_buckets = self.aggregator.discard();
                    break;
                }
                None => {
                    discarded_buckets = self.aggregator.discard();
                    debug!("Shard {} input closed without finish", self.id);
                    break;
                }
            }
        }

        if discarded_buckets > 0 {
            debug!(
                "Shard {} discarded {} open bucket(s)",
                self.id, discarded_buckets
            );
        }

        let stats = self.aggregator.stats();
        ShardReport {
            shard_id: self.id,
            events_folded: stats.events_folded,
            late_events: stats.late_events,
            windows_closed: stats.windows_closed,
            results_emitted: self.results_emitted,
            discarded_buckets,
        }
    }

    /// Forward closed windows to the dispatcher. Returns false once the results
    /// channel is gone.
    async fn emit(&mut self, results: Vec<WindowResult>) -> bool {
        for result in results {
            if self.results.send(result).await.is_err() {
                warn!("Shard {} results channel closed", self.id);
                return false;
            }
            self.results_emitted += 1;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_worker(
        window_size_ms: i64,
    ) -> (
        mpsc::Sender<ShardMessage>,
        mpsc::Receiver<WindowResult>,
        tokio::task::JoinHandle<ShardReport>,
    ) {
        let (input_tx, input_rx) = mpsc::channel(16);
        let (results_tx, results_rx) = mpsc::channel(16);
        let handle = tokio::spawn(ShardWorker::new(0, window_size_ms, input_rx, results_tx).run());
        (input_tx, results_rx, handle)
    }

    #[test]
    fn test_shard_for_key_is_stable_and_in_range() {
        for key in ["1", "9", "Car4", ""] {
            let shard = shard_for_key(key, 4);
            assert!(shard < 4);
            assert_eq!(shard, shard_for_key(key, 4));
        }
        assert_eq!(shard_for_key("anything", 1), 0);
        assert_eq!(shard_for_key("anything", 0), 0);
    }

    #[test]
    fn test_shard_for_key_uses_unkeyed_fx_hash() {
        for key in ["1", "4", "Car9"] {
            let mut hasher = FxHasher::default();
            key.hash(&mut hasher);
            assert_eq!(shard_for_key(key, 7), (hasher.finish() % 7) as usize);
        }
    }

    #[tokio::test]
    async fn test_watermark_closes_window() {
        let (tx, mut results, handle) = spawn_worker(3000);

        for (gear, t) in [(3, 0), (3, 500), (4, 1000), (4, 1500), (5, 2000)] {
            tx.send(ShardMessage::Event(TelemetryEvent::new("9", gear, t)))
                .await
                .unwrap();
        }
        tx.send(ShardMessage::Watermark(3000)).await.unwrap();

        let result = results.recv().await.unwrap();
        assert_eq!(result.count.to_string(), "Car9 : 2");
        assert_eq!((result.window_start, result.window_end), (0, 3000));

        tx.send(ShardMessage::Finish).await.unwrap();
        let report = handle.await.unwrap();
        assert_eq!(report.events_folded, 5);
        assert_eq!(report.results_emitted, 1);
    }

    #[tokio::test]
    async fn test_finish_emits_open_windows() {
        let (tx, mut results, handle) = spawn_worker(3000);
        tx.send(ShardMessage::Event(TelemetryEvent::new("4", 2, 100)))
            .await
            .unwrap();
        tx.send(ShardMessage::Finish).await.unwrap();

        let report = handle.await.unwrap();
        let result = results.recv().await.unwrap();
        assert_eq!(result.count.to_string(), "Car4 : 0");
        assert_eq!(report.results_emitted, 1);
        assert_eq!(report.discarded_buckets, 0);
    }

    #[tokio::test]
    async fn test_cancel_discards_without_emitting() {
        let (tx, mut results, handle) = spawn_worker(3000);
        tx.send(ShardMessage::Event(TelemetryEvent::new("4", 2, 100)))
            .await
            .unwrap();
        tx.send(ShardMessage::Event(TelemetryEvent::new("5", 1, 100)))
            .await
            .unwrap();
        tx.send(ShardMessage::Cancel).await.unwrap();

        let report = handle.await.unwrap();
        assert_eq!(report.discarded_buckets, 2);
        assert_eq!(report.results_emitted, 0);
        assert!(results.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_closed_input_discards() {
        let (tx, mut results, handle) = spawn_worker(3000);
        tx.send(ShardMessage::Event(TelemetryEvent::new("4", 2, 100)))
            .await
            .unwrap();
        drop(tx);

        let report = handle.await.unwrap();
        assert_eq!(report.discarded_buckets, 1);
        assert!(results.recv().await.is_none());
    }
}
