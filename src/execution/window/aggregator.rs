//! Keyed Tumbling-Window Aggregator
//!
//! Buckets telemetry events by `(key, window)` and folds each bucket with the
//! gear transition reducer, strictly in the order events are added.
//!
//! ## Bucket lifecycle
//!
//! ```text
//! OPEN (accepting folds) ──watermark ≥ window_end──► CLOSED (emitted, discarded)
//! ```
//!
//! A closed window is never reopened: events that map to it afterwards are late
//! and are dropped without correcting the emitted result.

use crate::execution::emitter::{project, WindowResult};
use crate::execution::parser::TelemetryEvent;
use crate::execution::reducer::{merge, AccumulatorState};
use crate::execution::window::tumbling::TumblingWindowAssigner;
use log::debug;
use std::collections::{BTreeMap, HashMap};

/// What happened to an event handed to [`WindowAggregator::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// First event for its `(key, window)`; a new bucket was opened
    Opened,
    /// Folded into an existing open bucket
    Folded,
    /// Its window had already closed; the event was dropped
    Late,
}

/// Aggregator statistics for monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatorStats {
    /// Windows with at least one open bucket
    pub open_windows: usize,
    /// Open `(key, window)` buckets across all windows
    pub open_buckets: usize,
    /// Events accepted (opened or folded)
    pub events_folded: u64,
    /// Events dropped because their window was closed
    pub late_events: u64,
    /// Windows closed and emitted
    pub windows_closed: u64,
    /// Current watermark, if any
    pub watermark: Option<i64>,
}

/// Per-key tumbling-window state owned by a single worker.
///
/// The aggregator is not shared: whoever owns it is the single writer for every key
/// routed to it, which is what keeps the order-sensitive fold correct.
#[derive(Debug)]
pub struct WindowAggregator {
    assigner: TumblingWindowAssigner,

    /// Open buckets keyed by window start, then by key
    windows: BTreeMap<i64, HashMap<String, AccumulatorState>>,

    /// Every window ending at or before this is closed
    watermark: Option<i64>,

    events_folded: u64,
    late_events: u64,
    windows_closed: u64,
}

impl WindowAggregator {
    pub fn new(window_size_ms: i64) -> Self {
        Self::with_assigner(TumblingWindowAssigner::new(window_size_ms))
    }

    pub fn with_assigner(assigner: TumblingWindowAssigner) -> Self {
        Self {
            assigner,
            windows: BTreeMap::new(),
            watermark: None,
            events_folded: 0,
            late_events: 0,
            windows_closed: 0,
        }
    }

    pub fn assigner(&self) -> &TumblingWindowAssigner {
        &self.assigner
    }

    /// Route an event to its bucket and fold it in.
    pub fn add(&mut self, event: &TelemetryEvent) -> AddOutcome {
        let (window_start, window_end) = self.assigner.bounds(event.event_time);

        if self.is_closed(window_end) {
            self.late_events += 1;
            debug!(
                "Dropping late event for key '{}' at {} (window [{}, {}) already closed)",
                event.key, event.event_time, window_start, window_end
            );
            return AddOutcome::Late;
        }

        let bucket = self.windows.entry(window_start).or_default();
        self.events_folded += 1;
        match bucket.get_mut(&event.key) {
            Some(state) => {
                *state = merge(state, event);
                AddOutcome::Folded
            }
            None => {
                bucket.insert(event.key.clone(), AccumulatorState::seed(event));
                AddOutcome::Opened
            }
        }
    }

    /// Advance the watermark and close every window whose end is at or before it.
    ///
    /// Results come out in ascending window order, keys sorted within a window.
    /// A watermark that does not move forward closes nothing.
    pub fn advance_watermark(&mut self, watermark: i64) -> Vec<WindowResult> {
        if self.watermark.is_some_and(|current| watermark <= current) {
            return Vec::new();
        }
        self.watermark = Some(watermark);

        let mut results = Vec::new();
        while let Some(entry) = self.windows.first_entry() {
            let window_start = *entry.key();
            if self.assigner.window_end(window_start) > watermark {
                break;
            }
            let buckets = entry.remove();
            self.close_window(window_start, buckets, &mut results);
        }
        results
    }

    /// Close every open window, as if the watermark had reached the end of time.
    ///
    /// Used when a bounded input is exhausted.
    pub fn close_all(&mut self) -> Vec<WindowResult> {
        let mut results = Vec::new();
        let windows = std::mem::take(&mut self.windows);
        let mut last_end = None;
        for (window_start, buckets) in windows {
            last_end = Some(self.assigner.window_end(window_start));
            self.close_window(window_start, buckets, &mut results);
        }
        if let Some(end) = last_end {
            if self.watermark.map_or(true, |wm| end > wm) {
                self.watermark = Some(end);
            }
        }
        results
    }

    /// Drop all open buckets without emitting. Returns the number of buckets discarded.
    pub fn discard(&mut self) -> usize {
        let discarded = self.windows.values().map(HashMap::len).sum();
        self.windows.clear();
        discarded
    }

    pub fn watermark(&self) -> Option<i64> {
        self.watermark
    }

    pub fn stats(&self) -> AggregatorStats {
        AggregatorStats {
            open_windows: self.windows.len(),
            open_buckets: self.windows.values().map(HashMap::len).sum(),
            events_folded: self.events_folded,
            late_events: self.late_events,
            windows_closed: self.windows_closed,
            watermark: self.watermark,
        }
    }

    fn is_closed(&self, window_end: i64) -> bool {
        self.watermark.is_some_and(|wm| window_end <= wm)
    }

    fn close_window(
        &mut self,
        window_start: i64,
        buckets: HashMap<String, AccumulatorState>,
        results: &mut Vec<WindowResult>,
    ) {
        let window_end = self.assigner.window_end(window_start);
        let mut states: Vec<AccumulatorState> = buckets.into_values().collect();
        states.sort_by(|a, b| a.key.cmp(&b.key));

        debug!(
            "Closing window [{}, {}) with {} key(s)",
            window_start,
            window_end,
            states.len()
        );

        self.windows_closed += 1;
        results.extend(states.into_iter().map(|state| WindowResult {
            count: project(state),
            window_start,
            window_end,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(key: &str, gear: i64, t: i64) -> TelemetryEvent {
        TelemetryEvent::new(key, gear, t)
    }

    fn lines(results: &[WindowResult]) -> Vec<String> {
        results.iter().map(|r| r.count.to_string()).collect()
    }

    #[test]
    fn test_scenario_single_window() {
        let mut agg = WindowAggregator::new(3000);
        for (i, gear) in [3, 3, 4, 4, 5].into_iter().enumerate() {
            agg.add(&ev("9", gear, 100 + i as i64));
        }
        agg.add(&ev("4", 2, 500));

        let results = agg.advance_watermark(3000);
        assert_eq!(lines(&results), vec!["Car4 : 0", "Car9 : 2"]);
        assert!(results.iter().all(|r| r.window_start == 0 && r.window_end == 3000));
    }

    #[test]
    fn test_add_outcomes() {
        let mut agg = WindowAggregator::new(3000);
        assert_eq!(agg.add(&ev("1", 1, 0)), AddOutcome::Opened);
        assert_eq!(agg.add(&ev("1", 2, 10)), AddOutcome::Folded);
        assert_eq!(agg.add(&ev("2", 2, 10)), AddOutcome::Opened);
        assert_eq!(agg.add(&ev("1", 2, 3000)), AddOutcome::Opened);

        let stats = agg.stats();
        assert_eq!(stats.open_windows, 2);
        assert_eq!(stats.open_buckets, 3);
        assert_eq!(stats.events_folded, 4);
    }

    #[test]
    fn test_half_open_boundary_goes_to_next_window() {
        let mut agg = WindowAggregator::new(3000);
        agg.add(&ev("1", 1, 0));
        agg.add(&ev("1", 2, 3000));

        // The reading at exactly 3000 must not count as a transition in [0, 3000)
        let first = agg.advance_watermark(3000);
        assert_eq!(lines(&first), vec!["Car1 : 0"]);

        let second = agg.advance_watermark(6000);
        assert_eq!(lines(&second), vec!["Car1 : 0"]);
        assert_eq!(second[0].window_start, 3000);
    }

    #[test]
    fn test_no_state_carries_across_windows() {
        let mut agg = WindowAggregator::new(3000);
        agg.add(&ev("1", 1, 100));
        agg.add(&ev("1", 2, 3100));
        agg.add(&ev("1", 2, 3200));

        let results = agg.advance_watermark(6000);
        assert_eq!(lines(&results), vec!["Car1 : 0", "Car1 : 0"]);
    }

    #[test]
    fn test_keys_are_independent_when_interleaved() {
        let mut agg = WindowAggregator::new(3000);
        let events = [
            ev("A", 1, 1),
            ev("B", 5, 2),
            ev("A", 1, 3),
            ev("B", 6, 4),
            ev("A", 2, 5),
            ev("B", 6, 6),
        ];
        for e in &events {
            agg.add(e);
        }
        let results = agg.advance_watermark(3000);
        assert_eq!(lines(&results), vec!["CarA : 1", "CarB : 1"]);
    }

    #[test]
    fn test_zero_event_keys_produce_no_output() {
        let mut agg = WindowAggregator::new(3000);
        agg.add(&ev("1", 1, 100));
        agg.add(&ev("2", 1, 3100));

        let first = agg.advance_watermark(3000);
        assert_eq!(lines(&first), vec!["Car1 : 0"]);

        // window [6000, 9000) saw no events at all
        let later = agg.advance_watermark(9000);
        assert_eq!(lines(&later), vec!["Car2 : 0"]);
        assert!(agg.advance_watermark(12000).is_empty());
    }

    #[test]
    fn test_late_events_are_dropped() {
        let mut agg = WindowAggregator::new(3000);
        agg.add(&ev("1", 1, 100));
        let closed = agg.advance_watermark(3000);
        assert_eq!(closed.len(), 1);

        assert_eq!(agg.add(&ev("1", 2, 200)), AddOutcome::Late);
        assert_eq!(agg.stats().late_events, 1);
        assert_eq!(agg.stats().open_buckets, 0);

        // the current window still accepts events
        assert_eq!(agg.add(&ev("1", 2, 3000)), AddOutcome::Opened);
    }

    #[test]
    fn test_watermark_is_monotonic() {
        let mut agg = WindowAggregator::new(3000);
        agg.add(&ev("1", 1, 4000));
        assert!(agg.advance_watermark(5000).is_empty());
        assert_eq!(agg.watermark(), Some(5000));

        assert!(agg.advance_watermark(1000).is_empty());
        assert_eq!(agg.watermark(), Some(5000));

        assert_eq!(agg.advance_watermark(6000).len(), 1);
        assert_eq!(agg.stats().windows_closed, 1);
    }

    #[test]
    fn test_close_all_flushes_in_window_order() {
        let mut agg = WindowAggregator::new(3000);
        agg.add(&ev("1", 1, 7000));
        agg.add(&ev("1", 1, 100));
        agg.add(&ev("1", 2, 200));

        let results = agg.close_all();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].window_start, 0);
        assert_eq!(results[0].count.transition_count, 1);
        assert_eq!(results[1].window_start, 6000);

        assert_eq!(agg.add(&ev("1", 3, 8000)), AddOutcome::Late);
        assert_eq!(agg.add(&ev("1", 3, 9000)), AddOutcome::Opened);
    }

    #[test]
    fn test_discard_emits_nothing() {
        let mut agg = WindowAggregator::new(3000);
        agg.add(&ev("1", 1, 100));
        agg.add(&ev("2", 1, 100));
        agg.add(&ev("2", 1, 4000));

        assert_eq!(agg.discard(), 3);
        assert!(agg.close_all().is_empty());
        assert_eq!(agg.stats().windows_closed, 0);
    }
}
