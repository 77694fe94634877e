//! Event-Time Watermark Tracker
//!
//! Tracks the event-time watermark used to close tumbling windows.
//! The watermark only moves forward: it follows the highest event time observed,
//! minus an out-of-orderness allowance.

/// Configuration for watermark tracking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkConfig {
    /// Maximum expected out-of-orderness in milliseconds.
    /// The watermark trails the highest observed event time by this amount.
    pub max_out_of_orderness_ms: i64,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            max_out_of_orderness_ms: 0,
        }
    }
}

impl WatermarkConfig {
    pub fn with_out_of_orderness(max_out_of_orderness_ms: i64) -> Self {
        Self {
            max_out_of_orderness_ms: max_out_of_orderness_ms.max(0),
        }
    }
}

/// Monotonic watermark derived from observed event times.
#[derive(Debug)]
pub struct WatermarkTracker {
    config: WatermarkConfig,

    /// Current watermark; `None` until the first observation
    watermark: Option<i64>,

    /// Highest event time seen so far
    max_event_time: Option<i64>,

    /// Observations that arrived behind the watermark
    late_observations: u64,
}

impl WatermarkTracker {
    pub fn new() -> Self {
        Self::with_config(WatermarkConfig::default())
    }

    pub fn with_config(config: WatermarkConfig) -> Self {
        Self {
            config,
            watermark: None,
            max_event_time: None,
            late_observations: 0,
        }
    }

    /// Observe an event time and advance the watermark if it moved forward.
    ///
    /// Returns true if the event was at or ahead of the watermark before this observation.
    pub fn observe_event_time(&mut self, event_time: i64) -> bool {
        let on_time = self.watermark.map_or(true, |wm| event_time >= wm);
        if !on_time {
            self.late_observations += 1;
        }

        if self.max_event_time.map_or(true, |max| event_time > max) {
            self.max_event_time = Some(event_time);
            let candidate = event_time.saturating_sub(self.config.max_out_of_orderness_ms);
            self.set_watermark(candidate);
        }

        on_time
    }

    /// Explicitly set the watermark. Regressions are ignored.
    pub fn set_watermark(&mut self, watermark: i64) {
        if self.watermark.map_or(true, |current| watermark > current) {
            self.watermark = Some(watermark);
        }
    }

    pub fn watermark(&self) -> Option<i64> {
        self.watermark
    }

    pub fn max_event_time(&self) -> Option<i64> {
        self.max_event_time
    }

    pub fn late_observations(&self) -> u64 {
        self.late_observations
    }

    /// Check if an event time is behind the current watermark
    #[must_use]
    pub fn is_late(&self, event_time: i64) -> bool {
        self.watermark.is_some_and(|wm| event_time < wm)
    }
}

impl Default for WatermarkTracker {
    fn default() -> Self {
        Self::new()
    }
}
