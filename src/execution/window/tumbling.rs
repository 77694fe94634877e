//! Tumbling Window Assignment
//!
//! Non-overlapping fixed-size windows that advance by their full size.
//!
//! Example: 3-second tumbling windows
//! ```text
//! [0s-3s) [3s-6s) [6s-9s)
//! ```
//!
//! Intervals are half-open: an event at exactly `start + size` belongs to the next window.

/// Identifies one per-key, per-window accumulation bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowKey {
    pub key: String,
    pub window_start: i64,
    pub window_end: i64,
}

/// Assigns event timestamps to fixed-size tumbling windows.
///
/// Performance characteristics:
/// - O(1) assignment
/// - No buffered state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TumblingWindowAssigner {
    /// Window size in milliseconds
    window_size_ms: i64,
}

impl TumblingWindowAssigner {
    /// Create a new assigner.
    ///
    /// `window_size_ms` must be positive; configuration validation guarantees this
    /// before the job starts. Non-positive sizes are clamped to 1 ms.
    pub fn new(window_size_ms: i64) -> Self {
        Self {
            window_size_ms: window_size_ms.max(1),
        }
    }

    pub fn window_size_ms(&self) -> i64 {
        self.window_size_ms
    }

    /// Start of the window containing `timestamp`.
    ///
    /// Uses Euclidean division so negative timestamps align to the window below them.
    pub fn window_start(&self, timestamp: i64) -> i64 {
        timestamp
            .div_euclid(self.window_size_ms)
            .saturating_mul(self.window_size_ms)
    }

    /// Exclusive end of the window starting at `window_start`.
    pub fn window_end(&self, window_start: i64) -> i64 {
        window_start.saturating_add(self.window_size_ms)
    }

    /// `[start, end)` bounds of the window containing `timestamp`.
    pub fn bounds(&self, timestamp: i64) -> (i64, i64) {
        let start = self.window_start(timestamp);
        (start, self.window_end(start))
    }

    pub fn window_key(&self, key: &str, timestamp: i64) -> WindowKey {
        let (window_start, window_end) = self.bounds(timestamp);
        WindowKey {
            key: key.to_string(),
            window_start,
            window_end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tumbling_window_alignment() {
        let assigner = TumblingWindowAssigner::new(60000);

        // Record at timestamp 75000 should be in window [60000, 120000)
        assert_eq!(assigner.bounds(75000), (60000, 120000));
        assert_eq!(assigner.bounds(0), (0, 60000));
    }

    #[test]
    fn test_tumbling_window_half_open_boundary() {
        let assigner = TumblingWindowAssigner::new(3000);

        assert_eq!(assigner.window_start(2999), 0);
        assert_eq!(assigner.window_start(3000), 3000);
        assert_eq!(assigner.window_end(0), 3000);
    }

    #[test]
    fn test_tumbling_window_negative_timestamps() {
        let assigner = TumblingWindowAssigner::new(3000);

        assert_eq!(assigner.bounds(-1), (-3000, 0));
        assert_eq!(assigner.bounds(-3000), (-3000, 0));
        assert_eq!(assigner.bounds(-3001), (-6000, -3000));
    }

    #[test]
    fn test_window_key() {
        let assigner = TumblingWindowAssigner::new(3000);
        let key = assigner.window_key("9", 4500);
        assert_eq!(
            key,
            WindowKey {
                key: "9".to_string(),
                window_start: 3000,
                window_end: 6000,
            }
        );
    }
}
