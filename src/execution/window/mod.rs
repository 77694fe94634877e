//! Tumbling window processing
//!
//! - [`tumbling`]: half-open window assignment
//! - [`aggregator`]: per-key buckets folded with the transition reducer
//! - [`watermark`]: monotonic event-time progress used to close windows

pub mod aggregator;
pub mod tumbling;
pub mod watermark;

pub use aggregator::{AddOutcome, AggregatorStats, WindowAggregator};
pub use tumbling::{TumblingWindowAssigner, WindowKey};
pub use watermark::{WatermarkConfig, WatermarkTracker};
