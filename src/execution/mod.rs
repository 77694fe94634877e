//! Gear transition counting core
//!
//! Data flow:
//! ```text
//! StreamRecord ─► TelemetryParser ─► TelemetryEvent ─► WindowAggregator (merge per key)
//!              ─► WindowResult on close ─► format_line ─► sinks
//! ```

pub mod emitter;
pub mod parser;
pub mod reducer;
pub mod types;
pub mod window;

pub use emitter::{format_line, project, GearChangeCount, WindowResult};
pub use parser::{ParseError, TelemetryEvent, TelemetryParser};
pub use reducer::{fold_readings, merge, AccumulatorState};
pub use types::{FieldValue, StreamRecord};
pub use window::{AddOutcome, WindowAggregator};
