//! Result projection and line formatting.

use crate::execution::reducer::AccumulatorState;
use std::fmt;

/// Final per-key, per-window output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GearChangeCount {
    pub key: String,
    pub transition_count: u64,
}

impl fmt::Display for GearChangeCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Car{} : {}", self.key, self.transition_count)
    }
}

/// A closed window's output for one key, with the window bounds kept for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowResult {
    pub count: GearChangeCount,
    pub window_start: i64,
    pub window_end: i64,
}

/// Drop `last_gear` and keep `(key, transition_count)`.
pub fn project(state: AccumulatorState) -> GearChangeCount {
    GearChangeCount {
        key: state.key,
        transition_count: state.transition_count,
    }
}

/// Display line for one result: `Car<key> : <count>`.
pub fn format_line(count: &GearChangeCount) -> String {
    count.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_discards_last_gear() {
        let state = AccumulatorState {
            key: "9".to_string(),
            last_gear: 5,
            transition_count: 2,
        };
        assert_eq!(
            project(state),
            GearChangeCount {
                key: "9".to_string(),
                transition_count: 2
            }
        );
    }

    #[test]
    fn test_format_line() {
        let count = GearChangeCount {
            key: "9".to_string(),
            transition_count: 2,
        };
        assert_eq!(format_line(&count), "Car9 : 2");

        let zero = GearChangeCount {
            key: "4".to_string(),
            transition_count: 0,
        };
        assert_eq!(format_line(&zero), "Car4 : 0");
    }
}
