//! Gear Transition Reducer
//!
//! Pure fold that combines the accumulated per-key state with the next reading.
//!
//! The fold is **order-sensitive**: `merge` is neither commutative nor freely
//! associative, so readings for one key must be applied strictly in arrival order.
//! The job guarantees this by routing every key to exactly one shard worker over a
//! FIFO channel (see `server::job`).

use crate::execution::parser::TelemetryEvent;

/// Per-key accumulation state inside one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccumulatorState {
    pub key: String,
    pub last_gear: i64,
    pub transition_count: u64,
}

impl AccumulatorState {
    /// Seed state from the first reading of a window. The first reading never counts.
    pub fn seed(event: &TelemetryEvent) -> Self {
        Self {
            key: event.key.clone(),
            last_gear: event.gear,
            transition_count: 0,
        }
    }
}

/// Fold one reading into the accumulated state, producing the next state.
///
/// `transition_count` increments exactly when the gear differs from `last_gear`;
/// `last_gear` always becomes the incoming gear.
#[must_use]
pub fn merge(accumulated: &AccumulatorState, incoming: &TelemetryEvent) -> AccumulatorState {
    let transition_count = if incoming.gear != accumulated.last_gear {
        accumulated.transition_count.saturating_add(1)
    } else {
        accumulated.transition_count
    };

    AccumulatorState {
        key: incoming.key.clone(),
        last_gear: incoming.gear,
        transition_count,
    }
}

/// Sequentially fold a run of gear readings for one key.
///
/// Returns `None` for an empty run.
pub fn fold_readings(key: &str, gears: &[i64]) -> Option<AccumulatorState> {
    let (first, rest) = gears.split_first()?;
    let seed = AccumulatorState::seed(&TelemetryEvent::new(key, *first, 0));
    Some(rest.iter().fold(seed, |acc, gear| {
        merge(&acc, &TelemetryEvent::new(key, *gear, 0))
    }))
}
