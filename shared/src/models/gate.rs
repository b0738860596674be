//! Debounce policy for regenerating crop recommendations

use serde::{Deserialize, Serialize};

/// Default number of new readings between recommendation refreshes
pub const DEFAULT_REFRESH_THRESHOLD: u32 = 15;

/// Decides when the expensive recommendation call may run again.
///
/// The first evaluation always fires. After that, the gate counts new sensor
/// readings and only fires once the count reaches the threshold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "state", content = "counter", rename_all = "snake_case")]
pub enum RefreshGate {
    #[default]
    AwaitingFirstFetch,
    Gated(u32),
}

impl RefreshGate {
    /// Count one newly observed sensor reading
    pub fn record_new_reading(&mut self) {
        if let RefreshGate::Gated(counter) = self {
            *counter = counter.saturating_add(1);
        }
    }

    /// Returns `true` and resets the counter when a refresh should run
    pub fn try_fire(&mut self, threshold: u32) -> bool {
        let fire = match *self {
            RefreshGate::AwaitingFirstFetch => true,
            RefreshGate::Gated(counter) => counter >= threshold,
        };
        if fire {
            *self = RefreshGate::Gated(0);
        }
        fire
    }

    pub fn counter(&self) -> u32 {
        match self {
            RefreshGate::AwaitingFirstFetch => 0,
            RefreshGate::Gated(counter) => *counter,
        }
    }
}
