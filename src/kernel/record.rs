use serde::{Deserialize, Serialize};

use super::time::Millis;

/// Latest observation of one signal.
///
/// `value`, `unit` and `observed_at` are only ever written together under the buffer
/// lock, so a reader holding a `SignalRecord` always sees one coherent update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub signal_id: String,
    pub value: f64,
    pub unit: String,
    pub observed_at: Millis,
}

impl SignalRecord {
    pub fn new(signal_id: &str, value: f64, unit: &str, observed_at: Millis) -> Self {
        Self {
            signal_id: signal_id.to_string(),
            value,
            unit: unit.to_string(),
            observed_at,
        }
    }
}

/// A record as seen by a reader at a particular `now`.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalView {
    pub record: SignalRecord,
    pub is_stale: bool,
}
