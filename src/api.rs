//! Wire contract shared by the snapshot server and the poll client.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::kernel::buffer::Snapshot;
use crate::kernel::telemetry::BusStatus;
use crate::kernel::time::Clock;

/// The read operations exposed to the display. Routing is by this enum on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Latest,
    Status,
}

impl Endpoint {
    pub const ALL: [Endpoint; 2] = [Endpoint::Latest, Endpoint::Status];

    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Latest => "/api/v1/can/latest",
            Endpoint::Status => "/api/v1/can/status",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEntry {
    pub value: f64,
    pub unit: String,
    /// Epoch milliseconds of the last update.
    pub timestamp: u64,
    pub is_stale: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestResponse {
    /// Epoch milliseconds the snapshot was evaluated at.
    pub timestamp: u64,
    pub messages: BTreeMap<String, SignalEntry>,
}

impl LatestResponse {
    pub fn from_snapshot(snapshot: &Snapshot, clock: &Clock) -> Self {
        let messages = snapshot
            .signals
            .iter()
            .map(|(id, view)| {
                (
                    id.clone(),
                    SignalEntry {
                        value: view.record.value,
                        unit: view.record.unit.clone(),
                        timestamp: clock.to_epoch_ms(view.record.observed_at),
                        is_stale: view.is_stale,
                    },
                )
            })
            .collect();
        Self {
            timestamp: clock.to_epoch_ms(snapshot.taken_at),
            messages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub connected: bool,
    /// Seconds since the service started.
    pub uptime: f64,
    /// Messages per second.
    pub message_rate: f64,
    pub error_count: u64,
}

impl From<&BusStatus> for StatusResponse {
    fn from(status: &BusStatus) -> Self {
        Self {
            connected: status.connected(),
            uptime: status.uptime.as_secs_f64(),
            message_rate: status.message_rate,
            error_count: status.error_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
