use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::recorder::{CountersSnapshot, LinkState};
use crate::kernel::time::Millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BusStatus {
    pub connection: ConnectionState,
    pub uptime: Duration,
    /// Messages per second over the recent window.
    pub message_rate: f64,
    pub error_count: u64,
    pub messages_total: u64,
}

impl BusStatus {
    pub fn connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }
}

/// Pure status derivation over ingest counters.
#[derive(Debug, Clone, Copy)]
pub struct StatusAggregator {
    pub disconnect_threshold: Duration,
}

impl StatusAggregator {
    pub fn new(disconnect_threshold: Duration) -> Self {
        Self { disconnect_threshold }
    }

    /// Connection state is evaluated lazily here; there is no timer flipping it.
    /// `Disconnected` until the first message, `Connected` while the last message is
    /// younger than the threshold, back to `Disconnected` otherwise or when the link
    /// went down.
    pub fn connection(&self, counters: &CountersSnapshot, now: Millis) -> ConnectionState {
        if counters.link == LinkState::Down {
            return ConnectionState::Disconnected;
        }
        match counters.last_message_at {
            Some(last) if now.since(last) < self.disconnect_threshold => ConnectionState::Connected,
            _ => ConnectionState::Disconnected,
        }
    }

    pub fn evaluate(&self, counters: &CountersSnapshot, now: Millis) -> BusStatus {
        let uptime = now.since(counters.started_at);
        BusStatus {
            connection: self.connection(counters, now),
            uptime,
            message_rate: compute_rate(counters, now, uptime),
            error_count: counters.errors_total,
            messages_total: counters.messages_total,
        }
    }
}

/// Windowed rate over the span the buckets really cover. While the process is younger
/// than that span, divide by uptime so the first seconds are not under-reported.
fn compute_rate(counters: &CountersSnapshot, now: Millis, uptime: Duration) -> f64 {
    let span = counters.window.span(now).min(uptime);
    if span.is_zero() {
        return 0.0;
    }
    counters.window.count(now) as f64 / span.as_secs_f64()
}
