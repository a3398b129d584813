use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::{interval, Interval, MissedTickBehavior};

use super::catalog::{default_specs, SignalSpec};
use super::frame::{BusError, BusFrame};
use super::source::BusSource;

/// Synthetic vehicle: one frame per dashboard signal every `period`, packed as raw
/// bytes so the normal decode path is exercised.
pub struct SimulatedVehicle {
    specs: Vec<SignalSpec>,
    cadence: Interval,
    pending: VecDeque<BusFrame>,
    round: u64,
    dropout_after: Option<u64>,
}

impl SimulatedVehicle {
    pub fn new(period: Duration) -> Self {
        let mut cadence = interval(period);
        cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            specs: default_specs(),
            cadence,
            pending: VecDeque::new(),
            round: 0,
            dropout_after: None,
        }
    }

    /// Simulates the bus going away after `rounds` full rounds.
    pub fn with_dropout(mut self, rounds: u64) -> Self {
        self.dropout_after = Some(rounds);
        self
    }

    fn physical(&self, signal_id: &str) -> f64 {
        let t = self.round as f64 * 0.05;
        match signal_id {
            "speed" => 60.0 + 40.0 * t.sin(),
            "battery_voltage" => 12.6 - 0.4 * (t * 0.3).sin().abs(),
            "motor_temp" => 45.0 + 15.0 * (t * 0.1).sin(),
            _ => 0.0,
        }
    }

    fn fill_round(&mut self) {
        for spec in &self.specs {
            let frame = BusFrame::raw(&spec.id, spec.encode_raw(self.physical(&spec.id)));
            self.pending.push_back(frame);
        }
        self.round += 1;
    }
}

impl BusSource for SimulatedVehicle {
    async fn next_frame(&mut self) -> Result<Option<BusFrame>, BusError> {
        if let Some(frame) = self.pending.pop_front() {
            return Ok(Some(frame));
        }
        if let Some(limit) = self.dropout_after {
            if self.round >= limit {
                return Err(BusError::Disconnected(format!(
                    "simulated dropout after {} rounds",
                    limit
                )));
            }
        }
        self.cadence.tick().await;
        self.fill_round();
        Ok(self.pending.pop_front())
    }

    fn describe(&self) -> String {
        "simulated".to_string()
    }
}
