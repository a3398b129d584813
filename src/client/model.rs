use crate::api::{LatestResponse, StatusResponse};

/// Change notifications for the display. Emitted only when a value actually changes.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayEvent {
    VehicleSpeedChanged(f64),
    BatteryVoltageChanged(f64),
    MotorTempChanged(f64),
    ConnectionStatusChanged(bool),
    Error(String),
}

/// Dashboard state as the display sees it. No rendering, thresholds or colours here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayModel {
    pub vehicle_speed: f64,
    pub battery_voltage: f64,
    pub motor_temp: f64,
    pub connected: bool,
}

impl DisplayModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absent signals leave the previous value untouched.
    pub fn apply_latest(&mut self, latest: &LatestResponse) -> Vec<DisplayEvent> {
        let mut events = Vec::new();
        let value_of = |id: &str| latest.messages.get(id).map(|entry| entry.value);

        if let Some(v) = value_of("speed") {
            if self.vehicle_speed != v {
                self.vehicle_speed = v;
                events.push(DisplayEvent::VehicleSpeedChanged(v));
            }
        }
        if let Some(v) = value_of("battery_voltage") {
            if self.battery_voltage != v {
                self.battery_voltage = v;
                events.push(DisplayEvent::BatteryVoltageChanged(v));
            }
        }
        if let Some(v) = value_of("motor_temp") {
            if self.motor_temp != v {
                self.motor_temp = v;
                events.push(DisplayEvent::MotorTempChanged(v));
            }
        }
        events
    }

    pub fn apply_status(&mut self, status: &StatusResponse) -> Vec<DisplayEvent> {
        self.set_connected(status.connected).into_iter().collect()
    }

    /// A transport error means the service is unreachable, so the bus is shown as
    /// disconnected as well.
    pub fn apply_error(&mut self, message: &str) -> Vec<DisplayEvent> {
        let mut events = vec![DisplayEvent::Error(message.to_string())];
        events.extend(self.set_connected(false));
        events
    }

    fn set_connected(&mut self, connected: bool) -> Option<DisplayEvent> {
        if self.connected == connected {
            return None;
        }
        self.connected = connected;
        Some(DisplayEvent::ConnectionStatusChanged(connected))
    }
}
