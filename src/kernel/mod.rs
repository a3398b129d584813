pub mod buffer;
pub mod record;
pub mod telemetry;
pub mod time;
