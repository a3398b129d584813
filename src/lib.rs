pub mod api;
pub mod client;
pub mod config;
pub mod ingest;
pub mod kernel;
pub mod server;

// Re-export the handles `main` wires together
pub use kernel::buffer::TelemetryBuffer;
pub use kernel::telemetry::{IngestRecorder, StatusAggregator};
pub use kernel::time::Clock;
