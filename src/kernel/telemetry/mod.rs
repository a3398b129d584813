//! Ingest liveness telemetry.
//!
//! # OWNERSHIP INVARIANT
//! Counters are written by the ingest loop ONLY. The status path reads them through a
//! single consistent [`recorder::CountersSnapshot`] and derives status as a pure function.
//!
//! # CONTENT INVARIANT
//! Telemetry events never carry signal values. Values live in the telemetry buffer.

pub mod event;
pub mod metrics;
pub mod recorder;

pub use event::{IngestEvent, RejectReason};
pub use metrics::{BusStatus, ConnectionState, StatusAggregator};
pub use recorder::{CountersSnapshot, IngestRecorder, LinkState, RateWindow};
