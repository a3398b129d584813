//! HTTP handlers for the snapshot server.
//!
//! Every handler is a pure read. Latest-values takes exactly ONE buffer snapshot per
//! request so all signals share the same `now`.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, Json};

use crate::api::{HealthResponse, LatestResponse, StatusResponse};
use crate::kernel::buffer::TelemetryBuffer;
use crate::kernel::telemetry::{IngestRecorder, StatusAggregator};
use crate::kernel::time::Clock;

/// Handles shared by every request. Constructed once in `main`.
pub struct AppState {
    pub buffer: Arc<TelemetryBuffer>,
    pub recorder: Arc<IngestRecorder>,
    pub aggregator: StatusAggregator,
    pub clock: Clock,
    pub stale_threshold: Duration,
}

pub async fn latest_values(State(state): State<Arc<AppState>>) -> Json<LatestResponse> {
    let now = state.clock.now();
    let snapshot = state.buffer.snapshot(now, state.stale_threshold);
    Json(LatestResponse::from_snapshot(&snapshot, &state.clock))
}

pub async fn bus_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let now = state.clock.now();
    let counters = state.recorder.snapshot();
    let status = state.aggregator.evaluate(&counters, now);
    Json(StatusResponse::from(&status))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
