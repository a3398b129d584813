//! Snapshot server: the read-only HTTP surface polled by the display.

pub mod handlers;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::Endpoint;

pub use handlers::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let mut router = Router::new().route("/health", get(handlers::health));
    for endpoint in Endpoint::ALL {
        router = match endpoint {
            Endpoint::Latest => router.route(endpoint.path(), get(handlers::latest_values)),
            Endpoint::Status => router.route(endpoint.path(), get(handlers::bus_status)),
        };
    }
    router.with_state(state).layer(TraceLayer::new_for_http())
}

/// Serves until `shutdown` is cancelled.
pub async fn serve(listener: TcpListener, state: Arc<AppState>, shutdown: CancellationToken) -> Result<()> {
    let addr = listener.local_addr().context("listener has no local address")?;
    info!("Snapshot server listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("snapshot server failed")?;

    info!("Snapshot server stopped");
    Ok(())
}
