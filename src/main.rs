use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use hmi_telemetry::config::{ServiceConfig, SourceKind};
use hmi_telemetry::ingest::{BusSource, IngestExit, IngestLoop, LineSource, SimulatedVehicle};
use hmi_telemetry::server::{self, AppState};
use hmi_telemetry::{Clock, IngestRecorder, StatusAggregator, TelemetryBuffer};

/// Frames buffered between the stdin reader thread and the ingest loop.
const STDIN_BACKLOG: usize = 256;

#[derive(Debug, Parser)]
#[command(name = "hmi-telemetry", version, about = "Vehicle bus telemetry buffer and snapshot server")]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen address (e.g. 127.0.0.1:5000)
    #[arg(short, long)]
    listen: Option<String>,

    /// Override the bus source
    #[arg(short, long, value_enum)]
    source: Option<SourceKind>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    let args = Args::parse();
    let mut config = ServiceConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    if let Some(source) = args.source {
        config.source = source;
    }

    tracing::info!(
        listen = %config.listen_addr,
        source = ?config.source,
        stale_ms = config.stale_threshold_ms,
        disconnect_ms = config.disconnect_threshold_ms,
        "hmi-telemetry booting"
    );

    // One instance of each, shared by handle for the whole process lifetime
    let clock = Clock::new();
    let buffer = Arc::new(TelemetryBuffer::new());
    let recorder = Arc::new(IngestRecorder::new(clock.now(), config.rate_window()));
    let shutdown = CancellationToken::new();

    let ingest = match config.source {
        SourceKind::Simulated => spawn_ingest(
            SimulatedVehicle::new(config.simulated_period()),
            &config,
            &buffer,
            &recorder,
            &clock,
            &shutdown,
        ),
        SourceKind::Stdin => spawn_ingest(
            LineSource::spawn(std::io::BufReader::new(std::io::stdin()), "stdin", STDIN_BACKLOG)
                .context("starting stdin reader")?,
            &config,
            &buffer,
            &recorder,
            &clock,
            &shutdown,
        ),
    };

    let pruner = spawn_pruner(&config, &buffer, &clock, &shutdown);

    let state = Arc::new(AppState {
        buffer: buffer.clone(),
        recorder: recorder.clone(),
        aggregator: StatusAggregator::new(config.disconnect_threshold()),
        clock: clock.clone(),
        stale_threshold: config.stale_threshold(),
    });

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested");
        }
        signal_token.cancel();
    });

    server::serve(listener, state, shutdown.clone()).await?;

    shutdown.cancel();
    let _ = pruner.await;
    match ingest.await {
        Ok(exit) => tracing::info!(?exit, "Ingest loop finished"),
        Err(e) => tracing::warn!(error = %e, "Ingest task ended abnormally"),
    }
    Ok(())
}

fn spawn_ingest<S>(
    source: S,
    config: &ServiceConfig,
    buffer: &Arc<TelemetryBuffer>,
    recorder: &Arc<IngestRecorder>,
    clock: &Clock,
    shutdown: &CancellationToken,
) -> JoinHandle<IngestExit>
where
    S: BusSource + 'static,
{
    let ingest = IngestLoop::new(
        source,
        config.catalog(),
        buffer.clone(),
        recorder.clone(),
        clock.clone(),
        shutdown.clone(),
    );
    let recorder = recorder.clone();
    tokio::spawn(async move {
        let exit = ingest.run().await;
        if !matches!(exit, IngestExit::Cancelled) {
            // Restart policy belongs to an external supervisor. Keep serving the
            // buffer so the display can see the disconnect.
            tracing::warn!(
                reason = recorder.last_link_error().as_deref().unwrap_or("unknown"),
                "Bus ingestion stopped; status will report disconnected"
            );
        }
        exit
    })
}

fn spawn_pruner(
    config: &ServiceConfig,
    buffer: &Arc<TelemetryBuffer>,
    clock: &Clock,
    shutdown: &CancellationToken,
) -> JoinHandle<()> {
    let buffer = buffer.clone();
    let clock = clock.clone();
    let shutdown = shutdown.clone();
    let max_age = config.prune_max_age();
    let mut cadence = tokio::time::interval(config.prune_interval());
    cadence.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = cadence.tick() => {}
            }
            let removed = buffer.prune(clock.now(), max_age);
            if removed > 0 {
                tracing::info!(removed, remaining = buffer.len(), "Pruned idle signals");
            }
        }
    })
}
