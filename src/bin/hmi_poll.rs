use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use hmi_telemetry::client::{BackoffPolicy, DisplayEvent, PollClient, Poller, PollerExit};

#[derive(Debug, Parser)]
#[command(name = "hmi-poll", version, about = "Headless display poller for hmi-telemetry")]
struct Args {
    /// Base URL of the snapshot server
    #[arg(long, default_value = "http://localhost:5000")]
    base_url: String,

    /// Poll period in milliseconds
    #[arg(long, default_value_t = 100)]
    period_ms: u64,

    /// Consecutive failures before giving up
    #[arg(long, default_value_t = 5)]
    max_retries: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let period = Duration::from_millis(args.period_ms.max(1));
    let policy = BackoffPolicy {
        max_retries: args.max_retries,
        ..BackoffPolicy::default()
    };

    // Requests time out well before the backoff ceiling
    let client = PollClient::new(&args.base_url, Duration::from_millis(500));
    let (tx, mut rx) = mpsc::channel(64);
    let cancel = CancellationToken::new();

    let poller = tokio::spawn(Poller::new(client, period, policy, tx).run(cancel.clone()));

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        ctrl_c.cancel();
    });

    // Stand-in for the renderer
    while let Some(event) = rx.recv().await {
        match event {
            DisplayEvent::VehicleSpeedChanged(v) => tracing::info!("speed {:.1} km/h", v),
            DisplayEvent::BatteryVoltageChanged(v) => tracing::info!("battery {:.2} V", v),
            DisplayEvent::MotorTempChanged(v) => tracing::info!("motor {:.1} °C", v),
            DisplayEvent::ConnectionStatusChanged(c) => tracing::info!(connected = c, "bus status"),
            DisplayEvent::Error(msg) => tracing::warn!("{}", msg),
        }
    }

    match poller.await? {
        PollerExit::PersistentFailure { attempts } => {
            anyhow::bail!("telemetry service unreachable after {} attempts", attempts)
        }
        exit => tracing::info!(?exit, "Poller stopped"),
    }
    Ok(())
}
