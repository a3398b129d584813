use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::backoff::{Backoff, BackoffPolicy, LinkHealth};
use super::client::{PollClient, PollError};
use super::model::{DisplayEvent, DisplayModel};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollerExit {
    Cancelled,
    /// Retries exhausted; the display should show a persistent error.
    PersistentFailure { attempts: u32 },
    /// Nobody is listening for display events any more.
    DisplayClosed,
}

/// Display-side polling task: a fixed cadence plus an independent backoff state
/// machine. Rendering happens wherever the `DisplayEvent` receiver lives.
pub struct Poller {
    client: PollClient,
    period: Duration,
    backoff: Backoff,
    model: DisplayModel,
    events: mpsc::Sender<DisplayEvent>,
}

impl Poller {
    pub fn new(
        client: PollClient,
        period: Duration,
        policy: BackoffPolicy,
        events: mpsc::Sender<DisplayEvent>,
    ) -> Self {
        Self {
            client,
            period,
            backoff: Backoff::new(policy),
            model: DisplayModel::new(),
            events,
        }
    }

    pub fn model(&self) -> &DisplayModel {
        &self.model
    }

    pub async fn run(mut self, cancel: CancellationToken) -> PollerExit {
        info!(period_ms = self.period.as_millis() as u64, "Poller started");

        let mut cadence = interval(self.period);
        cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return PollerExit::Cancelled,
                _ = cadence.tick() => {}
            }

            if !self.backoff.ready(Instant::now()) {
                continue;
            }

            let events = match self.poll_once().await {
                Ok(events) => {
                    if self.backoff.on_success() {
                        info!("Polling link recovered");
                    }
                    events
                }
                Err(e) => {
                    let health = self.backoff.on_failure(Instant::now());
                    warn!(error = %e, ?health, "Poll failed");
                    let events = self.model.apply_error(&e.to_string());
                    if let LinkHealth::Failed { attempts } = health {
                        // Deliver the final error before giving up.
                        let _ = self.emit(events).await;
                        return PollerExit::PersistentFailure { attempts };
                    }
                    events
                }
            };

            if self.emit(events).await.is_err() {
                return PollerExit::DisplayClosed;
            }
        }
    }

    /// Fetches both endpoints and folds them into the model. Nothing is applied unless
    /// both succeed, so one tick never mixes fresh values with a failed status.
    pub async fn poll_once(&mut self) -> Result<Vec<DisplayEvent>, PollError> {
        let (latest, status) = tokio::join!(self.client.fetch_latest(), self.client.fetch_status());
        let (latest, status) = (latest?, status?);

        debug!(signals = latest.messages.len(), connected = status.connected, "Poll ok");
        let mut events = self.model.apply_latest(&latest);
        events.extend(self.model.apply_status(&status));
        Ok(events)
    }

    async fn emit(&self, events: Vec<DisplayEvent>) -> Result<(), ()> {
        for event in events {
            self.events.send(event).await.map_err(|_| ())?;
        }
        Ok(())
    }
}
