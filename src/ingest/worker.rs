use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::catalog::SignalCatalog;
use super::frame::{BusError, BusFrame, FrameError};
use super::source::BusSource;
use crate::kernel::buffer::TelemetryBuffer;
use crate::kernel::telemetry::{IngestEvent, IngestRecorder, RejectReason};
use crate::kernel::time::{Clock, Millis};

/// Why the ingest loop returned.
#[derive(Debug)]
pub enum IngestExit {
    Cancelled,
    SourceClosed,
    LinkFailed(BusError),
}

/// The single writer of the telemetry buffer.
///
/// Reads frames as the source delivers them, decodes and validates, and stamps each
/// accepted value with `now` at receipt. A bad frame is counted and dropped. A fatal
/// source error marks the link down and ends the loop; there is no inline retry.
pub struct IngestLoop<S> {
    source: S,
    catalog: SignalCatalog,
    buffer: Arc<TelemetryBuffer>,
    recorder: Arc<IngestRecorder>,
    clock: Clock,
    cancel: CancellationToken,
}

impl<S: BusSource> IngestLoop<S> {
    pub fn new(
        source: S,
        catalog: SignalCatalog,
        buffer: Arc<TelemetryBuffer>,
        recorder: Arc<IngestRecorder>,
        clock: Clock,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            catalog,
            buffer,
            recorder,
            clock,
            cancel,
        }
    }

    pub async fn run(mut self) -> IngestExit {
        info!(
            source = %self.source.describe(),
            signals = self.catalog.len(),
            allow_list = self.catalog.enforces_allow_list(),
            "Ingest loop started"
        );

        loop {
            // The buffer lock is never held across this await.
            let next = tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Ingest loop cancelled");
                    return IngestExit::Cancelled;
                }
                next = self.source.next_frame() => next,
            };

            match next {
                Ok(Some(frame)) => {
                    let _ = self.ingest_at(&frame, self.clock.now());
                }
                Ok(None) => {
                    warn!(source = %self.source.describe(), "Bus source closed");
                    self.recorder.record(IngestEvent::LinkDown {
                        at: self.clock.now(),
                        reason: "source closed".to_string(),
                    });
                    return IngestExit::SourceClosed;
                }
                Err(e) if !e.is_fatal() => {
                    warn!(error = %e, "Dropping malformed frame");
                    self.recorder.record(IngestEvent::Rejected {
                        at: self.clock.now(),
                        reason: RejectReason::Undecodable,
                    });
                }
                Err(e) => {
                    error!(error = %e, source = %self.source.describe(), "Bus link failed, ingest stopping");
                    self.recorder.record(IngestEvent::LinkDown {
                        at: self.clock.now(),
                        reason: e.to_string(),
                    });
                    return IngestExit::LinkFailed(e);
                }
            }
        }
    }

    /// Decode, validate and forward one frame received at `now`.
    pub fn ingest_at(&self, frame: &BusFrame, now: Millis) -> Result<(), FrameError> {
        match self.catalog.decode(frame) {
            Ok(decoded) => {
                self.buffer.update(decoded.signal_id, decoded.value, decoded.unit, now);
                self.recorder.record(IngestEvent::Forwarded { at: now });
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, signal = %frame.signal_id, "Dropping invalid frame");
                self.recorder.record(IngestEvent::Rejected {
                    at: now,
                    reason: e.reason(),
                });
                Err(e)
            }
        }
    }
}
