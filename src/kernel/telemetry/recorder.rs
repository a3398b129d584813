use std::time::Duration;

use parking_lot::Mutex;

use super::event::{IngestEvent, RejectReason};
use crate::kernel::time::Millis;

const RATE_BUCKETS: usize = 10;

/// Fixed ring of time buckets covering the last `window` of forwarded messages.
#[derive(Debug, Clone)]
pub struct RateWindow {
    bucket_ms: u64,
    // (bucket index = at / bucket_ms, count)
    buckets: [(u64, u64); RATE_BUCKETS],
}

impl RateWindow {
    pub fn new(window: Duration) -> Self {
        let bucket_ms = (window.as_millis() as u64 / RATE_BUCKETS as u64).max(1);
        Self {
            bucket_ms,
            buckets: [(u64::MAX, 0); RATE_BUCKETS],
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.bucket_ms * RATE_BUCKETS as u64)
    }

    pub fn record(&mut self, at: Millis) {
        let index = at.as_u64() / self.bucket_ms;
        let slot = &mut self.buckets[(index % RATE_BUCKETS as u64) as usize];
        if slot.0 != index {
            *slot = (index, 0);
        }
        slot.1 += 1;
    }

    /// Messages recorded in buckets that still overlap `(now - window, now]`.
    pub fn count(&self, now: Millis) -> u64 {
        let current = now.as_u64() / self.bucket_ms;
        self.buckets
            .iter()
            .filter(|(index, _)| *index != u64::MAX && *index <= current && index + (RATE_BUCKETS as u64) > current)
            .map(|(_, count)| count)
            .sum()
    }

    /// Time actually covered by [`RateWindow::count`] at `now`: the nine completed
    /// buckets plus the elapsed part of the current one, inclusive of `now`.
    pub fn span(&self, now: Millis) -> Duration {
        let full = self.bucket_ms * (RATE_BUCKETS as u64 - 1);
        Duration::from_millis(full + now.as_u64() % self.bucket_ms + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Source is attached and being read (or not yet started).
    Up,
    /// Source failed or ended; the ingest loop has stopped.
    Down,
}

/// Consistent copy of the ingest counters, taken under one lock.
#[derive(Debug, Clone)]
pub struct CountersSnapshot {
    pub started_at: Millis,
    pub messages_total: u64,
    pub errors_total: u64,
    pub last_message_at: Option<Millis>,
    pub link: LinkState,
    pub window: RateWindow,
}

#[derive(Debug)]
struct CounterState {
    messages_total: u64,
    errors_total: u64,
    last_message_at: Option<Millis>,
    link: LinkState,
    last_link_error: Option<String>,
    rejected_by_reason: [u64; 4],
    window: RateWindow,
}

/// Liveness/error counters for the ingest loop.
///
/// Written only by the ingest loop through [`IngestRecorder::record`]; everything else
/// reads through [`IngestRecorder::snapshot`].
#[derive(Debug)]
pub struct IngestRecorder {
    started_at: Millis,
    state: Mutex<CounterState>,
}

impl IngestRecorder {
    pub fn new(started_at: Millis, rate_window: Duration) -> Self {
        Self {
            started_at,
            state: Mutex::new(CounterState {
                messages_total: 0,
                errors_total: 0,
                last_message_at: None,
                link: LinkState::Up,
                last_link_error: None,
                rejected_by_reason: [0; 4],
                window: RateWindow::new(rate_window),
            }),
        }
    }

    pub fn record(&self, event: IngestEvent) {
        let mut state = self.state.lock();
        match event {
            IngestEvent::Forwarded { at } => {
                state.messages_total += 1;
                state.last_message_at = Some(at);
                state.window.record(at);
            }
            IngestEvent::Rejected { reason, .. } => {
                state.errors_total += 1;
                state.rejected_by_reason[reason_slot(reason)] += 1;
            }
            IngestEvent::LinkDown { reason, .. } => {
                state.link = LinkState::Down;
                state.last_link_error = Some(reason);
            }
        }
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        let state = self.state.lock();
        CountersSnapshot {
            started_at: self.started_at,
            messages_total: state.messages_total,
            errors_total: state.errors_total,
            last_message_at: state.last_message_at,
            link: state.link,
            window: state.window.clone(),
        }
    }

    pub fn last_link_error(&self) -> Option<String> {
        self.state.lock().last_link_error.clone()
    }

    pub fn rejected(&self, reason: RejectReason) -> u64 {
        self.state.lock().rejected_by_reason[reason_slot(reason)]
    }
}

fn reason_slot(reason: RejectReason) -> usize {
    match reason {
        RejectReason::UnknownSignal => 0,
        RejectReason::NonFinite => 1,
        RejectReason::OutOfRange => 2,
        RejectReason::Undecodable => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_forgets_old_buckets() {
        let mut w = RateWindow::new(Duration::from_millis(1000));
        for t in 0..10 {
            w.record(Millis(t * 10));
        }
        assert_eq!(w.count(Millis(100)), 10);
        // One full window later every bucket has rotated out
        assert_eq!(w.count(Millis(1200)), 0);
    }

    #[test]
    fn span_tracks_the_partial_bucket() {
        let w = RateWindow::new(Duration::from_millis(1000));
        assert_eq!(w.span(Millis(1000)), Duration::from_millis(901));
        assert_eq!(w.span(Millis(1099)), Duration::from_millis(1000));
    }

    #[test]
    fn reused_slot_is_reset() {
        let mut w = RateWindow::new(Duration::from_millis(1000));
        w.record(Millis(50));
        w.record(Millis(1050)); // same slot, next lap
        assert_eq!(w.count(Millis(1050)), 1);
    }
}
