use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Monotonic timestamp: milliseconds since the owning [`Clock`] was created.
///
/// All staleness and liveness arithmetic happens on `Millis`, never on wall-clock
/// time, so NTP steps or manual clock changes cannot flip a signal stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Millis(pub u64);

impl Millis {
    pub const ZERO: Millis = Millis(0);

    pub fn from_duration(d: Duration) -> Self {
        Millis(d.as_millis() as u64)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Elapsed time from `earlier` to `self`. Saturates to zero when `earlier` is ahead,
    /// which happens when a reader's `now` was sampled just before a write landed.
    pub fn since(self, earlier: Millis) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

/// Process clock. Anchors the wall clock exactly once so monotonic stamps can be
/// rendered as epoch milliseconds for the display.
#[derive(Debug, Clone)]
pub struct Clock {
    origin: Instant,
    wall_origin_ms: u64,
}

impl Clock {
    pub fn new() -> Self {
        let wall_origin_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            origin: Instant::now(),
            wall_origin_ms,
        }
    }

    /// Fixed anchor, for tests that want deterministic epoch output.
    pub fn with_wall_origin(wall_origin_ms: u64) -> Self {
        Self {
            origin: Instant::now(),
            wall_origin_ms,
        }
    }

    pub fn now(&self) -> Millis {
        Millis::from_duration(self.origin.elapsed())
    }

    pub fn to_epoch_ms(&self, t: Millis) -> u64 {
        self.wall_origin_ms.saturating_add(t.0)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn since_saturates_when_earlier_is_ahead() {
        assert_eq!(Millis(100).since(Millis(250)), Duration::ZERO);
        assert_eq!(Millis(250).since(Millis(100)), Duration::from_millis(150));
    }

    #[test]
    fn epoch_rendering_is_offset_by_anchor() {
        let clock = Clock::with_wall_origin(1_700_000_000_000);
        assert_eq!(clock.to_epoch_ms(Millis(1000)), 1_700_000_001_000);
    }
}
