use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Consecutive failures tolerated before the link is declared failed.
    pub max_retries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            max_retries: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkHealth {
    Healthy,
    Retrying { attempt: u32, delay: Duration },
    /// Persistent error. Surfaced to the user; no further automatic retries.
    Failed { attempts: u32 },
}

/// Failure/backoff state of the polling link, independent of rendering.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    health: LinkHealth,
    retry_at: Option<Instant>,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            health: LinkHealth::Healthy,
            retry_at: None,
        }
    }

    /// Whether a poll may be issued at `now`.
    pub fn ready(&self, now: Instant) -> bool {
        match self.health {
            LinkHealth::Failed { .. } => false,
            _ => self.retry_at.map_or(true, |at| now >= at),
        }
    }

    /// Returns true when this success ends a failure streak.
    pub fn on_success(&mut self) -> bool {
        let recovered = self.health != LinkHealth::Healthy;
        self.health = LinkHealth::Healthy;
        self.retry_at = None;
        recovered
    }

    pub fn on_failure(&mut self, now: Instant) -> LinkHealth {
        let attempt = match self.health {
            LinkHealth::Healthy => 1,
            LinkHealth::Retrying { attempt, .. } => attempt + 1,
            LinkHealth::Failed { attempts } => attempts,
        };

        if attempt > self.policy.max_retries {
            self.health = LinkHealth::Failed { attempts: attempt };
            self.retry_at = None;
        } else {
            let delay = self.delay_for(attempt);
            self.health = LinkHealth::Retrying { attempt, delay };
            self.retry_at = Some(now + delay);
        }
        self.health
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.policy.base_delay.saturating_mul(factor).min(self.policy.max_delay)
    }
}
