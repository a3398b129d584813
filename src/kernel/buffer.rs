//! Latest-value store for bus signals.
//!
//! # CONCURRENCY INVARIANT
//! Exactly one writer (the ingest loop) calls [`TelemetryBuffer::update`]. Any number of
//! readers call [`TelemetryBuffer::get`] / [`TelemetryBuffer::snapshot`] concurrently.
//! The lock is held only to copy records in or out. Staleness is computed AFTER the
//! lock is released, and nothing awaits while holding it.
//!
//! # SNAPSHOT INVARIANT
//! Every record in one [`Snapshot`] is evaluated against the same `now`.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;

use super::record::{SignalRecord, SignalView};
use super::time::Millis;

/// `now - observed_at > threshold`. Strictly greater: a record exactly
/// `threshold` old is still fresh.
pub fn is_stale(observed_at: Millis, now: Millis, stale_threshold: Duration) -> bool {
    now.since(observed_at) > stale_threshold
}

/// Immutable point-in-time copy of the whole buffer.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub taken_at: Millis,
    pub stale_threshold: Duration,
    pub signals: BTreeMap<String, SignalView>,
}

impl Snapshot {
    pub fn get(&self, signal_id: &str) -> Option<&SignalView> {
        self.signals.get(signal_id)
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn stale_count(&self) -> usize {
        self.signals.values().filter(|v| v.is_stale).count()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    pub signals: usize,
    pub updates_total: u64,
    pub pruned_total: u64,
}

#[derive(Debug, Default)]
pub struct TelemetryBuffer {
    records: RwLock<HashMap<String, SignalRecord>>,
    updates_total: AtomicU64,
    pruned_total: AtomicU64,
}

impl TelemetryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the record for `signal_id`. Never fails; range/finiteness checks
    /// belong to the caller.
    pub fn update(&self, signal_id: &str, value: f64, unit: &str, now: Millis) {
        {
            let mut records = self.records.write();
            match records.get_mut(signal_id) {
                Some(record) => {
                    record.value = value;
                    if record.unit != unit {
                        record.unit = unit.to_string();
                    }
                    record.observed_at = now;
                }
                None => {
                    records.insert(
                        signal_id.to_string(),
                        SignalRecord::new(signal_id, value, unit, now),
                    );
                }
            }
        }
        self.updates_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Point read. `None` means the signal has never been observed (or was pruned),
    /// which is distinct from a stale value.
    pub fn get(&self, signal_id: &str, now: Millis, stale_threshold: Duration) -> Option<SignalView> {
        let record = self.records.read().get(signal_id).cloned()?;
        let is_stale = is_stale(record.observed_at, now, stale_threshold);
        Some(SignalView { record, is_stale })
    }

    pub fn snapshot(&self, now: Millis, stale_threshold: Duration) -> Snapshot {
        // Copy-out only. Keep this block free of anything but clones.
        let copied: Vec<SignalRecord> = {
            let records = self.records.read();
            records.values().cloned().collect()
        };

        let signals = copied
            .into_iter()
            .map(|record| {
                let is_stale = is_stale(record.observed_at, now, stale_threshold);
                (record.signal_id.clone(), SignalView { record, is_stale })
            })
            .collect();

        Snapshot {
            taken_at: now,
            stale_threshold,
            signals,
        }
    }

    /// Evicts records not updated for longer than `max_age`. This bounds memory under
    /// signal churn; it is not how staleness is reported.
    pub fn prune(&self, now: Millis, max_age: Duration) -> usize {
        let removed = {
            let mut records = self.records.write();
            let before = records.len();
            records.retain(|_, record| now.since(record.observed_at) <= max_age);
            before - records.len()
        };
        if removed > 0 {
            self.pruned_total.fetch_add(removed as u64, Ordering::Relaxed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn stats(&self) -> BufferStats {
        BufferStats {
            signals: self.len(),
            updates_total: self.updates_total.load(Ordering::Relaxed),
            pruned_total: self.pruned_total.load(Ordering::Relaxed),
        }
    }
}
