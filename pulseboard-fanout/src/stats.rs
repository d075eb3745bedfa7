//! Diagnostic counters for the relay.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Lock-free counters shared by the consumer, broadcaster and lifecycle handler.
#[derive(Debug, Default)]
pub struct FanoutStats {
    events: AtomicU64,
    decode_errors: AtomicU64,
    broadcasts: AtomicU64,
    deliveries: AtomicU64,
    evictions: AtomicU64,
    delivery_failures: AtomicU64,
    registry_failures: AtomicU64,
}

/// Point-in-time copy of [`FanoutStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FanoutStatsSnapshot {
    pub events: u64,
    pub decode_errors: u64,
    pub broadcasts: u64,
    pub deliveries: u64,
    pub evictions: u64,
    pub delivery_failures: u64,
    pub registry_failures: u64,
}

impl FanoutStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_event(&self) {
        self.events.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_broadcast(&self, report: &crate::BroadcastReport) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        self.deliveries
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.evictions
            .fetch_add(report.evicted as u64, Ordering::Relaxed);
        self.delivery_failures
            .fetch_add(report.failed as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_registry_failure(&self) {
        self.registry_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters.
    pub fn snapshot(&self) -> FanoutStatsSnapshot {
        FanoutStatsSnapshot {
            events: self.events.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            registry_failures: self.registry_failures.load(Ordering::Relaxed),
        }
    }
}
