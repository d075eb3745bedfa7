//! Keyed dashboard state and the merge rules applied to it.

use std::collections::BTreeMap;

use pulseboard_types::{Metric, MetricUpdate};

use crate::message::Operation;

/// Latest known value of every metric, keyed by id.
///
/// Merging is "last write wins" by arrival: an update always replaces the
/// stored metric, even if its timestamp is older.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardState {
    metrics: BTreeMap<String, Metric>,
}

impl DashboardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `operation`, stamping metrics that carry no timestamp with the
    /// current time.
    pub fn apply(self, operation: Operation) -> Self {
        let now = now_iso();
        self.apply_at(operation, &now)
    }

    /// Apply `operation` using `now` as the time of last resort.
    ///
    /// A metric's own timestamp wins, then the operation's, then `now`.
    pub fn apply_at(mut self, operation: Operation, now: &str) -> Self {
        match operation {
            Operation::Update { metric, timestamp } => {
                let fallback = timestamp.as_deref().unwrap_or(now);
                self.upsert(metric, fallback);
            }
            Operation::BatchUpdate { metrics, timestamp } => {
                let fallback = timestamp.as_deref().unwrap_or(now);
                for metric in metrics {
                    self.upsert(metric, fallback);
                }
            }
            Operation::Clear => self.metrics.clear(),
            Operation::Unknown(_) => {}
        }
        self
    }

    fn upsert(&mut self, update: MetricUpdate, fallback: &str) {
        let metric = update.into_metric(fallback);
        self.metrics.insert(metric.id.clone(), metric);
    }

    pub fn get(&self, id: &str) -> Option<&Metric> {
        self.metrics.get(id)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Metrics in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Metric> {
        self.metrics.values()
    }
}

pub(crate) fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
