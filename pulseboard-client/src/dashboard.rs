//! Dashboard view model: merged state plus per-metric history.

use std::collections::{BTreeMap, VecDeque};

use pulseboard_types::{Metric, Trend};

use crate::data::{DashboardState, DataPoint, History, MetricStatus};
use crate::message::Operation;

/// Category used for metrics that do not name one.
pub const DEFAULT_CATEGORY: &str = "General";

/// Merged dashboard state with value history for the metrics it has seen.
#[derive(Debug, Clone, Default)]
pub struct Dashboard {
    state: DashboardState,
    history: History,
}

impl Dashboard {
    pub fn new(history_size: usize) -> Self {
        Self {
            state: DashboardState::new(),
            history: History::new(history_size),
        }
    }

    /// Merge `operation` into the dashboard.
    ///
    /// Metrics touched by an update are appended to their history; `clear`
    /// empties both state and history.
    pub fn apply(&mut self, operation: Operation) {
        let touched: Vec<String> = match &operation {
            Operation::Update { metric, .. } => vec![metric.id.clone()],
            Operation::BatchUpdate { metrics, .. } => metrics.iter().map(|m| m.id.clone()).collect(),
            Operation::Clear => {
                self.history.clear();
                Vec::new()
            }
            Operation::Unknown(kind) => {
                tracing::debug!(kind = %kind, "Ignoring unknown operation");
                Vec::new()
            }
        };

        let state = std::mem::take(&mut self.state);
        self.state = state.apply(operation);

        let mut seen = std::collections::HashSet::new();
        for id in touched {
            if !seen.insert(id.clone()) {
                continue;
            }
            if let Some(metric) = self.state.get(&id) {
                self.history.record(metric);
            }
        }
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    /// All metrics in id order.
    pub fn metrics(&self) -> Vec<&Metric> {
        self.state.iter().collect()
    }

    /// Metrics grouped by category.
    pub fn grouped(&self) -> BTreeMap<&str, Vec<&Metric>> {
        let mut groups: BTreeMap<&str, Vec<&Metric>> = BTreeMap::new();
        for metric in self.state.iter() {
            let category = metric.category.as_deref().unwrap_or(DEFAULT_CATEGORY);
            groups.entry(category).or_default().push(metric);
        }
        groups
    }

    pub fn status_of(&self, id: &str) -> Option<MetricStatus> {
        self.state.get(id).map(MetricStatus::of)
    }

    /// The producer-supplied trend, else the direction of the last change.
    pub fn trend_of(&self, id: &str) -> Option<Trend> {
        let metric = self.state.get(id)?;
        metric.trend.or_else(|| self.history.trend(id))
    }

    pub fn history(&self, id: &str) -> Option<&VecDeque<DataPoint>> {
        self.history.points(id)
    }

    pub fn sparkline(&self, id: &str) -> Vec<u8> {
        self.history.sparkline(id)
    }
}
