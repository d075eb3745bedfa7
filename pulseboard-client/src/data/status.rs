//! Threshold status of a metric.

use pulseboard_types::Metric;

/// Where a metric's value sits relative to its thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MetricStatus {
    Normal,
    Warning,
    Critical,
}

impl MetricStatus {
    /// Critical if the value reaches the critical level, else Warning if it
    /// reaches the warning level. Metrics without thresholds are Normal.
    pub fn of(metric: &Metric) -> Self {
        let Some(thresholds) = metric.thresholds else {
            return MetricStatus::Normal;
        };

        if thresholds.critical.is_some_and(|c| metric.value >= c) {
            MetricStatus::Critical
        } else if thresholds.warning.is_some_and(|w| metric.value >= w) {
            MetricStatus::Warning
        } else {
            MetricStatus::Normal
        }
    }

    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            MetricStatus::Normal => "OK",
            MetricStatus::Warning => "WARN",
            MetricStatus::Critical => "CRIT",
        }
    }
}
