//! Bounded per-metric value history for trends and sparklines.

use std::collections::{HashMap, VecDeque};

use pulseboard_types::{Metric, Trend};

/// Default number of points kept per metric.
pub const DEFAULT_HISTORY_SIZE: usize = 100;

/// One recorded sample.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    pub value: f64,
    pub timestamp: String,
}

/// Recent values of each metric, oldest first.
#[derive(Debug, Clone)]
pub struct History {
    points: HashMap<String, VecDeque<DataPoint>>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE)
    }
}

impl History {
    /// Create a history keeping at most `capacity` points per metric.
    pub fn new(capacity: usize) -> Self {
        Self {
            points: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record the current value of `metric`.
    pub fn record(&mut self, metric: &Metric) {
        let points = self.points.entry(metric.id.clone()).or_default();
        points.push_back(DataPoint {
            value: metric.value,
            timestamp: metric.timestamp.clone(),
        });
        while points.len() > self.capacity {
            points.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn points(&self, id: &str) -> Option<&VecDeque<DataPoint>> {
        self.points.get(id)
    }

    /// Direction of the last change. Returns None with fewer than two points.
    pub fn trend(&self, id: &str) -> Option<Trend> {
        let points = self.points.get(id)?;
        if points.len() < 2 {
            return None;
        }

        let current = points.back()?.value;
        let previous = points.get(points.len() - 2)?.value;
        Some(if current > previous {
            Trend::Up
        } else if current < previous {
            Trend::Down
        } else {
            Trend::Stable
        })
    }

    /// Get sparkline data (normalized to 0-7 for 8 bar levels).
    ///
    /// Returns an empty Vec if there's not enough history.
    pub fn sparkline(&self, id: &str) -> Vec<u8> {
        let Some(points) = self.points.get(id) else {
            return Vec::new();
        };
        if points.len() < 2 {
            return Vec::new();
        }

        let (min, max) = points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p.value), hi.max(p.value))
            });
        let range = max - min;

        points
            .iter()
            .map(|p| {
                if range <= f64::EPSILON {
                    0
                } else {
                    (((p.value - min) / range * 7.0) as u8).min(7)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulseboard_types::MetricUpdate;

    fn metric(id: &str, value: f64) -> Metric {
        MetricUpdate::new(id, value).into_metric("T")
    }

    #[test]
    fn keeps_only_the_newest_points() {
        let mut history = History::new(3);
        for v in 0..5 {
            history.record(&metric("cpu", v as f64));
        }

        let values: Vec<f64> = history.points("cpu").unwrap().iter().map(|p| p.value).collect();
        assert_eq!(values, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn default_capacity_is_one_hundred() {
        let mut history = History::default();
        for v in 0..150 {
            history.record(&metric("cpu", v as f64));
        }
        assert_eq!(history.points("cpu").unwrap().len(), DEFAULT_HISTORY_SIZE);
        assert_eq!(history.points("cpu").unwrap().front().unwrap().value, 50.0);
    }

    #[test]
    fn trend_from_last_two_points() {
        let mut history = History::default();
        history.record(&metric("cpu", 10.0));
        assert_eq!(history.trend("cpu"), None);

        history.record(&metric("cpu", 12.0));
        assert_eq!(history.trend("cpu"), Some(Trend::Up));

        history.record(&metric("cpu", 3.0));
        assert_eq!(history.trend("cpu"), Some(Trend::Down));

        history.record(&metric("cpu", 3.0));
        assert_eq!(history.trend("cpu"), Some(Trend::Stable));
    }

    #[test]
    fn sparkline_spans_the_range() {
        let mut history = History::default();
        for v in [0.0, 50.0, 100.0] {
            history.record(&metric("cpu", v));
        }
        assert_eq!(history.sparkline("cpu"), vec![0, 3, 7]);
        assert!(history.sparkline("missing").is_empty());
    }

    #[test]
    fn flat_sparkline_is_all_zero() {
        let mut history = History::default();
        history.record(&metric("cpu", 5.0));
        history.record(&metric("cpu", 5.0));
        assert_eq!(history.sparkline("cpu"), vec![0, 0]);
    }

    #[test]
    fn clear_forgets_everything() {
        let mut history = History::default();
        history.record(&metric("cpu", 1.0));
        history.clear();
        assert!(history.points("cpu").is_none());
    }
}
