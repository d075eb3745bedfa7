//! Metric records held in subscriber dashboard state.

use crate::Event;

/// Direction a metric is moving in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Trend {
    Up,
    Down,
    Stable,
}

impl Trend {
    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            Trend::Up => "↑",
            Trend::Down => "↓",
            Trend::Stable => "→",
        }
    }
}

/// Warning and critical levels for a metric value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Thresholds {
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub warning: Option<f64>,

    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub critical: Option<f64>,
}

/// The latest known state of one metric on a dashboard.
///
/// Unlike [`MetricUpdate`], a stored metric always has a timestamp.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Metric {
    pub id: String,
    pub label: String,
    pub value: f64,

    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub unit: Option<String>,

    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub category: Option<String>,

    /// ISO-8601 time of the sample (or of its arrival when the sample had none).
    pub timestamp: String,

    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub trend: Option<Trend>,

    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub thresholds: Option<Thresholds>,

    /// Display color hint.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub color: Option<String>,
}

/// A metric as it arrives inside an `update` or `batch-update` message.
///
/// The only difference to [`Metric`] is the optional timestamp, which the
/// merger fills in on arrival.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricUpdate {
    pub id: String,

    #[cfg_attr(feature = "serde", serde(default))]
    pub label: String,

    pub value: f64,

    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub unit: Option<String>,

    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub category: Option<String>,

    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub timestamp: Option<String>,

    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub trend: Option<Trend>,

    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub thresholds: Option<Thresholds>,

    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub color: Option<String>,
}

impl MetricUpdate {
    /// Create an update with only the required fields set.
    pub fn new(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            label: String::new(),
            value,
            unit: None,
            category: None,
            timestamp: None,
            trend: None,
            thresholds: None,
            color: None,
        }
    }

    /// Set the label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the unit.
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Set the category.
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the sample timestamp.
    pub fn timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Set the trend.
    pub fn trend(mut self, trend: Trend) -> Self {
        self.trend = Some(trend);
        self
    }

    /// Set the thresholds.
    pub fn thresholds(mut self, warning: Option<f64>, critical: Option<f64>) -> Self {
        self.thresholds = Some(Thresholds { warning, critical });
        self
    }

    /// Convert into a stored metric, using `fallback` when the update has no timestamp.
    pub fn into_metric(self, fallback: &str) -> Metric {
        Metric {
            timestamp: self.timestamp.unwrap_or_else(|| fallback.to_string()),
            id: self.id,
            label: self.label,
            value: self.value,
            unit: self.unit,
            category: self.category,
            trend: self.trend,
            thresholds: self.thresholds,
            color: self.color,
        }
    }
}

impl From<Event> for MetricUpdate {
    fn from(event: Event) -> Self {
        Self {
            id: event.id,
            label: event.label,
            value: event.value,
            unit: Some(event.unit),
            category: None,
            timestamp: Some(event.timestamp),
            trend: None,
            thresholds: None,
            color: None,
        }
    }
}
