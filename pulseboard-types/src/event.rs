//! Event - a single metric sample read from the log.

/// A metric sample emitted by a producer.
///
/// Events are immutable once emitted. Ordering between events that share an
/// `id` is only preserved within one partition of the log.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Event {
    /// Metric key (e.g. "cpu").
    pub id: String,

    /// Human readable name.
    pub label: String,

    /// Sampled value.
    pub value: f64,

    /// Unit of `value` (e.g. "%", "GB").
    pub unit: String,

    /// ISO-8601 emission time.
    pub timestamp: String,
}

impl Event {
    /// Create a new event.
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        value: f64,
        unit: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            value,
            unit: unit.into(),
            timestamp: timestamp.into(),
        }
    }
}
