//! Reconnect delay policy.

use std::time::Duration;

/// Exponential reconnect backoff with an attempt cap and a cool-down.
///
/// The delay before retry `n` (1-based) is
/// `min(base_delay * growth_factor^(n-1), max_delay)`. Once `max_attempts`
/// consecutive retries have been scheduled, the next one waits `cooldown`
/// and the count starts over, so retries never stop for good.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub growth_factor: f64,
    pub max_delay: Duration,
    pub max_attempts: u32,
    pub cooldown: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(2000),
            growth_factor: 1.5,
            max_delay: Duration::from_millis(30_000),
            max_attempts: 10,
            cooldown: Duration::from_millis(60_000),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the `attempt`-th consecutive retry. Attempt 0 is treated as 1.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base_ms = self.base_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;
        let raw = base_ms * self.growth_factor.powi(exponent);

        // powi overflows to inf for large exponents, min() keeps that at the cap
        let ms = if raw.is_finite() { raw.min(max_ms) } else { max_ms };
        Duration::from_millis(ms.round() as u64)
    }

    /// Given the number of retries already scheduled, return the new count and
    /// how long to wait before the next attempt.
    pub fn next(&self, attempts: u32) -> (u32, Duration) {
        if attempts < self.max_attempts {
            let attempt = attempts + 1;
            (attempt, self.delay_for(attempt))
        } else {
            (0, self.cooldown)
        }
    }
}
