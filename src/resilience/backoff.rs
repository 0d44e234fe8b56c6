//! # Exponential Backoff
//!
//! Reconnect delay policy for the push channel:
//! `delay(attempt) = min(base × multiplier^attempt, max_delay)` for
//! `attempt < max_attempts`, after which the policy is exhausted.

use crate::config::ReconnectConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExponentialBackoff {
    base: Duration,
    multiplier: f64,
    max_attempts: u32,
    max_delay: Duration,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, multiplier: f64, max_attempts: u32, max_delay: Duration) -> Self {
        Self {
            base,
            multiplier,
            max_attempts,
            max_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before reconnect attempt `attempt` (zero-based), or `None` once
    /// the attempt budget is spent
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let millis = self.base.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Some(Duration::from_millis(capped as u64))
    }

    /// Iterator over every delay the policy allows
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_attempts).filter_map(move |attempt| self.delay_for(attempt))
    }
}

impl From<&ReconnectConfig> for ExponentialBackoff {
    fn from(config: &ReconnectConfig) -> Self {
        Self::new(
            Duration::from_millis(config.base_delay_ms),
            config.multiplier,
            config.max_attempts,
            Duration::from_millis(config.max_delay_ms),
        )
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::from(&ReconnectConfig::default())
    }
}
