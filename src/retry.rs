//! Bounded retry with exponential backoff for transient fetch failures.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Pure retry policy: how many attempts a fetch gets and how long to wait
/// between them. Only transient failures consult this; permanent failures
/// are never retried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    pub max_attempts: u32,
    /// Factor the delay grows by after each retry.
    pub backoff: f64,
    /// Delay before the first retry.
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: 2.0,
            initial_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Returns the delay to sleep after `attempts` failed tries, or `None`
    /// once the attempt budget is spent.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn delay_after(&self, attempts: u32) -> Option<Duration> {
        if attempts >= self.max_attempts {
            return None;
        }
        let factor = self.backoff.powi(attempts.saturating_sub(1) as i32);
        Some(self.initial_delay.mul_f64(factor))
    }

    /// Sets the attempt budget.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the delay before the first retry.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }
}
