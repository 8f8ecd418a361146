//! Bounded exponential backoff for oracle calls.

use crate::OracleError;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first call.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Add up to 25% random jitter on top of the computed delay.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(8),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Whether attempt number `attempt` (1-based) may be followed by another.
    pub fn should_retry(&self, attempt: u32, error: &OracleError) -> bool {
        attempt < self.max_attempts && error.is_retryable()
    }

    /// Delay after the `attempt`-th failure. A rate-limit hint raises the
    /// delay but never past `max_delay`.
    pub fn delay(&self, attempt: u32, error: &OracleError) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let base = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let mut delay = Duration::from_millis(base as u64).min(self.max_delay);

        if let OracleError::RateLimited { retry_after_ms } = error {
            delay = delay.max(Duration::from_millis(*retry_after_ms).min(self.max_delay));
        }

        if self.jitter {
            let jitter = (delay.as_millis() as f64 * 0.25 * rand::random::<f64>()) as u64;
            delay += Duration::from_millis(jitter);
        }

        delay
    }
}
