use std::time::Duration;

use rand::Rng;

/// Exponential backoff between bulk load attempts.
///
/// - initial_delay: delay before the first retry
/// - multiplier: growth factor per retry (> 1.0)
/// - max_delay: cap for the computed delay, jitter excluded
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

const MAX_JITTER_MS: u64 = 50;

impl BackoffPolicy {
    pub const fn new(initial_delay: Duration, multiplier: f64, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            multiplier,
            max_delay,
        }
    }

    /// Delay after the `retry`th failed attempt (0 based), before jitter.
    pub fn next_delay(&self, retry: u32) -> Duration {
        let scaled = self.initial_delay.as_nanos() as f64 * self.multiplier.powi(retry as i32);
        if !scaled.is_finite() || scaled >= self.max_delay.as_nanos() as f64 {
            return self.max_delay;
        }
        Duration::from_nanos(scaled.max(0.0).round() as u64)
    }

    pub fn next_delay_with_jitter(&self, retry: u32) -> Duration {
        let jitter = rand::thread_rng().gen_range(0..=MAX_JITTER_MS);
        self.next_delay(retry) + Duration::from_millis(jitter)
    }
}
