use std::time::Duration;

/// Bounded exponential backoff for blob read-back verification.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    /// Largest accepted difference, in characters, between written and read-back content.
    pub tolerance: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: Duration::from_secs(10),
            tolerance: 10,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the failed `attempt` (1-based) before trying again.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(capped).unwrap_or(self.max_delay)
    }

    /// Every delay the policy will sleep when all attempts fail.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..self.max_attempts).map(|a| self.delay_after(a)).collect()
    }

    /// Compares character counts only, within `tolerance`.
    pub fn accepts(&self, expected: &str, actual: &str) -> bool {
        expected.chars().count().abs_diff(actual.chars().count()) <= self.tolerance
    }
}
