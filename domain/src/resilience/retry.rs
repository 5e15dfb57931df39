//! Retry policy with exponential backoff
//!
//! Delay before retry `n` (1-based, counted after the failed attempt `n`):
//! `min(base_delay * 2^(n-1), max_delay)`, optionally varied by ±25%.
//! The jitter sample is passed in, so the policy stays deterministic.

use std::time::Duration;

/// Fraction of the delay that jitter may add or remove
pub const JITTER_FRACTION: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Cap applied before jitter
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Whether another attempt may follow attempt number `attempt`
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay to wait after failed attempt `attempt`.
    ///
    /// `jitter_sample` is a uniform sample from `[0, 1)`; it is ignored when
    /// jitter is disabled.
    pub fn delay_for(&self, attempt: u32, jitter_sample: f64) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let base_ms = self.base_delay.as_millis() as u64;
        let exponential_ms = base_ms.saturating_mul(1u64 << exponent);
        let delay_ms = exponential_ms.min(self.max_delay.as_millis() as u64);

        if !self.jitter {
            return Duration::from_millis(delay_ms);
        }

        let sample = jitter_sample.clamp(0.0, 1.0);
        let factor = 1.0 + (sample * 2.0 - 1.0) * JITTER_FRACTION;
        Duration::from_millis((delay_ms as f64 * factor).round().max(0.0) as u64)
    }

    /// Upper bound on the total time spent sleeping between attempts
    pub fn max_total_delay(&self) -> Duration {
        let worst = if self.jitter { 1.0 } else { 0.0 };
        (1..self.max_attempts)
            .map(|attempt| self.delay_for(attempt, worst))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(jitter: bool) -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            jitter,
        }
    }

    #[test]
    fn test_exponential_growth_and_cap() {
        let p = policy(false);
        assert_eq!(p.delay_for(1, 0.0), Duration::from_millis(100));
        assert_eq!(p.delay_for(2, 0.0), Duration::from_millis(200));
        assert_eq!(p.delay_for(3, 0.0), Duration::from_millis(400));
        assert_eq!(p.delay_for(4, 0.0), Duration::from_millis(500));
        assert_eq!(p.delay_for(40, 0.0), Duration::from_millis(500));
    }

    #[test]
    fn test_jitter_bounds() {
        let p = policy(true);
        assert_eq!(p.delay_for(1, 0.0), Duration::from_millis(75));
        assert_eq!(p.delay_for(1, 0.5), Duration::from_millis(100));
        assert_eq!(p.delay_for(1, 1.0), Duration::from_millis(125));
    }

    #[test]
    fn test_should_retry() {
        let p = RetryPolicy::default();
        assert!(p.should_retry(1));
        assert!(p.should_retry(2));
        assert!(!p.should_retry(3));
        assert!(!RetryPolicy::no_retry().should_retry(1));
    }

    #[test]
    fn test_max_total_delay() {
        let p = policy(false);
        // 100 + 200 + 400 + 500
        assert_eq!(p.max_total_delay(), Duration::from_millis(1200));
    }
}
