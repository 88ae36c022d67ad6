//! Backoff calculations for retried requests

use hubcas_config::RetryConfig;
use std::time::Duration;

/// Jittered exponential backoff with an attempt ceiling
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: config.initial_delay(),
            max_delay: config.max_delay(),
            backoff_multiplier: config.backoff_multiplier,
            jitter_factor: config.jitter_factor,
        }
    }
}

impl RetryPolicy {
    /// Whether another attempt is allowed after `attempt` (1-based) failed
    #[must_use]
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before retry number `attempt` (1-based)
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.delay_with_jitter(attempt, rand::random::<f64>())
    }

    /// Delay for `attempt` with the random draw supplied by the caller,
    /// `unit` being in `[0, 1)`
    #[must_use]
    pub fn delay_with_jitter(&self, attempt: u32, unit: f64) -> Duration {
        // Precision loss acceptable for backoff calculations
        #[allow(clippy::cast_precision_loss)]
        let base_delay = self.initial_delay.as_millis().min(u128::from(u64::MAX)) as f64;
        #[allow(clippy::cast_precision_loss)]
        let max_delay = self.max_delay.as_millis().min(u128::from(u64::MAX)) as f64;

        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay = (base_delay * self.backoff_multiplier.powi(exponent)).min(max_delay);

        let jitter = delay * self.jitter_factor * (unit - 0.5);
        // max(0.0) keeps the value non-negative before the cast
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let final_delay = (delay + jitter).max(0.0).round() as u64;

        Duration::from_millis(final_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 4,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1_000),
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }

    #[test]
    fn delay_grows_and_caps() {
        let p = policy();
        assert_eq!(p.delay_with_jitter(1, 0.5), Duration::from_millis(100));
        assert_eq!(p.delay_with_jitter(2, 0.5), Duration::from_millis(200));
        assert_eq!(p.delay_with_jitter(3, 0.5), Duration::from_millis(400));
        assert_eq!(p.delay_with_jitter(10, 0.5), Duration::from_millis(1_000));
    }

    #[test]
    fn jitter_stays_within_band() {
        let p = policy();
        assert_eq!(p.delay_with_jitter(1, 0.0), Duration::from_millis(90));
        assert_eq!(p.delay_with_jitter(1, 1.0), Duration::from_millis(110));
        for _ in 0..100 {
            let d = p.delay_for(2).as_millis();
            assert!((180..=220).contains(&d), "{d}");
        }
    }

    #[test]
    fn attempt_ceiling() {
        let p = policy();
        assert!(p.allows_retry_after(3));
        assert!(!p.allows_retry_after(4));
    }
}
