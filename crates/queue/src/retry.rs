//! Retry backoff policy.

use rand::Rng;
use std::time::Duration;

/// Exponential backoff with full jitter.
///
/// The per-task `max_retry` bounds how often this is consulted; the
/// policy itself only shapes the delay curve.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Base delay for the first retry.
    pub initial_delay: Duration,
    /// Ceiling for any computed delay.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub multiplier: f64,
    /// Whether to draw the actual delay uniformly from (0, computed].
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(3600), // 1 hour
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Deterministic backoff for the given attempt number (0-indexed),
    /// before jitter.
    #[must_use]
    pub fn base_delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_secs =
            self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt.min(63) as i32);
        let delay = Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()));

        if delay > self.max_delay {
            self.max_delay
        } else {
            delay
        }
    }

    /// Delay before the next attempt, with full jitter applied so a
    /// burst of failures does not retry in lockstep.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay_for_attempt(attempt);
        if !self.jitter || base.is_zero() {
            return base;
        }
        let millis = base.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(1..=millis.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter() -> RetryConfig {
        RetryConfig {
            jitter: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_exponential_backoff() {
        let config = no_jitter();

        // First retry: 10s
        assert_eq!(config.base_delay_for_attempt(0), Duration::from_secs(10));
        // Second retry: 20s
        assert_eq!(config.base_delay_for_attempt(1), Duration::from_secs(20));
        // Third retry: 40s
        assert_eq!(config.base_delay_for_attempt(2), Duration::from_secs(40));
        // Fourth retry: 80s
        assert_eq!(config.base_delay_for_attempt(3), Duration::from_secs(80));
    }

    #[test]
    fn test_max_delay() {
        let config = RetryConfig {
            initial_delay: Duration::from_secs(1800),
            max_delay: Duration::from_secs(3600),
            multiplier: 2.0,
            jitter: false,
        };

        // Should be capped at max_delay
        assert_eq!(config.base_delay_for_attempt(5), Duration::from_secs(3600));
        assert_eq!(config.base_delay_for_attempt(40), Duration::from_secs(3600));
    }

    #[test]
    fn test_jitter_stays_within_base() {
        let config = RetryConfig::default();
        for attempt in 0..6 {
            let base = config.base_delay_for_attempt(attempt);
            for _ in 0..20 {
                let jittered = config.delay_for_attempt(attempt);
                assert!(jittered <= base);
                assert!(jittered > Duration::ZERO);
            }
        }
    }
}
