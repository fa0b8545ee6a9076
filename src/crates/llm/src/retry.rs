//! Retry policy for throttled provider calls
//!
//! Exponential backoff with jitter, bounded by a maximum attempt count.
//! Only rate-limit (429) and transient 5xx responses are retried; auth and
//! shape errors surface immediately.

use rand::Rng;
use std::time::Duration;

/// Backoff configuration for retrying throttled calls
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first)
    pub max_attempts: usize,

    /// Initial interval between retries in seconds
    pub initial_interval: f64,

    /// Multiplier for the interval after each retry
    pub backoff_factor: f64,

    /// Maximum interval between retries in seconds
    pub max_interval: f64,

    /// Whether to add random jitter to intervals
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: 0.5,
            backoff_factor: 2.0,
            max_interval: 8.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given attempt cap and default backoff
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Disable jitter (deterministic delays, used in tests)
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Delay before retrying after `attempt` (0-indexed) failed
    ///
    /// Exponential: `initial_interval * backoff_factor^attempt`, capped at
    /// `max_interval`, with an optional jitter factor in [0.5, 1.5].
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let base = self.initial_interval * self.backoff_factor.powi(attempt as i32);
        let capped = base.min(self.max_interval);

        let final_delay = if self.jitter {
            let factor = rand::thread_rng().gen_range(0.5..=1.5);
            capped * factor
        } else {
            capped
        };

        Duration::from_secs_f64(final_delay.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_exponentially() {
        let policy = RetryPolicy::new(5).without_jitter();
        assert_eq!(policy.delay_for(0), Duration::from_secs_f64(0.5));
        assert_eq!(policy.delay_for(1), Duration::from_secs_f64(1.0));
        assert_eq!(policy.delay_for(2), Duration::from_secs_f64(2.0));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_interval: 1.0,
            backoff_factor: 10.0,
            max_interval: 4.0,
            jitter: false,
        };
        assert_eq!(policy.delay_for(5), Duration::from_secs_f64(4.0));
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let policy = RetryPolicy::new(3);
        for attempt in 0..3 {
            let base = 0.5 * 2.0f64.powi(attempt as i32);
            let delay = policy.delay_for(attempt as usize).as_secs_f64();
            assert!(delay >= base * 0.5 - 1e-9);
            assert!(delay <= base * 1.5 + 1e-9);
        }
    }
}
