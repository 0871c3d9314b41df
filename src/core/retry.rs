//! Retry policy and exponential backoff for batch delivery

use super::error::{Result, ShipperError};
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Resubmissions allowed after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Add up to half of the current delay at random
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_delay < self.base_delay {
            return Err(ShipperError::config(
                "RetryPolicy",
                format!(
                    "max_delay ({:?}) is shorter than base_delay ({:?})",
                    self.max_delay, self.base_delay
                ),
            ));
        }
        Ok(())
    }

    /// Start a fresh backoff sequence
    pub fn backoff(&self) -> Backoff {
        Backoff {
            policy: self.clone(),
            attempt: 0,
            last: Duration::ZERO,
        }
    }
}

/// Exponential backoff sequence: `base * 2^n`, capped at `max_delay`.
///
/// Successive delays never decrease, jitter included.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    attempt: u32,
    last: Duration,
}

impl Backoff {
    pub fn next_delay(&mut self) -> Duration {
        let factor = 2u32.saturating_pow(self.attempt);
        let mut delay = self
            .policy
            .base_delay
            .saturating_mul(factor)
            .min(self.policy.max_delay);

        if self.policy.jitter && !delay.is_zero() {
            let spread = (delay.as_millis() / 2) as u64;
            let extra = rand::thread_rng().gen_range(0..=spread);
            delay = delay
                .saturating_add(Duration::from_millis(extra))
                .min(self.policy.max_delay);
        }

        let delay = delay.max(self.last);
        self.last = delay;
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Number of delays handed out so far
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_without_jitter() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            jitter: false,
        };
        let mut backoff = policy.backoff();
        let delays: Vec<_> = (0..5).map(|_| backoff.next_delay().as_millis()).collect();
        assert_eq!(delays, vec![10, 20, 40, 50, 50]);
        assert_eq!(backoff.attempt(), 5);
    }

    #[test]
    fn test_jitter_non_decreasing_and_capped() {
        let policy = RetryPolicy {
            max_retries: 20,
            base_delay: Duration::from_millis(7),
            max_delay: Duration::from_millis(300),
            jitter: true,
        };
        for _ in 0..50 {
            let mut backoff = policy.backoff();
            let mut previous = Duration::ZERO;
            for _ in 0..20 {
                let delay = backoff.next_delay();
                assert!(delay >= previous);
                assert!(delay <= policy.max_delay);
                previous = delay;
            }
        }
    }

    #[test]
    fn test_validate() {
        assert!(RetryPolicy::default().validate().is_ok());
        let policy = RetryPolicy {
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(1),
            ..RetryPolicy::default()
        };
        assert!(policy.validate().is_err());
    }
}
