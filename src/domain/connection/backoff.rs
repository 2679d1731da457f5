//! Capped exponential backoff for reconnection.

use std::time::Duration;

/// Backoff parameters for one topic's reconnection controller.
///
/// # Default Values
///
/// - `base_delay`: 1 second
/// - `max_delay`: 30 seconds
/// - `max_attempts`: 5
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the retry scheduled when `attempt` retries already happened.
    ///
    /// `min(base * 2^attempt, max)`, saturating instead of overflowing.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// What the controller wants after an unexpected closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Schedule retry number `attempt` (1-based) after `delay`.
    Retry { attempt: u32, delay: Duration },
    /// Attempts are used up; report terminal failure and stop.
    Exhausted,
}

impl RetryDecision {
    /// The first retry of a streak is the only one that notifies.
    pub fn is_first_retry(&self) -> bool {
        matches!(self, RetryDecision::Retry { attempt: 1, .. })
    }
}

/// Attempt counter driven by connection events.
#[derive(Debug, Clone)]
pub struct ReconnectController {
    policy: ReconnectPolicy,
    attempt: u32,
    exhausted: bool,
}

impl ReconnectController {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempt: 0,
            exhausted: false,
        }
    }

    /// Transport acknowledged open; the streak is over.
    pub fn on_open(&mut self) {
        self.attempt = 0;
    }

    /// An unexpected closure or failed attempt happened.
    pub fn on_unexpected_close(&mut self) -> RetryDecision {
        if self.exhausted || self.attempt >= self.policy.max_attempts {
            self.exhausted = true;
            return RetryDecision::Exhausted;
        }
        let delay = self.policy.delay_for_attempt(self.attempt);
        self.attempt += 1;
        RetryDecision::Retry {
            attempt: self.attempt,
            delay,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_delays_double_from_one_second() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u64> = (0..5)
            .map(|n| policy.delay_for_attempt(n).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000]);
    }

    #[test]
    fn delay_is_capped() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(30_000));
        assert_eq!(policy.delay_for_attempt(64), Duration::from_millis(30_000));
    }

    #[test]
    fn controller_stops_strictly_after_five_retries() {
        let mut controller = ReconnectController::new(ReconnectPolicy::default());
        let mut delays = Vec::new();
        for _ in 0..5 {
            match controller.on_unexpected_close() {
                RetryDecision::Retry { delay, .. } => delays.push(delay.as_millis() as u64),
                RetryDecision::Exhausted => panic!("exhausted too early"),
            }
        }
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000]);
        assert_eq!(controller.on_unexpected_close(), RetryDecision::Exhausted);
        assert_eq!(controller.on_unexpected_close(), RetryDecision::Exhausted);
        assert!(controller.is_exhausted());
    }

    #[test]
    fn only_the_first_retry_is_flagged_first() {
        let mut controller = ReconnectController::new(ReconnectPolicy::default());
        assert!(controller.on_unexpected_close().is_first_retry());
        assert!(!controller.on_unexpected_close().is_first_retry());
    }

    #[test]
    fn on_open_resets_attempts() {
        let mut controller = ReconnectController::new(ReconnectPolicy::default());
        controller.on_unexpected_close();
        controller.on_unexpected_close();
        controller.on_open();
        assert_eq!(controller.attempts(), 0);
        assert_eq!(
            controller.on_unexpected_close(),
            RetryDecision::Retry {
                attempt: 1,
                delay: Duration::from_millis(1000)
            }
        );
    }

    proptest! {
        #[test]
        fn delay_never_exceeds_cap(base in 1u64..5_000, cap in 1u64..120_000, attempt in 0u32..80) {
            let policy = ReconnectPolicy {
                base_delay: Duration::from_millis(base),
                max_delay: Duration::from_millis(cap),
                max_attempts: 5,
            };
            prop_assert!(policy.delay_for_attempt(attempt) <= Duration::from_millis(cap));
        }

        #[test]
        fn delay_is_monotonic(attempt in 0u32..40) {
            let policy = ReconnectPolicy::default();
            prop_assert!(policy.delay_for_attempt(attempt) <= policy.delay_for_attempt(attempt + 1));
        }
    }
}
