//! Retry/backoff as a pure state machine.
//!
//! The caller owns the sleeping; [`RetryState`] only decides whether another
//! attempt is allowed and how long to wait before it.

use std::time::Duration;

use lexlineage_core::OracleConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            multiplier: 2,
            max_delay: Duration::from_secs(8),
        }
    }
}

impl From<&OracleConfig> for RetryPolicy {
    fn from(config: &OracleConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    failures: u32,
    next_delay: Duration,
}

impl RetryState {
    pub fn new(policy: RetryPolicy) -> Self {
        let next_delay = policy.base_delay.min(policy.max_delay);
        Self {
            policy,
            failures: 0,
            next_delay,
        }
    }

    /// Failed attempts recorded so far.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Record a failed attempt and decide what happens next.
    pub fn on_failure(&mut self) -> RetryDecision {
        self.failures += 1;
        if self.failures >= self.policy.max_attempts {
            return RetryDecision::GiveUp;
        }
        let delay = self.next_delay;
        self.next_delay = delay
            .saturating_mul(self.policy.multiplier)
            .min(self.policy.max_delay);
        RetryDecision::RetryAfter(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> RetryDecision {
        RetryDecision::RetryAfter(Duration::from_millis(n))
    }

    #[test]
    fn default_policy_gives_three_attempts() {
        let mut state = RetryState::new(RetryPolicy::default());
        assert_eq!(state.on_failure(), ms(500));
        assert_eq!(state.on_failure(), ms(1000));
        assert_eq!(state.on_failure(), RetryDecision::GiveUp);
        assert_eq!(state.failures(), 3);
    }

    #[test]
    fn delay_is_capped() {
        let mut state = RetryState::new(RetryPolicy {
            max_attempts: 6,
            base_delay: Duration::from_millis(500),
            multiplier: 2,
            max_delay: Duration::from_millis(1500),
        });
        let decisions: Vec<_> = (0..6).map(|_| state.on_failure()).collect();
        assert_eq!(
            decisions,
            vec![ms(500), ms(1000), ms(1500), ms(1500), ms(1500), RetryDecision::GiveUp]
        );
    }

    #[test]
    fn single_attempt_never_retries() {
        let mut state = RetryState::new(RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        });
        assert_eq!(state.on_failure(), RetryDecision::GiveUp);
    }

    #[test]
    fn policy_from_config() {
        let config = OracleConfig {
            max_attempts: 5,
            base_delay_ms: 100,
            max_delay_ms: 400,
            ..OracleConfig::default()
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay, Duration::from_millis(100));
        assert_eq!(policy.max_delay, Duration::from_millis(400));
        assert_eq!(policy.multiplier, 2);
    }
}
