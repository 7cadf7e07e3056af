//! Delay strategy between unsuccessful live-mode polls.

use std::time::Duration;

/// Default delay before the first retry
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 30;

/// Default cap on the delay between retries
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 150;

/// How the delay grows after each unsuccessful poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffGrowth {
    /// Always wait `initial`.
    Fixed,
    /// Add a fixed step after each retry.
    Linear(Duration),
    /// Double the delay after each retry.
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub growth: BackoffGrowth,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy {
            initial: Duration::from_secs(DEFAULT_BACKOFF_MIN_SECS),
            max: Duration::from_secs(DEFAULT_BACKOFF_MAX_SECS),
            growth: BackoffGrowth::Exponential,
        }
    }
}

impl BackoffPolicy {
    pub fn fixed(delay: Duration) -> Self {
        BackoffPolicy {
            initial: delay,
            max: delay,
            growth: BackoffGrowth::Fixed,
        }
    }
}

/// Backoff state: the delay to wait before the next retry.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    current: Duration,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Backoff {
            policy,
            current: policy.initial,
        }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Delay to wait now. Grows the delay for the following call.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        let grown = match self.policy.growth {
            BackoffGrowth::Fixed => self.policy.initial,
            BackoffGrowth::Linear(step) => self.current.saturating_add(step),
            BackoffGrowth::Exponential => self.current.saturating_mul(2),
        };
        self.current = grown.min(self.policy.max).max(self.policy.initial);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.policy.initial;
    }
}
