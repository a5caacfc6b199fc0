//! # Reconnect Backoff
//!
//! Exponential delay between reconnect attempts, capped, with a fixed
//! attempt budget. No jitter.

use crate::shared::AgentConfig;
use std::time::Duration;

/// Backoff parameters for the reconnection agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the first retry
    pub base: Duration,
    /// No delay exceeds this
    pub cap: Duration,
    /// Retries scheduled before giving up
    pub max_attempts: u32,
}

impl BackoffPolicy {
    pub fn new(base: Duration, cap: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            cap,
            max_attempts,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.base_interval, config.cap_interval, config.max_attempts)
    }

    /// `min(base * 2^attempt, cap)`, saturating instead of overflowing
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// Whether another retry may be scheduled after `attempts` retries
    pub fn allows(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(2000), Duration::from_millis(30_000), 10)
    }
}
