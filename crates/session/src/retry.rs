//! Restart delay policy.
//!
//! Derived, never persisted: the delay is recomputed from the attempt
//! counter at the moment a restart is scheduled.

use std::time::Duration;

use pl_domain::config::RetryConfig;

/// Controls how the lifecycle controller schedules restart cycles.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Base delay; attempt `n` waits `base * n`.
    pub base_delay: Duration,
    /// Ceiling on the reconnect delay.
    pub max_delay: Duration,
    /// Fixed delay after a credential rejection. Deliberately not
    /// growing: an auth failure is not a transient capacity problem,
    /// and the cycle restarts into fresh pairing anyway.
    pub auth_failure_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self {
            base_delay: Duration::from_secs(cfg.base_delay_secs),
            max_delay: Duration::from_secs(cfg.max_delay_secs),
            auth_failure_delay: Duration::from_secs(cfg.auth_failure_delay_secs),
        }
    }

    /// Delay before reconnect attempt number `attempt` (1-indexed; the
    /// counter has already been incremented for the disconnect being
    /// handled). `min(base * attempt, max)`.
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let scaled = self.base_delay.saturating_mul(attempt);
        scaled.min(self.max_delay)
    }
}
