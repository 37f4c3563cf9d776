use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Reconnect policy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Base reconnect delay; the scheduled delay is
    /// `min(base * attempt, max)`.
    #[serde(default = "d_base_secs")]
    pub base_delay_secs: u64,
    /// Ceiling on the reconnect delay.
    #[serde(default = "d_max_secs")]
    pub max_delay_secs: u64,
    /// Fixed delay after a credential rejection. Not exponential —
    /// an auth failure is not a transient capacity problem.
    #[serde(default = "d_auth_secs")]
    pub auth_failure_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_secs: 5,
            max_delay_secs: 300,
            auth_failure_delay_secs: 15,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_base_secs() -> u64 {
    5
}
fn d_max_secs() -> u64 {
    300
}
fn d_auth_secs() -> u64 {
    15
}
