use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Messaging backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Settings for the headless automation backend and the recipient
/// normalization rules applied at the send boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// Command to launch the automation backend (the opaque client).
    /// It speaks newline-delimited JSON on stdin/stdout.
    #[serde(default = "d_backend_command")]
    pub backend_command: String,
    #[serde(default)]
    pub backend_args: Vec<String>,
    /// Extra environment variables for the backend process.
    #[serde(default)]
    pub backend_env: HashMap<String, String>,

    /// Country prefix applied to local-format numbers.
    #[serde(default = "d_country_code")]
    pub default_country_code: String,
    /// A recipient with exactly this many digits is treated as a
    /// local-format number and gets the country prefix.
    #[serde(default = "d_local_len")]
    pub local_number_digits: usize,
    /// Accepted digit-count range for a normalized recipient.
    #[serde(default = "d_min_digits")]
    pub min_digits: usize,
    #[serde(default = "d_max_digits")]
    pub max_digits: usize,

    /// Maximum accepted message body length, in characters.
    #[serde(default = "d_max_message_len")]
    pub max_message_len: usize,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            backend_command: d_backend_command(),
            backend_args: Vec::new(),
            backend_env: HashMap::new(),
            default_country_code: d_country_code(),
            local_number_digits: 9,
            min_digits: 8,
            max_digits: 15,
            max_message_len: 4096,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_backend_command() -> String {
    "pairlink-backend".into()
}
fn d_country_code() -> String {
    "34".into()
}
fn d_local_len() -> usize {
    9
}
fn d_min_digits() -> usize {
    8
}
fn d_max_digits() -> usize {
    15
}
fn d_max_message_len() -> usize {
    4096
}
