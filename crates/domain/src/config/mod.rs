mod messaging;
mod retry;
mod server;
mod session;
mod store;

pub use messaging::*;
pub use retry::*;
pub use server::*;
pub use session::*;
pub use store::*;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: BlobStoreConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub messaging: MessagingConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    /// Load and parse the TOML config file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("cannot parse {}: {e}", path.display())))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let mut error = |field: &str, message: String| {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: field.into(),
                message,
            });
        };

        if self.server.port == 0 {
            error("server.port", "port must be greater than 0".into());
        }
        if self.server.host.is_empty() {
            error("server.host", "host must not be empty".into());
        }
        if let Some(rl) = &self.server.rate_limit {
            if rl.requests_per_second == 0 {
                error(
                    "server.rate_limit.requests_per_second",
                    "must be greater than 0".into(),
                );
            }
            if rl.burst_size == 0 {
                error("server.rate_limit.burst_size", "must be greater than 0".into());
            }
        }

        if self.store.base_url.is_empty() {
            error("store.base_url", "base_url must not be empty".into());
        }
        if self.store.timeout_ms == 0 {
            error("store.timeout_ms", "timeout must be greater than 0".into());
        }

        if self.session.session_id.is_empty() {
            error("session.session_id", "session_id must not be empty".into());
        }
        if self.session.artifact_poll_ms == 0 {
            error("session.artifact_poll_ms", "poll interval must be greater than 0".into());
        }

        if self.messaging.backend_command.is_empty() {
            error("messaging.backend_command", "backend command must not be empty".into());
        }
        if self.messaging.min_digits > self.messaging.max_digits {
            error(
                "messaging.min_digits",
                format!(
                    "min_digits ({}) exceeds max_digits ({})",
                    self.messaging.min_digits, self.messaging.max_digits
                ),
            );
        }
        if !self
            .messaging
            .default_country_code
            .chars()
            .all(|c| c.is_ascii_digit())
        {
            error(
                "messaging.default_country_code",
                "country code must be digits only".into(),
            );
        }
        if self.messaging.max_message_len == 0 {
            error("messaging.max_message_len", "must be greater than 0".into());
        }

        if self.retry.base_delay_secs == 0 {
            error("retry.base_delay_secs", "must be greater than 0".into());
        }
        if self.retry.max_delay_secs < self.retry.base_delay_secs {
            error(
                "retry.max_delay_secs",
                "max delay must be at least the base delay".into(),
            );
        }

        // Warn on permissive CORS — the gateway sends real messages.
        if self.server.cors.allowed_origins.iter().any(|o| o == "*") {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard origin allows any site to call this API".into(),
            });
        }

        errors
    }
}
