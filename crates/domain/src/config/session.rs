use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session persistence
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Logical session identity. One authoritative blob exists in
    /// the store per id; a put replaces any prior value.
    #[serde(default = "d_session_id")]
    pub session_id: String,
    /// Local staging directory the messaging client reads/writes its
    /// credential artifacts in. Recreated from the stored blob on start.
    #[serde(default = "d_data_dir")]
    pub data_dir: PathBuf,
    /// Periodic best-effort save while READY, guarding against missed
    /// event-triggered saves.
    #[serde(default = "d_backstop_minutes")]
    pub backstop_save_minutes: u64,
    /// Delay between the `authenticated` event and the first save, giving
    /// the client time to flush its local artifact to disk.
    #[serde(default = "d_post_auth_delay")]
    pub post_auth_save_secs: u64,
    /// Poll interval while waiting for the local artifact to materialize.
    #[serde(default = "d_poll_ms")]
    pub artifact_poll_ms: u64,
    /// Hard deadline on that wait; after this the encode attempt is
    /// abandoned and logged.
    #[serde(default = "d_artifact_timeout")]
    pub artifact_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: d_session_id(),
            data_dir: d_data_dir(),
            backstop_save_minutes: 10,
            post_auth_save_secs: 20,
            artifact_poll_ms: 500,
            artifact_timeout_secs: 60,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_session_id() -> String {
    "primary".into()
}
fn d_data_dir() -> PathBuf {
    PathBuf::from("./data/session")
}
fn d_backstop_minutes() -> u64 {
    10
}
fn d_post_auth_delay() -> u64 {
    20
}
fn d_poll_ms() -> u64 {
    500
}
fn d_artifact_timeout() -> u64 {
    60
}
