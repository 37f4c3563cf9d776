use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Blob store connection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Connection settings for the remote session blob store.
///
/// The store is an opaque key-value blob API; every call is a single
/// attempt with this timeout.  Retrying is the lifecycle controller's
/// job (via the periodic backstop save), never the store client's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobStoreConfig {
    #[serde(default = "d_store_url")]
    pub base_url: String,
    /// Environment variable holding the store API key. Unset or empty
    /// means the store is called unauthenticated.
    #[serde(default = "d_store_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_8000")]
    pub timeout_ms: u64,
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        Self {
            base_url: d_store_url(),
            api_key_env: d_store_key_env(),
            timeout_ms: 8000,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_store_url() -> String {
    "http://localhost:5600".into()
}
fn d_store_key_env() -> String {
    "PL_STORE_API_KEY".into()
}
fn d_8000() -> u64 {
    8000
}
