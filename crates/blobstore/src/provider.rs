use async_trait::async_trait;

use pl_domain::Result;

/// Durable key-value persistence for one opaque session blob per id.
///
/// Failure semantics are part of the contract:
/// - `exists` and `get` fail **open** — a transient lookup failure reads
///   as "no session", logged but never raised, so startup falls back to
///   generating a fresh pairing code instead of blocking.
/// - `put` is a single attempt with no internal retry; the lifecycle
///   controller's periodic backstop save is the retry.
/// - `delete` is best-effort; a failed delete must not keep the state
///   machine from re-entering pairing.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Whether a blob exists for `session_id`. `false` on any transport
    /// error.
    async fn exists(&self, session_id: &str) -> bool;

    /// Fetch the blob. `None` both when no record exists and when the
    /// read errors; the two are distinguished only in logs.
    async fn get(&self, session_id: &str) -> Option<Vec<u8>>;

    /// Upsert the blob, replacing any prior value.
    async fn put(&self, session_id: &str, blob: &[u8]) -> Result<()>;

    /// Best-effort delete.
    async fn delete(&self, session_id: &str);
}
