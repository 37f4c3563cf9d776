//! In-memory [`BlobStore`] with failure injection.
//!
//! Used by the controller test suite and usable as a non-durable store
//! for single-box deployments where losing the session on restart is
//! acceptable.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use pl_domain::error::{Error, Result};

use crate::provider::BlobStore;

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    fail_puts: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `put` calls fail with a transient store error.
    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `exists`/`get` calls behave like a broken remote:
    /// `false`/`None` regardless of contents.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Direct peek for assertions, bypassing the fail-open semantics.
    pub fn raw_get(&self, session_id: &str) -> Option<Vec<u8>> {
        self.blobs.lock().get(session_id).cloned()
    }

    /// Seed a blob directly.
    pub fn raw_put(&self, session_id: &str, blob: Vec<u8>) {
        self.blobs.lock().insert(session_id.to_owned(), blob);
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn exists(&self, session_id: &str) -> bool {
        if self.fail_reads.load(Ordering::SeqCst) {
            tracing::warn!(session_id, "injected read failure, treating as absent");
            return false;
        }
        self.blobs.lock().contains_key(session_id)
    }

    async fn get(&self, session_id: &str) -> Option<Vec<u8>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            tracing::warn!(session_id, "injected read failure, treating as absent");
            return None;
        }
        self.blobs.lock().get(session_id).cloned()
    }

    async fn put(&self, session_id: &str, blob: &[u8]) -> Result<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(Error::TransientStore("injected put failure".into()));
        }
        self.blobs
            .lock()
            .insert(session_id.to_owned(), blob.to_vec());
        Ok(())
    }

    async fn delete(&self, session_id: &str) {
        self.blobs.lock().remove(session_id);
    }
}
