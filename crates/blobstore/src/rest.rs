//! REST implementation of [`BlobStore`].
//!
//! `RestBlobStore` wraps a `reqwest::Client` and maps each trait method
//! to one call against the remote blob API. Unlike a general-purpose
//! client there is **no retry engine here**: the session contract says a
//! failed put is retried by the controller's own periodic backstop, and a
//! failed read degrades to "no session". Each call is a single attempt
//! bounded by the configured timeout.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::{Client, RequestBuilder, StatusCode};
use uuid::Uuid;

use pl_domain::config::BlobStoreConfig;
use pl_domain::error::{Error, Result};

use crate::provider::BlobStore;
use crate::types::{BlobRecord, PutBlobRequest};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A REST-based client for the remote session blob store.
///
/// Created once and reused for the lifetime of the gateway process; the
/// underlying `reqwest::Client` maintains a connection pool.
#[derive(Debug, Clone)]
pub struct RestBlobStore {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl RestBlobStore {
    /// Build a new client from the shared [`BlobStoreConfig`].
    ///
    /// The API key is read from the configured env var once, here, not on
    /// every call.
    pub fn new(cfg: &BlobStoreConfig) -> Result<Self> {
        let timeout = Duration::from_millis(cfg.timeout_ms);
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        let api_key = std::env::var(&cfg.api_key_env)
            .ok()
            .filter(|v| !v.is_empty());

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
            api_key,
        })
    }

    // ── request helpers ──────────────────────────────────────────────

    /// Decorate a `RequestBuilder` with the standard PairLink headers.
    fn decorate(&self, rb: RequestBuilder) -> RequestBuilder {
        let trace_id = Uuid::new_v4().to_string();
        let mut rb = rb
            .header("X-Client-Type", "pairlink")
            .header("X-Trace-Id", &trace_id);

        if let Some(ref key) = self.api_key {
            rb = rb.header("X-Api-Key", key);
        }
        rb
    }

    /// Full URL of the record for `session_id`.
    fn url(&self, session_id: &str) -> String {
        format!("{}/api/blobs/{session_id}", self.base_url)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait]
impl BlobStore for RestBlobStore {
    async fn exists(&self, session_id: &str) -> bool {
        let url = self.url(session_id);
        match self.decorate(self.http.head(&url)).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) if resp.status() == StatusCode::NOT_FOUND => false,
            Ok(resp) => {
                tracing::warn!(
                    session_id,
                    status = resp.status().as_u16(),
                    "blob exists check returned an error, treating as absent"
                );
                false
            }
            Err(e) => {
                tracing::warn!(
                    session_id,
                    error = %e,
                    "blob exists check failed, treating as absent"
                );
                false
            }
        }
    }

    async fn get(&self, session_id: &str) -> Option<Vec<u8>> {
        let url = self.url(session_id);
        let resp = match self.decorate(self.http.get(&url)).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(session_id, error = %e, "blob read failed, treating as absent");
                return None;
            }
        };

        if resp.status() == StatusCode::NOT_FOUND {
            tracing::debug!(session_id, "no stored blob");
            return None;
        }
        if !resp.status().is_success() {
            tracing::warn!(
                session_id,
                status = resp.status().as_u16(),
                "blob read returned an error, treating as absent"
            );
            return None;
        }

        let record: BlobRecord = match resp.json().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(session_id, error = %e, "blob record unparseable, treating as absent");
                return None;
            }
        };

        match BASE64.decode(record.data.as_bytes()) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(session_id, error = %e, "blob payload is not valid base64, treating as absent");
                None
            }
        }
    }

    async fn put(&self, session_id: &str, blob: &[u8]) -> Result<()> {
        let url = self.url(session_id);
        let body = PutBlobRequest {
            data: BASE64.encode(blob),
        };

        let resp = self
            .decorate(self.http.put(&url).json(&body))
            .send()
            .await
            .map_err(from_reqwest)?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::TransientStore(format!(
                "put {session_id} returned {status}: {text}"
            )));
        }

        tracing::debug!(session_id, bytes = blob.len(), "session blob stored");
        Ok(())
    }

    async fn delete(&self, session_id: &str) {
        let url = self.url(session_id);
        match self.decorate(self.http.delete(&url)).send().await {
            Ok(resp) if resp.status().is_success() || resp.status() == StatusCode::NOT_FOUND => {
                tracing::debug!(session_id, "session blob deleted");
            }
            Ok(resp) => {
                tracing::warn!(
                    session_id,
                    status = resp.status().as_u16(),
                    "blob delete returned an error, continuing"
                );
            }
            Err(e) => {
                tracing::warn!(session_id, error = %e, "blob delete failed, continuing");
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error conversion helper
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Convert a `reqwest::Error` into a domain error. Timeouts keep their
/// own variant so logs can tell slow stores from broken ones.
fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::TransientStore(e.to_string())
    }
}
