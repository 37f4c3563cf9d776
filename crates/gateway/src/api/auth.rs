//! API authentication middleware.
//!
//! The env var named by `config.server.api_token_env` (default
//! `PL_API_TOKEN`) is read **once at startup** and its SHA-256 digest
//! cached in `AppState`. With a token configured, every protected
//! request must carry `Authorization: Bearer <token>`; without one the
//! server logs a warning once and allows unauthenticated access
//! (dev mode).

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::state::AppState;

/// Axum middleware that enforces bearer-token authentication on protected
/// routes. Attach via `axum::middleware::from_fn_with_state`.
pub async fn require_api_token(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let expected_hash = match &state.api_token_hash {
        // Dev mode: no token configured.
        None => return next.run(req).await,
        Some(h) => h,
    };

    let provided = bearer_token(&req).unwrap_or("");
    if !token_matches(expected_hash, provided) {
        return (
            StatusCode::UNAUTHORIZED,
            axum::Json(serde_json::json!({ "error": "invalid or missing API token" })),
        )
            .into_response();
    }

    next.run(req).await
}

/// Pull the bearer token out of the `Authorization` header, if any.
fn bearer_token(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Compare a presented token against the cached digest.
///
/// The token is hashed to a fixed-length digest first, then compared in
/// constant time, so neither the comparison nor the digest length leaks
/// anything about the real token.
fn token_matches(expected_hash: &[u8], provided: &str) -> bool {
    let provided_hash = Sha256::digest(provided.as_bytes());
    bool::from(provided_hash.ct_eq(expected_hash))
}
