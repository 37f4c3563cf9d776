//! Health probe and session status endpoints (public, no auth).

use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /health — lightweight liveness probe
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /status — session lifecycle snapshot
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.status.snapshot();
    Json(serde_json::json!({
        "ready": snapshot.phase == pl_session::SessionPhase::Ready,
        "has_pairing_code": snapshot.pairing_pending,
        "attempts": snapshot.reconnect_attempts,
        "phase": snapshot.phase,
        "last_disconnect_reason": snapshot.last_disconnect_reason,
        "session_id": state.config.session.session_id,
    }))
}
