//! Logout endpoint.
//!
//! - `POST /logout` — enqueue a logout command. The controller tears the
//!   live session down, deletes the stored blob, and restarts into fresh
//!   pairing. Accepted in any phase; logging out an unpaired session is
//!   a no-op restart.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use pl_session::ControllerCommand;

use super::api_error;
use crate::state::AppState;

pub async fn logout(State(state): State<AppState>) -> Response {
    if state
        .commands
        .send(ControllerCommand::Logout)
        .await
        .is_err()
    {
        return api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "lifecycle controller is not running",
        );
    }

    Json(serde_json::json!({ "success": true })).into_response()
}
