//! Message delegation endpoint.
//!
//! - `POST /send` — validate, normalize the recipient, and hand the
//!   message to the live client. Fire-once: the outcome (including
//!   failure) is surfaced verbatim; the gateway never queues or retries.

use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use pl_client::SendOutcome;
use pl_domain::Error;
use pl_domain::recipient::{normalize_recipient, validate_message};
use pl_session::SessionPhase;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub recipient: String,
    pub message: String,
}

/// Send errors carry `{ "success": false, "error": "<message>" }` so
/// callers can branch on one field for both outcomes.
fn send_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "success": false, "error": message.into() })),
    )
        .into_response()
}

pub async fn send(State(state): State<AppState>, Json(req): Json<SendRequest>) -> Response {
    let recipient = match normalize_recipient(&req.recipient, &state.config.messaging) {
        Ok(r) => r,
        Err(e) => return send_error(StatusCode::BAD_REQUEST, e.to_string()),
    };
    if let Err(e) = validate_message(&req.message, &state.config.messaging) {
        return send_error(StatusCode::BAD_REQUEST, e.to_string());
    }

    // Phase and client handle come from the same snapshot source the
    // controller writes; a disconnect between this check and the send
    // surfaces as a send error, never a queue.
    let phase = state.status.phase();
    if phase != SessionPhase::Ready {
        let err = Error::NotReady(format!("session phase is {}", phase.as_str()));
        return send_error(StatusCode::SERVICE_UNAVAILABLE, err.to_string());
    }
    let client = match state.status.client() {
        Some(c) => c,
        None => {
            let err = Error::NotReady("no live client instance".into());
            return send_error(StatusCode::SERVICE_UNAVAILABLE, err.to_string());
        }
    };

    match client.send_text(&recipient, &req.message).await {
        Ok(SendOutcome::Sent { message_id }) => {
            tracing::info!(recipient = %recipient, "message sent");
            Json(serde_json::json!({
                "success": true,
                "recipient": recipient,
                "message_id": message_id,
            }))
            .into_response()
        }
        Ok(SendOutcome::Unreachable) => send_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("recipient {recipient} is not reachable on the network"),
        ),
        Err(e) => {
            tracing::error!(recipient = %recipient, error = %e, "send failed");
            send_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
