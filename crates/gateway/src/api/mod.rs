pub mod auth;
pub mod logout;
pub mod pairing;
pub mod send;
pub mod status;

use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::state::AppState;

/// Build the full API router.
///
/// `GET /status` and `GET /health` are public so probes and pairing UIs
/// can poll them; everything that touches the session or the network is
/// gated behind the bearer-token middleware.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/health", get(status::health))
        .route("/status", get(status::status));

    let protected = Router::new()
        .route("/pairing", get(pairing::pairing))
        .route("/send", post(send::send))
        .route("/logout", post(logout::logout))
        .layer(middleware::from_fn_with_state(
            state,
            auth::require_api_token,
        ));

    public.merge(protected)
}

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}
