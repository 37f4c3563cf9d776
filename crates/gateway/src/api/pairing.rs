//! Pairing artifact endpoint.
//!
//! - `GET /pairing` — current pairing code (and scannable image when the
//!   backend provides one). 404 outside the pairing window; the code is
//!   cleared the moment authentication succeeds.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use super::api_error;
use crate::state::AppState;

pub async fn pairing(State(state): State<AppState>) -> Response {
    let artifact = match state.status.pairing_artifact() {
        Some(a) => a,
        None => return api_error(StatusCode::NOT_FOUND, "no pairing in progress"),
    };

    Json(serde_json::json!({
        "code": artifact.code,
        "image_png_base64": artifact.image_png.map(|png| BASE64.encode(png)),
    }))
    .into_response()
}
