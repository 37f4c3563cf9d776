//! Handler-level API tests against a stubbed messaging client.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tokio::sync::mpsc;

use pl_client::{MessagingClient, SendOutcome};
use pl_domain::Result;
use pl_domain::config::Config;
use pl_gateway::api::{logout, pairing, send, status};
use pl_gateway::state::AppState;
use pl_session::{ControllerCommand, PairingArtifact, SessionPhase, SharedStatus};

struct StubClient {
    outcome: fn() -> Result<SendOutcome>,
}

#[async_trait]
impl MessagingClient for StubClient {
    async fn send_text(&self, _recipient: &str, _body: &str) -> Result<SendOutcome> {
        (self.outcome)()
    }

    fn is_alive(&self) -> bool {
        true
    }

    async fn shutdown(&self) {}
}

fn make_state() -> (AppState, mpsc::Receiver<ControllerCommand>) {
    let (commands, commands_rx) = mpsc::channel(8);
    let state = AppState {
        config: Arc::new(Config::default()),
        status: Arc::new(SharedStatus::new()),
        commands,
        api_token_hash: None,
    };
    (state, commands_rx)
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn status_reports_phase_and_session_id() {
    let (state, _rx) = make_state();
    state.status.set_phase(SessionPhase::AwaitingPairing);
    state.status.set_pairing(PairingArtifact {
        code: "ABCD-1234".into(),
        image_png: None,
    });

    let resp = status::status(State(state)).await.into_response();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["ready"], false);
    assert_eq!(body["phase"], "awaiting_pairing");
    assert_eq!(body["has_pairing_code"], true);
    assert_eq!(body["attempts"], 0);
    assert_eq!(body["session_id"], "primary");
}

#[tokio::test]
async fn pairing_returns_404_outside_pairing_window() {
    let (state, _rx) = make_state();
    let resp = pairing::pairing(State(state)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn pairing_returns_code_and_image() {
    let (state, _rx) = make_state();
    state.status.set_pairing(PairingArtifact {
        code: "ABCD-1234".into(),
        image_png: Some(vec![0x89, 0x50, 0x4e, 0x47]),
    });

    let resp = pairing::pairing(State(state)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["code"], "ABCD-1234");
    assert_eq!(body["image_png_base64"], "iVBORw==");
}

#[tokio::test]
async fn send_rejects_invalid_recipient() {
    let (state, _rx) = make_state();
    let resp = send::send(
        State(state),
        Json(send::SendRequest {
            recipient: "not-a-number".into(),
            message: "hello".into(),
        }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn send_rejects_empty_message() {
    let (state, _rx) = make_state();
    let resp = send::send(
        State(state),
        Json(send::SendRequest {
            recipient: "34612345678".into(),
            message: "   ".into(),
        }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn send_returns_503_when_not_ready() {
    let (state, _rx) = make_state();
    state.status.set_phase(SessionPhase::Authenticating);
    let resp = send::send(
        State(state),
        Json(send::SendRequest {
            recipient: "34612345678".into(),
            message: "hello".into(),
        }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(resp).await;
    assert_eq!(body["success"], false);
    let error = body["error"].as_str().unwrap();
    assert!(error.starts_with("not ready:"), "unexpected error: {error}");
    assert!(error.contains("authenticating"), "unexpected error: {error}");
}

#[tokio::test]
async fn send_delegates_to_live_client() {
    let (state, _rx) = make_state();
    state.status.set_phase(SessionPhase::Ready);
    state.status.set_client(Some(Arc::new(StubClient {
        outcome: || {
            Ok(SendOutcome::Sent {
                message_id: Some("m1".into()),
            })
        },
    })));

    // Local-format number gets the default country code prefixed.
    let resp = send::send(
        State(state),
        Json(send::SendRequest {
            recipient: "612 345 678".into(),
            message: "hello".into(),
        }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["recipient"], "34612345678");
    assert_eq!(body["message_id"], "m1");
}

#[tokio::test]
async fn send_reports_unreachable_recipient() {
    let (state, _rx) = make_state();
    state.status.set_phase(SessionPhase::Ready);
    state.status.set_client(Some(Arc::new(StubClient {
        outcome: || Ok(SendOutcome::Unreachable),
    })));

    let resp = send::send(
        State(state),
        Json(send::SendRequest {
            recipient: "34612345678".into(),
            message: "hello".into(),
        }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(resp).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn send_surfaces_delegate_failure() {
    let (state, _rx) = make_state();
    state.status.set_phase(SessionPhase::Ready);
    state.status.set_client(Some(Arc::new(StubClient {
        outcome: || Err(pl_domain::Error::DelegateSend("backend timed out".into())),
    })));

    let resp = send::send(
        State(state),
        Json(send::SendRequest {
            recipient: "34612345678".into(),
            message: "hello".into(),
        }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn logout_enqueues_controller_command() {
    let (state, mut rx) = make_state();
    let resp = logout::logout(State(state)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(rx.try_recv().unwrap(), ControllerCommand::Logout);
}
