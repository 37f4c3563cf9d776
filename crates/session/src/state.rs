//! Observable session state shared between the lifecycle controller and
//! the HTTP surface.
//!
//! The controller is the only writer; handlers read snapshots. The lock
//! is never held across an await point.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::Serialize;

use pl_client::{DisconnectReason, MessagingClient};

/// Lifecycle phase of the messaging session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Starting,
    AwaitingPairing,
    Authenticating,
    Ready,
    Disconnected,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::AwaitingPairing => "awaiting_pairing",
            Self::Authenticating => "authenticating",
            Self::Ready => "ready",
            Self::Disconnected => "disconnected",
        }
    }
}

/// Pairing artifact cached for re-serving while pairing is pending.
#[derive(Debug, Clone)]
pub struct PairingArtifact {
    pub code: String,
    pub image_png: Option<Vec<u8>>,
}

/// Point-in-time view for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub phase: SessionPhase,
    pub pairing_pending: bool,
    pub reconnect_attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_disconnect_reason: Option<String>,
}

#[derive(Default)]
struct Inner {
    phase: Option<SessionPhase>,
    pairing: Option<PairingArtifact>,
    attempts: u32,
    last_disconnect: Option<(Instant, DisconnectReason)>,
    client: Option<Arc<dyn MessagingClient>>,
}

/// Shared handle over the session's observable state.
pub struct SharedStatus {
    inner: RwLock<Inner>,
}

impl Default for SharedStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedStatus {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let inner = self.inner.read();
        StatusSnapshot {
            phase: inner.phase.unwrap_or(SessionPhase::Starting),
            pairing_pending: inner.pairing.is_some(),
            reconnect_attempts: inner.attempts,
            last_disconnect_reason: inner
                .last_disconnect
                .as_ref()
                .map(|(_, reason)| reason.to_string()),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.read().phase.unwrap_or(SessionPhase::Starting)
    }

    pub fn pairing_artifact(&self) -> Option<PairingArtifact> {
        self.inner.read().pairing.clone()
    }

    /// Current client handle, if a cycle has one launched.
    pub fn client(&self) -> Option<Arc<dyn MessagingClient>> {
        self.inner.read().client.clone()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.read().attempts
    }

    // ── controller-side mutation ──────────────────────────────────

    pub fn set_phase(&self, phase: SessionPhase) {
        self.inner.write().phase = Some(phase);
    }

    pub fn set_pairing(&self, artifact: PairingArtifact) {
        self.inner.write().pairing = Some(artifact);
    }

    pub fn clear_pairing(&self) {
        self.inner.write().pairing = None;
    }

    /// Bump the reconnect counter and return the new value.
    pub fn increment_attempts(&self) -> u32 {
        let mut inner = self.inner.write();
        inner.attempts = inner.attempts.saturating_add(1);
        inner.attempts
    }

    pub fn reset_attempts(&self) {
        self.inner.write().attempts = 0;
    }

    pub fn set_disconnect(&self, reason: DisconnectReason) {
        let mut inner = self.inner.write();
        inner.phase = Some(SessionPhase::Disconnected);
        inner.last_disconnect = Some((Instant::now(), reason));
    }

    pub fn set_client(&self, client: Option<Arc<dyn MessagingClient>>) {
        self.inner.write().client = client;
    }

    /// Reset per-cycle state at the start of a connection cycle. The
    /// reconnect counter deliberately survives; it resets only on Ready.
    pub fn begin_cycle(&self) {
        let mut inner = self.inner.write();
        inner.phase = Some(SessionPhase::Starting);
        inner.pairing = None;
        inner.client = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_defaults_to_starting() {
        let status = SharedStatus::new();
        let snap = status.snapshot();
        assert_eq!(snap.phase, SessionPhase::Starting);
        assert!(!snap.pairing_pending);
        assert_eq!(snap.reconnect_attempts, 0);
        assert!(snap.last_disconnect_reason.is_none());
    }

    #[test]
    fn attempts_survive_begin_cycle() {
        let status = SharedStatus::new();
        assert_eq!(status.increment_attempts(), 1);
        assert_eq!(status.increment_attempts(), 2);
        status.begin_cycle();
        assert_eq!(status.reconnect_attempts(), 2);
        status.reset_attempts();
        assert_eq!(status.reconnect_attempts(), 0);
    }

    #[test]
    fn begin_cycle_clears_pairing_and_client() {
        let status = SharedStatus::new();
        status.set_pairing(PairingArtifact {
            code: "ABCD-1234".into(),
            image_png: None,
        });
        status.set_phase(SessionPhase::AwaitingPairing);
        status.begin_cycle();
        assert!(status.pairing_artifact().is_none());
        assert!(status.client().is_none());
        assert_eq!(status.phase(), SessionPhase::Starting);
    }

    #[test]
    fn disconnect_records_reason() {
        let status = SharedStatus::new();
        status.set_disconnect(DisconnectReason::Other("stream closed".into()));
        let snap = status.snapshot();
        assert_eq!(snap.phase, SessionPhase::Disconnected);
        assert_eq!(snap.last_disconnect_reason.as_deref(), Some("stream closed"));
    }

    #[test]
    fn phase_serializes_snake_case() {
        let json = serde_json::to_string(&SessionPhase::AwaitingPairing).unwrap();
        assert_eq!(json, "\"awaiting_pairing\"");
    }
}
