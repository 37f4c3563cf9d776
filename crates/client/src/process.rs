//! Child-process transport for the automation backend.
//!
//! The backend (a headless browser-automation driver for the messaging
//! network) is spawned as a child process speaking newline-delimited JSON:
//! unsolicited lifecycle `event` objects and id-tagged send responses on
//! stdout, send requests and a shutdown notice on stdin. A dedicated
//! reader task demultiplexes stdout — events go to the controller's
//! channel, responses wake the matching in-flight send.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::{Mutex, mpsc, oneshot};

use pl_domain::config::MessagingConfig;
use pl_domain::error::{Error, Result};

use crate::event::{ClientEvent, DisconnectReason, SendOutcome};
use crate::{ClientFactory, MessagingClient};

/// How long a send waits for the backend's response.
const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Grace period between closing stdin and killing the process.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Maximum number of non-JSON stdout lines tolerated before the backend
/// is declared broken (protects against log spew on stdout).
const MAX_SKIP_LINES: usize = 1000;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire shapes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Serialize)]
struct SendRequest<'a> {
    id: u64,
    op: &'static str,
    recipient: &'a str,
    body: &'a str,
}

#[derive(Serialize)]
struct ShutdownRequest {
    op: &'static str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: u64,
    ok: bool,
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    unreachable: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum WireEvent {
    PairingCode {
        code: String,
        #[serde(default)]
        image_png: Option<String>,
    },
    Authenticated,
    Ready,
    Disconnected {
        #[serde(default)]
        reason: Option<String>,
    },
    AuthFailed {
        #[serde(default)]
        message: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BackendLine {
    Response(SendResponse),
    Event(WireEvent),
}

impl WireEvent {
    fn into_client_event(self) -> ClientEvent {
        match self {
            Self::PairingCode { code, image_png } => {
                let image_png = image_png.and_then(|b64| match BASE64.decode(b64.as_bytes()) {
                    Ok(bytes) => Some(bytes),
                    Err(e) => {
                        tracing::warn!(error = %e, "pairing image is not valid base64, dropping it");
                        None
                    }
                });
                ClientEvent::PairingCode { code, image_png }
            }
            Self::Authenticated => ClientEvent::Authenticated,
            Self::Ready => ClientEvent::Ready,
            Self::Disconnected { reason } => {
                let reason = match reason.as_deref() {
                    Some("logout") => DisconnectReason::Logout,
                    Some(other) => DisconnectReason::Other(other.to_owned()),
                    None => DisconnectReason::Other("unspecified".into()),
                };
                ClientEvent::Disconnected { reason }
            }
            Self::AuthFailed { message } => ClientEvent::AuthFailed {
                message: message.unwrap_or_else(|| "credentials rejected".into()),
            },
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ProcessClient
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<SendResponse>>>>;

/// Messaging client backed by a spawned automation-backend process.
pub struct ProcessClient {
    stdin: Mutex<ChildStdin>,
    child: Mutex<Child>,
    pending: PendingMap,
    next_id: AtomicU64,
    alive: Arc<AtomicBool>,
}

impl ProcessClient {
    /// Spawn the backend for `profile_dir` and start the stdout reader.
    ///
    /// The staging directory is handed to the backend via the
    /// `PL_PROFILE_DIR` environment variable; the backend materializes
    /// and flushes its credential artifacts there.
    pub fn spawn(
        cfg: &MessagingConfig,
        profile_dir: &Path,
        events: mpsc::Sender<ClientEvent>,
    ) -> Result<Arc<Self>> {
        let mut cmd = tokio::process::Command::new(&cfg.backend_command);
        cmd.args(&cfg.backend_args)
            .env("PL_PROFILE_DIR", profile_dir)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true);

        for (key, value) in &cfg.backend_env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(Error::Io)?;

        let stdin = child.stdin.take().ok_or_else(|| {
            Error::ClientTransport("failed to capture backend stdin".into())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            Error::ClientTransport("failed to capture backend stdout".into())
        })?;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let alive = Arc::new(AtomicBool::new(true));

        let client = Arc::new(Self {
            stdin: Mutex::new(stdin),
            child: Mutex::new(child),
            pending: pending.clone(),
            next_id: AtomicU64::new(1),
            alive: alive.clone(),
        });

        tokio::spawn(read_backend_stdout(
            BufReader::new(stdout),
            events,
            pending,
            alive,
        ));

        Ok(client)
    }

    async fn write_line(&self, json: &str) -> Result<()> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(Error::ClientTransport("backend process has exited".into()));
        }
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(json.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl MessagingClient for ProcessClient {
    async fn send_text(&self, recipient: &str, body: &str) -> Result<SendOutcome> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(Error::DelegateSend("backend process has exited".into()));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let req = SendRequest {
            id,
            op: "send",
            recipient,
            body,
        };
        let json = serde_json::to_string(&req)?;

        tracing::debug!(id, recipient, "delegating send to backend");
        if let Err(e) = self.write_line(&json).await {
            self.pending.lock().await.remove(&id);
            return Err(Error::DelegateSend(e.to_string()));
        }

        let resp = match tokio::time::timeout(SEND_TIMEOUT, rx).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(_)) => {
                return Err(Error::DelegateSend("backend closed before responding".into()));
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(Error::DelegateSend("timed out waiting for backend".into()));
            }
        };

        if resp.ok {
            Ok(SendOutcome::Sent {
                message_id: resp.message_id,
            })
        } else if resp.unreachable {
            Ok(SendOutcome::Unreachable)
        } else {
            Err(Error::DelegateSend(
                resp.error.unwrap_or_else(|| "backend rejected the send".into()),
            ))
        }
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) {
        // Mark dead first so no new sends enter the pipe.
        let was_alive = self.alive.swap(false, Ordering::SeqCst);

        let mut child = self.child.lock().await;
        if was_alive {
            // Ask nicely, then close stdin to signal EOF.
            let mut stdin = self.stdin.lock().await;
            let notice = ShutdownRequest { op: "shutdown" };
            if let Ok(json) = serde_json::to_string(&notice) {
                let _ = stdin.write_all(json.as_bytes()).await;
                let _ = stdin.write_all(b"\n").await;
                let _ = stdin.flush().await;
            }
            if let Err(e) = stdin.shutdown().await {
                tracing::debug!(error = %e, "error closing backend stdin");
            }
        }

        match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(?status, "backend process exited");
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "error waiting for backend process");
            }
            Err(_) => {
                tracing::warn!("backend did not exit within grace period, killing");
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "failed to kill backend process");
                }
            }
        }

        // Wake anything still waiting on a response.
        self.pending.lock().await.clear();
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stdout reader
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn read_backend_stdout<R>(
    mut stdout: BufReader<R>,
    events: mpsc::Sender<ClientEvent>,
    pending: PendingMap,
    alive: Arc<AtomicBool>,
) where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut skipped = 0usize;
    loop {
        let mut line = String::new();
        let read = match stdout.read_line(&mut line).await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, "error reading backend stdout");
                break;
            }
        };
        if read == 0 {
            break; // EOF — backend is gone.
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !trimmed.starts_with('{') {
            skipped += 1;
            if skipped >= MAX_SKIP_LINES {
                tracing::error!("backend produced too many non-JSON lines on stdout, giving up");
                break;
            }
            tracing::debug!(line = %trimmed, "skipping non-JSON backend stdout line");
            continue;
        }

        match serde_json::from_str::<BackendLine>(trimmed) {
            Ok(BackendLine::Response(resp)) => {
                match pending.lock().await.remove(&resp.id) {
                    Some(tx) => {
                        let _ = tx.send(resp);
                    }
                    None => {
                        tracing::debug!(id = resp.id, "response for unknown or expired send");
                    }
                }
            }
            Ok(BackendLine::Event(ev)) => {
                let ev = ev.into_client_event();
                tracing::debug!(event = ?std::mem::discriminant(&ev), "backend lifecycle event");
                if events.send(ev).await.is_err() {
                    // Consumer moved on to the next cycle; stop reading.
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, line = %trimmed, "unparseable backend stdout line");
            }
        }
    }

    // If the backend died underneath us (EOF without a deliberate
    // shutdown), surface it as a disconnect so the controller restarts.
    if alive.swap(false, Ordering::SeqCst) {
        let _ = events
            .send(ClientEvent::Disconnected {
                reason: DisconnectReason::Other("backend exited unexpectedly".into()),
            })
            .await;
    }
    pending.lock().await.clear();
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Factory
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Launches one [`ProcessClient`] per lifecycle cycle.
pub struct ProcessClientFactory {
    cfg: MessagingConfig,
}

impl ProcessClientFactory {
    pub fn new(cfg: MessagingConfig) -> Self {
        Self { cfg }
    }
}

impl ClientFactory for ProcessClientFactory {
    fn launch(
        &self,
        profile_dir: &Path,
        events: mpsc::Sender<ClientEvent>,
    ) -> Result<Arc<dyn MessagingClient>> {
        let client = ProcessClient::spawn(&self.cfg, profile_dir, events)?;
        Ok(client as Arc<dyn MessagingClient>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_event_pairing_code_parses() {
        let line = r#"{"event":"pairing_code","code":"ABCD-1234","image_png":"aGk="}"#;
        let parsed: BackendLine = serde_json::from_str(line).unwrap();
        match parsed {
            BackendLine::Event(ev) => match ev.into_client_event() {
                ClientEvent::PairingCode { code, image_png } => {
                    assert_eq!(code, "ABCD-1234");
                    assert_eq!(image_png.unwrap(), b"hi");
                }
                other => panic!("unexpected event: {other:?}"),
            },
            _ => panic!("expected event"),
        }
    }

    #[test]
    fn wire_event_logout_reason_maps_to_logout() {
        let line = r#"{"event":"disconnected","reason":"logout"}"#;
        let parsed: BackendLine = serde_json::from_str(line).unwrap();
        match parsed {
            BackendLine::Event(ev) => match ev.into_client_event() {
                ClientEvent::Disconnected { reason } => {
                    assert_eq!(reason, DisconnectReason::Logout);
                }
                other => panic!("unexpected event: {other:?}"),
            },
            _ => panic!("expected event"),
        }
    }

    #[test]
    fn response_line_takes_priority_over_events() {
        let line = r#"{"id":7,"ok":true,"message_id":"m-1"}"#;
        let parsed: BackendLine = serde_json::from_str(line).unwrap();
        match parsed {
            BackendLine::Response(resp) => {
                assert_eq!(resp.id, 7);
                assert!(resp.ok);
                assert_eq!(resp.message_id.as_deref(), Some("m-1"));
            }
            _ => panic!("expected response"),
        }
    }

    #[test]
    fn unreachable_response_parses() {
        let line = r#"{"id":3,"ok":false,"unreachable":true,"error":"no such account"}"#;
        let parsed: BackendLine = serde_json::from_str(line).unwrap();
        match parsed {
            BackendLine::Response(resp) => {
                assert!(!resp.ok);
                assert!(resp.unreachable);
            }
            _ => panic!("expected response"),
        }
    }

    #[tokio::test]
    async fn reader_routes_events_and_synthesizes_disconnect_on_eof() {
        let input = concat!(
            "starting up (not json)\n",
            "{\"event\":\"authenticated\"}\n",
            "{\"event\":\"ready\"}\n",
        );
        let (tx, mut rx) = mpsc::channel(8);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let alive = Arc::new(AtomicBool::new(true));

        read_backend_stdout(BufReader::new(input.as_bytes()), tx, pending, alive.clone()).await;

        assert!(matches!(rx.recv().await, Some(ClientEvent::Authenticated)));
        assert!(matches!(rx.recv().await, Some(ClientEvent::Ready)));
        // EOF while alive reads as an unexpected backend exit.
        match rx.recv().await {
            Some(ClientEvent::Disconnected { reason }) => {
                assert!(matches!(reason, DisconnectReason::Other(_)));
            }
            other => panic!("expected disconnect, got {other:?}"),
        }
        assert!(!alive.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn reader_stays_quiet_after_deliberate_shutdown() {
        let input = "";
        let (tx, mut rx) = mpsc::channel(8);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        // Deliberate shutdown already flipped `alive` off.
        let alive = Arc::new(AtomicBool::new(false));

        read_backend_stdout(BufReader::new(input.as_bytes()), tx, pending, alive).await;
        assert!(rx.recv().await.is_none());
    }
}
