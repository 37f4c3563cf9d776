//! Lifecycle controller integration tests against a scripted client
//! factory and the in-memory blob store. Time is paused so backoff
//! delays elapse instantly.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use pl_blobstore::MemoryBlobStore;
use pl_client::{ClientEvent, ClientFactory, DisconnectReason, MessagingClient, SendOutcome};
use pl_domain::Result;
use pl_session::{
    ControllerCommand, ControllerTimings, LifecycleController, RetryPolicy, SessionCodec,
    SessionPhase, SharedStatus,
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scripted client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct MockClient {
    alive: AtomicBool,
    live: Arc<AtomicUsize>,
    // Held so the event channel stays open until teardown.
    events: Mutex<Option<mpsc::Sender<ClientEvent>>>,
}

#[async_trait]
impl MessagingClient for MockClient {
    async fn send_text(&self, _recipient: &str, _body: &str) -> Result<SendOutcome> {
        Ok(SendOutcome::Sent { message_id: None })
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) {
        if self.alive.swap(false, Ordering::SeqCst) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
        self.events.lock().unwrap().take();
    }
}

#[derive(Default, Clone)]
struct CycleScript {
    events: Vec<ClientEvent>,
    /// Write a credential artifact into the staging dir before emitting
    /// events, so snapshot saves have something to archive.
    write_artifact: bool,
}

#[derive(Default)]
struct ScriptedFactory {
    scripts: Mutex<VecDeque<CycleScript>>,
    launches: AtomicUsize,
    live: Arc<AtomicUsize>,
    overlap: AtomicBool,
    restored_artifact_seen: AtomicBool,
}

impl ScriptedFactory {
    fn new(scripts: Vec<CycleScript>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            ..Self::default()
        })
    }

    fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    fn saw_overlap(&self) -> bool {
        self.overlap.load(Ordering::SeqCst)
    }

    fn live_instances(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl ClientFactory for ScriptedFactory {
    fn launch(
        &self,
        profile_dir: &Path,
        events: mpsc::Sender<ClientEvent>,
    ) -> Result<Arc<dyn MessagingClient>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if self.live.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlap.store(true, Ordering::SeqCst);
        }
        if profile_dir.join("session.json").exists() {
            self.restored_artifact_seen.store(true, Ordering::SeqCst);
        }

        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        if script.write_artifact {
            std::fs::create_dir_all(profile_dir).unwrap();
            std::fs::write(profile_dir.join("session.json"), br#"{"token":"t"}"#).unwrap();
        }

        let tx = events.clone();
        tokio::spawn(async move {
            for event in script.events {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        Ok(Arc::new(MockClient {
            alive: AtomicBool::new(true),
            live: self.live.clone(),
            events: Mutex::new(Some(events)),
        }))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Harness
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Harness {
    factory: Arc<ScriptedFactory>,
    status: Arc<SharedStatus>,
    commands: mpsc::Sender<ControllerCommand>,
    shutdown: CancellationToken,
    task: tokio::task::JoinHandle<()>,
    _data_dir: Option<tempfile::TempDir>,
}

impl Harness {
    fn spawn(scripts: Vec<CycleScript>, store: Arc<MemoryBlobStore>) -> Self {
        let data_dir = tempfile::tempdir().unwrap();
        let path = data_dir.path().to_path_buf();
        let mut harness = Self::spawn_in(scripts, store, path);
        harness._data_dir = Some(data_dir);
        harness
    }

    fn spawn_in(
        scripts: Vec<CycleScript>,
        store: Arc<MemoryBlobStore>,
        data_dir: std::path::PathBuf,
    ) -> Self {
        let factory = ScriptedFactory::new(scripts);
        let status = Arc::new(SharedStatus::new());
        let (commands_tx, commands_rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();

        let controller = LifecycleController::new(
            "test-session".into(),
            data_dir,
            store.clone(),
            SessionCodec::new(Duration::from_millis(5), Duration::from_millis(200)),
            factory.clone(),
            RetryPolicy::default(),
            ControllerTimings {
                backstop_save: Duration::from_secs(3600),
                post_auth_save: Duration::from_millis(10),
            },
            status.clone(),
            commands_rx,
            shutdown.clone(),
        );
        let task = tokio::spawn(controller.run());

        Self {
            factory,
            status,
            commands: commands_tx,
            shutdown,
            task,
            _data_dir: None,
        }
    }

    async fn stop(self) {
        self.shutdown.cancel();
        self.task.await.unwrap();
        assert_eq!(self.factory.live_instances(), 0);
    }
}

async fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..5000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for {what}");
}

async fn encoded_session_blob() -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("session.json"), br#"{"token":"t"}"#).unwrap();
    let codec = SessionCodec::new(Duration::from_millis(5), Duration::from_millis(200));
    codec.encode(dir.path()).await.unwrap()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test(start_paused = true)]
async fn pairing_flow_reaches_ready_and_persists() {
    let store = Arc::new(MemoryBlobStore::new());
    let harness = Harness::spawn(
        vec![CycleScript {
            events: vec![
                ClientEvent::PairingCode {
                    code: "ABCD-1234".into(),
                    image_png: None,
                },
                ClientEvent::Authenticated,
                ClientEvent::Ready,
            ],
            write_artifact: true,
        }],
        store.clone(),
    );

    wait_for("snapshot in store", || store.raw_get("test-session").is_some()).await;
    assert_eq!(harness.status.phase(), SessionPhase::Ready);
    assert!(harness.status.pairing_artifact().is_none());
    assert_eq!(harness.status.snapshot().reconnect_attempts, 0);
    assert!(harness.status.client().is_some());

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stored_session_restores_without_pairing() {
    let store = Arc::new(MemoryBlobStore::new());
    store.raw_put("test-session", encoded_session_blob().await);

    let harness = Harness::spawn(
        vec![CycleScript {
            events: vec![ClientEvent::Ready],
            write_artifact: false,
        }],
        store.clone(),
    );

    wait_for("ready phase", || harness.status.phase() == SessionPhase::Ready).await;
    assert!(harness
        .factory
        .restored_artifact_seen
        .load(Ordering::SeqCst));
    assert!(!harness.status.snapshot().pairing_pending);

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn disconnects_back_off_and_never_overlap_instances() {
    let store = Arc::new(MemoryBlobStore::new());
    let disconnect = || CycleScript {
        events: vec![ClientEvent::Disconnected {
            reason: DisconnectReason::Other("stream closed".into()),
        }],
        write_artifact: false,
    };
    let harness = Harness::spawn(
        vec![
            disconnect(),
            disconnect(),
            CycleScript {
                events: vec![
                    ClientEvent::PairingCode {
                        code: "WXYZ-9876".into(),
                        image_png: None,
                    },
                    ClientEvent::Authenticated,
                    ClientEvent::Ready,
                ],
                write_artifact: true,
            },
        ],
        store.clone(),
    );

    wait_for("third launch", || harness.factory.launches() == 3).await;
    wait_for("ready phase", || harness.status.phase() == SessionPhase::Ready).await;

    // Counter grew across the failed cycles and reset only on Ready.
    assert_eq!(harness.status.snapshot().reconnect_attempts, 0);
    assert!(!harness.factory.saw_overlap());

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn malformed_blob_falls_back_to_fresh_pairing() {
    let store = Arc::new(MemoryBlobStore::new());
    store.raw_put("test-session", b"not a session blob".to_vec());

    let harness = Harness::spawn(
        vec![CycleScript {
            events: vec![ClientEvent::PairingCode {
                code: "FRSH-0001".into(),
                image_png: None,
            }],
            write_artifact: false,
        }],
        store.clone(),
    );

    wait_for("pairing pending", || {
        harness.status.snapshot().pairing_pending
    })
    .await;
    assert_eq!(harness.status.phase(), SessionPhase::AwaitingPairing);
    assert!(store.raw_get("test-session").is_none());

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn local_io_failure_during_restore_keeps_remote_blob() {
    let store = Arc::new(MemoryBlobStore::new());
    store.raw_put("test-session", encoded_session_blob().await);

    // Occupy the staging path with a regular file so materialization
    // fails with a local I/O error, not a malformed blob.
    let dir = tempfile::tempdir().unwrap();
    let blocked = dir.path().join("staging");
    std::fs::write(&blocked, b"in the way").unwrap();

    let harness = Harness::spawn_in(
        vec![CycleScript {
            events: vec![ClientEvent::PairingCode {
                code: "ABCD-1234".into(),
                image_png: None,
            }],
            write_artifact: false,
        }],
        store.clone(),
        blocked,
    );

    wait_for("pairing pending", || {
        harness.status.snapshot().pairing_pending
    })
    .await;
    // The remote blob is still authoritative; only a malformed blob may
    // trigger the opportunistic delete.
    assert!(store.raw_get("test-session").is_some());

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn auth_failure_deletes_blob_without_growing_backoff() {
    let store = Arc::new(MemoryBlobStore::new());
    store.raw_put("test-session", encoded_session_blob().await);

    let harness = Harness::spawn(
        vec![
            CycleScript {
                events: vec![ClientEvent::AuthFailed {
                    message: "credentials revoked".into(),
                }],
                write_artifact: false,
            },
            CycleScript {
                events: vec![ClientEvent::PairingCode {
                    code: "NEWP-4321".into(),
                    image_png: None,
                }],
                write_artifact: false,
            },
        ],
        store.clone(),
    );

    wait_for("second launch", || harness.factory.launches() == 2).await;
    assert!(store.raw_get("test-session").is_none());
    // Auth failure is not a reconnect attempt.
    assert_eq!(harness.status.snapshot().reconnect_attempts, 0);

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn logout_command_deletes_blob_and_restarts_pairing() {
    let store = Arc::new(MemoryBlobStore::new());
    let harness = Harness::spawn(
        vec![
            CycleScript {
                events: vec![
                    ClientEvent::PairingCode {
                        code: "ABCD-1234".into(),
                        image_png: None,
                    },
                    ClientEvent::Authenticated,
                    ClientEvent::Ready,
                ],
                write_artifact: true,
            },
            CycleScript {
                events: vec![ClientEvent::PairingCode {
                    code: "AGIN-5678".into(),
                    image_png: None,
                }],
                write_artifact: false,
            },
        ],
        store.clone(),
    );

    wait_for("snapshot in store", || store.raw_get("test-session").is_some()).await;
    harness
        .commands
        .send(ControllerCommand::Logout)
        .await
        .unwrap();

    wait_for("second launch", || harness.factory.launches() == 2).await;
    wait_for("pairing pending again", || {
        harness.status.snapshot().pairing_pending
    })
    .await;
    assert!(store.raw_get("test-session").is_none());

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn remote_logout_deletes_blob() {
    let store = Arc::new(MemoryBlobStore::new());
    let harness = Harness::spawn(
        vec![
            CycleScript {
                events: vec![
                    ClientEvent::Authenticated,
                    ClientEvent::Ready,
                    ClientEvent::Disconnected {
                        reason: DisconnectReason::Logout,
                    },
                ],
                write_artifact: true,
            },
            CycleScript::default(),
        ],
        store.clone(),
    );

    wait_for("second launch", || harness.factory.launches() == 2).await;
    assert!(store.raw_get("test-session").is_none());

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn save_failure_never_disturbs_live_session() {
    let store = Arc::new(MemoryBlobStore::new());
    store.set_fail_puts(true);

    let harness = Harness::spawn(
        vec![CycleScript {
            events: vec![ClientEvent::Authenticated, ClientEvent::Ready],
            write_artifact: true,
        }],
        store.clone(),
    );

    wait_for("ready phase", || harness.status.phase() == SessionPhase::Ready).await;
    // Give the post-auth save a chance to fire and fail.
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(store.raw_get("test-session").is_none());
    assert_eq!(harness.status.phase(), SessionPhase::Ready);
    assert!(harness.status.client().is_some());

    harness.stop().await;
}
