//! Lifecycle controller: the single task that owns the session.
//!
//! One controller task runs for the life of the process. Each iteration
//! of its outer loop is a connection cycle: restore the stored blob into
//! the staging directory, launch a fresh client instance, drive its
//! event stream until it ends, tear the instance down completely, wait
//! out the computed delay, repeat. All state transitions happen on this
//! task, so no transition can interleave with another.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use pl_blobstore::BlobStore;
use pl_client::{ClientEvent, ClientFactory, DisconnectReason};
use pl_domain::Error;
use pl_domain::config::SessionConfig;

use crate::codec::SessionCodec;
use crate::retry::RetryPolicy;
use crate::state::{PairingArtifact, SessionPhase, SharedStatus};

/// Event channel depth between the client reader and the controller.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Upper bound on the final save attempted during graceful shutdown.
const FINAL_SAVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Commands the control surface can enqueue to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerCommand {
    /// Tear down the live session, delete the stored blob, and restart
    /// into fresh pairing.
    Logout,
}

/// Save scheduling knobs, split out so tests can shrink them.
#[derive(Debug, Clone, Copy)]
pub struct ControllerTimings {
    /// Interval of the periodic backstop save while Ready.
    pub backstop_save: Duration,
    /// Settle delay between Authenticated and the first snapshot save.
    pub post_auth_save: Duration,
}

impl ControllerTimings {
    pub fn from_config(cfg: &SessionConfig) -> Self {
        Self {
            backstop_save: Duration::from_secs(cfg.backstop_save_minutes * 60),
            post_auth_save: Duration::from_secs(cfg.post_auth_save_secs),
        }
    }
}

/// Why a connection cycle ended.
enum CycleEnd {
    Disconnected(DisconnectReason),
    AuthFailed,
    Shutdown,
}

pub struct LifecycleController {
    session_id: String,
    data_dir: PathBuf,
    store: Arc<dyn BlobStore>,
    codec: SessionCodec,
    factory: Arc<dyn ClientFactory>,
    retry: RetryPolicy,
    timings: ControllerTimings,
    status: Arc<SharedStatus>,
    commands: mpsc::Receiver<ControllerCommand>,
    shutdown: CancellationToken,
}

impl LifecycleController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: String,
        data_dir: PathBuf,
        store: Arc<dyn BlobStore>,
        codec: SessionCodec,
        factory: Arc<dyn ClientFactory>,
        retry: RetryPolicy,
        timings: ControllerTimings,
        status: Arc<SharedStatus>,
        commands: mpsc::Receiver<ControllerCommand>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            session_id,
            data_dir,
            store,
            codec,
            factory,
            retry,
            timings,
            status,
            commands,
            shutdown,
        }
    }

    /// Run until the shutdown token fires. Consumes the controller; it
    /// is spawned once and never restarted.
    pub async fn run(mut self) {
        loop {
            match self.run_cycle().await {
                CycleEnd::Shutdown => {
                    if self.status.phase() == SessionPhase::Ready {
                        let save = tokio::time::timeout(
                            FINAL_SAVE_TIMEOUT,
                            self.persist_snapshot("shutdown"),
                        );
                        if save.await.is_err() {
                            tracing::warn!(
                                session_id = %self.session_id,
                                "final session save timed out"
                            );
                        }
                    }
                    tracing::info!(session_id = %self.session_id, "lifecycle controller stopped");
                    return;
                }
                CycleEnd::AuthFailed => {
                    self.status
                        .set_disconnect(DisconnectReason::Other("authentication failed".into()));
                    // The stored credentials are permanently invalid.
                    self.store.delete(&self.session_id).await;
                    self.reset_staging();
                    let delay = self.retry.auth_failure_delay;
                    tracing::warn!(
                        session_id = %self.session_id,
                        delay_secs = delay.as_secs(),
                        "authentication failed, restarting into fresh pairing"
                    );
                    if self.pause(delay).await {
                        return;
                    }
                }
                CycleEnd::Disconnected(reason) => {
                    let attempt = self.status.increment_attempts();
                    self.status.set_disconnect(reason.clone());
                    if reason == DisconnectReason::Logout {
                        self.store.delete(&self.session_id).await;
                        self.reset_staging();
                    }
                    let delay = self.retry.reconnect_delay(attempt);
                    tracing::info!(
                        session_id = %self.session_id,
                        %reason,
                        attempt,
                        delay_secs = delay.as_secs(),
                        "session disconnected, restart scheduled"
                    );
                    if self.pause(delay).await {
                        return;
                    }
                }
            }
        }
    }

    /// One connection cycle: restore, launch, drive events, tear down.
    async fn run_cycle(&mut self) -> CycleEnd {
        self.status.begin_cycle();
        tracing::info!(session_id = %self.session_id, "starting connection cycle");

        let restored = self.restore_session().await;

        let (events_tx, mut events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let client = match self.factory.launch(&self.data_dir, events_tx) {
            Ok(client) => client,
            Err(err) => {
                tracing::error!(
                    session_id = %self.session_id,
                    error = %err,
                    "failed to launch messaging client"
                );
                return CycleEnd::Disconnected(DisconnectReason::Other(format!(
                    "launch failed: {err}"
                )));
            }
        };
        self.status.set_client(Some(client.clone()));
        self.status.set_phase(if restored {
            SessionPhase::Authenticating
        } else {
            SessionPhase::AwaitingPairing
        });

        let mut backstop = tokio::time::interval_at(
            Instant::now() + self.timings.backstop_save,
            self.timings.backstop_save,
        );
        backstop.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Armed after Authenticated, disarmed once fired. Scoped to this
        // cycle so a pending save can never leak into the next instance.
        let mut deferred_save: Option<Instant> = None;

        let end = loop {
            tokio::select! {
                maybe = events.recv() => match maybe {
                    Some(event) => {
                        if let Some(end) = self.handle_event(event, &mut deferred_save).await {
                            break end;
                        }
                    }
                    None => {
                        break CycleEnd::Disconnected(DisconnectReason::Other(
                            "client event channel closed".into(),
                        ));
                    }
                },
                cmd = self.commands.recv() => match cmd {
                    Some(ControllerCommand::Logout) => {
                        tracing::info!(session_id = %self.session_id, "logout requested");
                        break CycleEnd::Disconnected(DisconnectReason::Logout);
                    }
                    // The command sender lives in the server state; it
                    // only drops when the process is coming down.
                    None => break CycleEnd::Shutdown,
                },
                _ = backstop.tick() => {
                    if self.status.phase() == SessionPhase::Ready {
                        self.persist_snapshot("backstop").await;
                    }
                }
                _ = tokio::time::sleep_until(deferred_save.unwrap_or_else(Instant::now)),
                        if deferred_save.is_some() => {
                    deferred_save = None;
                    self.persist_snapshot("post-auth").await;
                }
                _ = self.shutdown.cancelled() => break CycleEnd::Shutdown,
            }
        };

        // Full teardown before the outer loop can schedule a successor.
        self.status.set_client(None);
        client.shutdown().await;
        end
    }

    /// Fetch and materialize the stored blob. Returns whether a prior
    /// session was restored; on any failure the cycle starts fresh.
    async fn restore_session(&self) -> bool {
        match self.store.get(&self.session_id).await {
            Some(blob) => match self.codec.decode(&blob, &self.data_dir) {
                Ok(()) => {
                    tracing::info!(
                        session_id = %self.session_id,
                        blob_bytes = blob.len(),
                        "restored stored session"
                    );
                    true
                }
                Err(Error::MalformedBlob(detail)) => {
                    tracing::warn!(
                        session_id = %self.session_id,
                        detail,
                        "stored session blob unusable, starting fresh"
                    );
                    // Opportunistic; a put from a later cycle replaces it
                    // anyway if this delete is lost.
                    self.store.delete(&self.session_id).await;
                    self.reset_staging();
                    false
                }
                Err(err) => {
                    // A local failure (disk full, path occupied) says
                    // nothing about the remote blob; keep it and retry
                    // the restore on the next cycle.
                    tracing::warn!(
                        session_id = %self.session_id,
                        error = %err,
                        "failed to materialize stored session, continuing without it"
                    );
                    self.reset_staging();
                    false
                }
            },
            None => {
                self.reset_staging();
                false
            }
        }
    }

    /// Returns the cycle end if `event` terminates the cycle.
    async fn handle_event(
        &self,
        event: ClientEvent,
        deferred_save: &mut Option<Instant>,
    ) -> Option<CycleEnd> {
        match event {
            ClientEvent::PairingCode { code, image_png } => {
                tracing::info!(
                    session_id = %self.session_id,
                    pairing_code = %code,
                    "pairing code issued"
                );
                self.status.set_pairing(PairingArtifact { code, image_png });
                self.status.set_phase(SessionPhase::AwaitingPairing);
                None
            }
            ClientEvent::Authenticated => {
                tracing::info!(session_id = %self.session_id, "authenticated");
                self.status.clear_pairing();
                self.status.set_phase(SessionPhase::Authenticating);
                // Let the backend finish flushing credentials before the
                // first snapshot.
                *deferred_save = Some(Instant::now() + self.timings.post_auth_save);
                None
            }
            ClientEvent::Ready => {
                tracing::info!(session_id = %self.session_id, "session ready");
                self.status.clear_pairing();
                self.status.set_phase(SessionPhase::Ready);
                self.status.reset_attempts();
                self.persist_snapshot("ready").await;
                None
            }
            ClientEvent::Disconnected { reason } => Some(CycleEnd::Disconnected(reason)),
            ClientEvent::AuthFailed { message } => {
                tracing::warn!(
                    session_id = %self.session_id,
                    %message,
                    "credentials rejected"
                );
                Some(CycleEnd::AuthFailed)
            }
        }
    }

    /// Encode the staging directory and push it to the store. Persistence
    /// failures never disturb the live session; they are logged and the
    /// next trigger retries naturally.
    async fn persist_snapshot(&self, trigger: &str) {
        let blob = match self.codec.encode(&self.data_dir).await {
            Ok(blob) => blob,
            Err(err) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    trigger,
                    error = %err,
                    "session snapshot encode failed"
                );
                return;
            }
        };
        match self.store.put(&self.session_id, &blob).await {
            Ok(()) => {
                tracing::debug!(
                    session_id = %self.session_id,
                    trigger,
                    blob_bytes = blob.len(),
                    "session snapshot saved"
                );
            }
            Err(err) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    trigger,
                    error = %err,
                    "session snapshot save failed"
                );
            }
        }
    }

    /// Clear the staging directory so a fresh cycle starts with no
    /// leftover credential artifacts.
    fn reset_staging(&self) {
        if self.data_dir.exists() {
            if let Err(err) = std::fs::remove_dir_all(&self.data_dir) {
                tracing::warn!(
                    path = %self.data_dir.display(),
                    error = %err,
                    "failed to clear staging dir"
                );
            }
        }
        if let Err(err) = std::fs::create_dir_all(&self.data_dir) {
            tracing::warn!(
                path = %self.data_dir.display(),
                error = %err,
                "failed to create staging dir"
            );
        }
    }

    /// Sleep for `delay`, returning true if shutdown fired first.
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => false,
            _ = self.shutdown.cancelled() => true,
        }
    }
}
