//! Startup wiring: shared state, blob store, and the lifecycle
//! controller task.

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use pl_blobstore::RestBlobStore;
use pl_client::ProcessClientFactory;
use pl_domain::config::Config;
use pl_session::{
    ControllerCommand, ControllerTimings, LifecycleController, RetryPolicy, SessionCodec,
    SharedStatus,
};

use crate::state::AppState;

/// Command queue depth; commands are rare and cheap.
const COMMAND_CHANNEL_CAPACITY: usize = 8;

/// Everything `main` needs to serve requests and shut down cleanly.
pub struct Runtime {
    pub state: AppState,
    pub shutdown: CancellationToken,
    pub controller: tokio::task::JoinHandle<()>,
}

/// Build the shared state and spawn the lifecycle controller.
pub fn build_runtime(config: Arc<Config>) -> anyhow::Result<Runtime> {
    let api_token_hash = load_api_token_hash(&config.server.api_token_env);

    let store = Arc::new(RestBlobStore::new(&config.store)?);
    let codec = SessionCodec::new(
        Duration::from_millis(config.session.artifact_poll_ms),
        Duration::from_secs(config.session.artifact_timeout_secs),
    );
    let factory = Arc::new(ProcessClientFactory::new(config.messaging.clone()));

    let status = Arc::new(SharedStatus::new());
    let (commands_tx, commands_rx) = mpsc::channel::<ControllerCommand>(COMMAND_CHANNEL_CAPACITY);
    let shutdown = CancellationToken::new();

    let controller = LifecycleController::new(
        config.session.session_id.clone(),
        config.session.data_dir.clone(),
        store,
        codec,
        factory,
        RetryPolicy::from_config(&config.retry),
        ControllerTimings::from_config(&config.session),
        status.clone(),
        commands_rx,
        shutdown.clone(),
    );
    let controller = tokio::spawn(controller.run());

    Ok(Runtime {
        state: AppState {
            config,
            status,
            commands: commands_tx,
            api_token_hash,
        },
        shutdown,
        controller,
    })
}

/// Read the API token env var once and cache its SHA-256 digest.
fn load_api_token_hash(env_var: &str) -> Option<Vec<u8>> {
    match std::env::var(env_var) {
        Ok(token) if !token.is_empty() => Some(Sha256::digest(token.as_bytes()).to_vec()),
        _ => {
            tracing::warn!(
                env_var,
                "API token not set; protected endpoints are unauthenticated"
            );
            None
        }
    }
}
