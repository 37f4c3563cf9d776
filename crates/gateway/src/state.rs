use std::sync::Arc;

use tokio::sync::mpsc;

use pl_domain::config::Config;
use pl_session::{ControllerCommand, SharedStatus};

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Observable session state; written only by the lifecycle
    /// controller task.
    pub status: Arc<SharedStatus>,
    /// Command queue into the lifecycle controller.
    pub commands: mpsc::Sender<ControllerCommand>,
    /// SHA-256 of the API token, read from the environment once at
    /// startup. `None` means dev mode (no auth).
    pub api_token_hash: Option<Vec<u8>>,
}
