//! Capability boundary for the opaque messaging client.
//!
//! The gateway never speaks the messaging network's protocol itself; it
//! drives an automation backend that does. This crate defines the
//! lifecycle events that backend emits, the [`MessagingClient`] /
//! [`ClientFactory`] traits the lifecycle controller consumes, and
//! [`ProcessClient`], the production child-process transport.

pub mod event;
pub mod process;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use pl_domain::Result;

pub use event::{ClientEvent, DisconnectReason, SendOutcome};
pub use process::{ProcessClient, ProcessClientFactory};

/// A live, opaque messaging-client instance.
///
/// Exactly one instance is live (or in teardown) per process at any time;
/// the lifecycle controller enforces that by awaiting [`shutdown`] before
/// launching a successor.
///
/// [`shutdown`]: MessagingClient::shutdown
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Deliver one message. Fire-once: the outcome is surfaced verbatim
    /// and never retried here.
    async fn send_text(&self, recipient: &str, body: &str) -> Result<SendOutcome>;

    /// Whether the backend is still running.
    fn is_alive(&self) -> bool;

    /// Tear the instance down completely. Must not return until the
    /// backend process is gone.
    async fn shutdown(&self);
}

/// Creates a fresh client instance for each lifecycle cycle.
pub trait ClientFactory: Send + Sync {
    /// Launch a client against the given staging directory. Lifecycle
    /// events flow into `events`; the channel closing signals the
    /// consumer has moved on.
    fn launch(
        &self,
        profile_dir: &Path,
        events: mpsc::Sender<ClientEvent>,
    ) -> Result<Arc<dyn MessagingClient>>;
}
