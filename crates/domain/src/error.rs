/// Shared error type used across all PairLink crates.
///
/// Lifecycle-layer failures (`TransientStore`, `MalformedBlob`, `Encode`)
/// are absorbed by the controller and never reach an HTTP caller; only
/// `Validation`, `NotReady`, and `DelegateSend` surface through the
/// control surface.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("config: {0}")]
    Config(String),

    /// Network/timeout failure talking to the blob store. Callers degrade
    /// to "no session" and continue.
    #[error("blob store: {0}")]
    TransientStore(String),

    /// A stored blob did not decode back into a session directory. Treated
    /// as absent; the bad remote record is deleted opportunistically.
    #[error("malformed session blob: {0}")]
    MalformedBlob(String),

    /// The local session artifact never materialized within the bounded
    /// wait window, or archiving it failed.
    #[error("session encode: {0}")]
    Encode(String),

    /// Bad recipient or message at the send boundary. No side effects.
    #[error("validation: {0}")]
    Validation(String),

    /// The opaque messaging client rejected or failed a send. Surfaced to
    /// the caller verbatim; never retried internally.
    #[error("send delegate: {0}")]
    DelegateSend(String),

    /// The session is not in the READY phase.
    #[error("not ready: {0}")]
    NotReady(String),

    #[error("client transport: {0}")]
    ClientTransport(String),
}

pub type Result<T> = std::result::Result<T, Error>;
