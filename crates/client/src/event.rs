//! Lifecycle events and send outcomes crossing the client boundary.

/// Why a client instance disconnected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The user explicitly logged the session out on a paired device or
    /// via the control surface. The stored blob is credential-dead and
    /// must be deleted.
    Logout,
    /// Anything else — network drop, backend crash, phone offline. The
    /// stored blob stays; the next cycle reconnects with it.
    Other(String),
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Logout => write!(f, "logout"),
            Self::Other(reason) => write!(f, "{reason}"),
        }
    }
}

/// A tagged lifecycle event emitted by the opaque messaging client.
///
/// The stream is infinite and not restartable: a new client instance
/// gets a new channel.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A fresh pairing code was issued. Valid only until the next code
    /// or until authentication.
    PairingCode {
        code: String,
        /// Pre-rendered scannable image, when the backend provides one.
        image_png: Option<Vec<u8>>,
    },
    /// Credentials were accepted; the session artifact will be flushed
    /// to the staging directory shortly.
    Authenticated,
    /// The client can send messages.
    Ready,
    /// The connection dropped or was torn down remotely.
    Disconnected { reason: DisconnectReason },
    /// The remote network rejected the stored credentials as permanently
    /// invalid.
    AuthFailed { message: String },
}

/// Result of a delegated send, surfaced verbatim to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Sent {
        /// Network-assigned message id, when the backend reports one.
        message_id: Option<String>,
    },
    /// The identifier is well-formed but not reachable on the network.
    Unreachable,
}
