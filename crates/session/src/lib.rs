//! Session lifecycle and persistence coordination.
//!
//! One [`LifecycleController`] task per process owns the pairing →
//! authentication → ready → disconnect → reconnect state machine,
//! coordinating the [`SessionCodec`], the blob store, and the opaque
//! messaging client. The control surface only reads [`SharedStatus`]
//! snapshots and enqueues commands.

pub mod codec;
pub mod controller;
pub mod retry;
pub mod state;

pub use codec::SessionCodec;
pub use controller::{ControllerCommand, ControllerTimings, LifecycleController};
pub use retry::RetryPolicy;
pub use state::{PairingArtifact, SessionPhase, SharedStatus, StatusSnapshot};
