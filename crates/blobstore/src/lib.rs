//! Durable persistence for opaque session blobs.
//!
//! One authoritative blob per session id; a put replaces any prior value.
//! Every operation degrades to the safest behavior on failure — a broken
//! store must never take the gateway down, only force a fresh pairing.

pub mod memory;
pub mod provider;
pub mod rest;
pub mod types;

pub use memory::MemoryBlobStore;
pub use provider::BlobStore;
pub use rest::RestBlobStore;
