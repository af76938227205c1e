//! `WebSocket` adapters connecting stores to the relay server.
//!
//! Two loops, one per side of a relayed session. The upstream publisher
//! runs inside the app that owns the canonical graph: it pushes a
//! snapshot and then every change record to `/ingest/{api_key}`,
//! recording link health in the graph's `cloud` subtree as it goes. The
//! overlay subscriber runs inside anything rendering that session
//! remotely: it hydrates a replica from `/overlay/{app_key}` and keeps
//! it converged by applying the relayed stream. Both reconnect forever
//! with jittered exponential backoff and resync from a fresh snapshot
//! each time, never from replay.
//!
//! # Modules
//!
//! - [`upstream`] -- canonical-side publisher loop
//! - [`overlay`] -- replica-side subscriber loop
//! - [`error`] -- client error types

pub mod error;
pub mod overlay;
mod socket;
pub mod upstream;

pub use error::ClientError;
pub use overlay::{OverlayConfig, OverlayHandle, spawn_overlay};
pub use upstream::{UpstreamConfig, spawn_upstream};
