//! The canonical session graph and its replication engine.
//!
//! One process owns a [`Store`]: the in-memory graph of everything the
//! application knows (devices, playback, history, configuration, upstream
//! status). Every mutation goes through a store method that updates the
//! graph and emits a change record describing exactly what changed and
//! where. Transports fan those records out to replicas, which apply them
//! to converge on the same graph; late joiners and reconnects bootstrap
//! from a snapshot instead of replay.
//!
//! # Modules
//!
//! - [`store`] -- The store handle: graph, mutators, remote application
//! - [`models`] -- Schema'd models of the graph and their apply logic
//! - [`codec`] -- Per-field wire codecs and the serializer schemas
//! - [`relay`] -- Labeled fan-out of change records to transport sinks
//! - [`path`] -- Slash-delimited path building and splitting
//! - [`ipc`] -- In-process transport with per-message acknowledgment
//! - [`persist`] -- Settings-file persistence of the config subtree
//! - [`error`] -- Error types for codec, apply, and persistence failures

pub mod codec;
pub mod error;
pub mod ipc;
pub mod models;
pub mod path;
pub mod persist;
pub mod relay;
pub mod store;

// Re-export the types nearly every consumer needs at crate root.
pub use error::{ApplyError, CodecError, PersistError};
pub use models::{
    ApplyOutcome, CloudStatus, DeviceStore, HydrationInfo, MixStore, PlayedTrack, SessionStore,
    StoreModel, StudioConfig, schema_of,
};
pub use relay::Relay;
pub use store::{SharedStore, Store};
