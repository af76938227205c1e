//! Shared type definitions for the Stagelink session graph.
//!
//! This crate is the single source of truth for every type that crosses a
//! process boundary: identifiers, enumerations, plain data records, the
//! change-record envelope, and the transport frames. Types defined here flow
//! downstream to `TypeScript` via `ts-rs` so the browser overlay clients
//! consume the exact same wire shapes.
//!
//! # Modules
//!
//! - [`ids`] -- The numeric device identifier and its parsing rules
//! - [`enums`] -- Enumeration types (link state, play state, media slots, ...)
//! - [`records`] -- Plain data records replicated without a per-type schema
//! - [`envelope`] -- The change record envelope and the closed model set
//! - [`frames`] -- Transport frames exchanged over socket connections

pub mod envelope;
pub mod enums;
pub mod frames;
pub mod ids;
pub mod records;

// Re-export all public types at crate root for convenience.
pub use envelope::{ChangeOp, Envelope, ModelKind, WireValue};
pub use enums::{
    ConnectionState, DeviceKind, LinkState, MediaSlot, MixMode, PlayState, Theme,
};
pub use frames::{SyncFrame, PROTOCOL_VERSION};
pub use ids::{DeviceId, DeviceIdError};
pub use records::{
    DeviceInfo, FetchProgress, MixSettings, OverlayInstance, PlayerState, TableProgress, Track,
};
