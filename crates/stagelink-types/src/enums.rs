//! Enumeration types shared across the Stagelink workspace.
//!
//! Link-network state, device classification, media slots, transport play
//! state, and the connection lifecycle of socket adapters.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Link network
// ---------------------------------------------------------------------------

/// Connectivity of the local process to the pro-link device network.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub enum LinkState {
    /// No network interface is bound.
    #[default]
    Offline,
    /// Interfaces are bound and devices are being discovered.
    Online,
    /// At least one device announced itself and the session is live.
    Connected,
    /// Binding or discovery failed.
    Failed,
}

/// What kind of hardware a device on the network is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum DeviceKind {
    /// A player deck (CDJ or similar).
    Player,
    /// A mixer.
    Mixer,
    /// Laptop library software announcing itself on the network.
    Rekordbox,
}

/// A physical or virtual media slot on a device.
///
/// Used as the key of the per-device progress maps; the wire form is the
/// variant name, so these maps are legitimately string-keyed collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum MediaSlot {
    /// No media inserted.
    Empty,
    /// CD drive.
    Cd,
    /// SD card slot.
    Sd,
    /// USB slot.
    Usb,
    /// Linked rekordbox library.
    Rekordbox,
}

/// Transport state of a player deck.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub enum PlayState {
    /// No track is loaded.
    #[default]
    Empty,
    /// A track is being loaded.
    Loading,
    /// The deck is playing.
    Playing,
    /// The deck is playing a loop.
    Looping,
    /// The deck is paused mid-track.
    Paused,
    /// The deck is stopped at the cue point.
    Cued,
    /// The jog wheel is being used to search.
    Searching,
    /// The track played to its end.
    Ended,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// UI theme selection, persisted in the studio configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Light theme.
    Light,
    /// Dark theme.
    Dark,
    /// Follow the operating system preference.
    System,
}

/// Strategy the mix-status processor uses to decide when a track counts
/// as "now playing".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum MixMode {
    /// Report after a configurable number of beats, tolerating short cuts.
    SmartTiming,
    /// Report after a fixed number of beats, no interruption tolerance.
    SimpleTiming,
    /// Only report when the operator marks the track manually.
    Manual,
}

// ---------------------------------------------------------------------------
// Socket adapters
// ---------------------------------------------------------------------------

/// Lifecycle of one socket adapter connection.
///
/// Every connection loops `Disconnected -> Connecting -> Synced` and back to
/// `Disconnected` on drop. `Synced` is only entered once the post-connect
/// snapshot has been exchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Not connected; a reconnect may be pending.
    Disconnected,
    /// TCP/WebSocket establishment and handshake in progress.
    Connecting,
    /// Snapshot exchanged; incremental envelopes are flowing.
    Synced,
}
