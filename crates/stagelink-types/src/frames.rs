//! Frames exchanged over socket transports.
//!
//! Every WebSocket text message between an app and the relay server, and
//! between the server and an overlay, is one JSON-encoded [`SyncFrame`].
//! The frame names mirror the event names of the settings IPC channel so
//! the protocol reads the same across every transport.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::ConnectionState;
use crate::envelope::{Envelope, WireValue};

/// Version of the sync protocol spoken by this build.
///
/// Sent in the [`SyncFrame::Handshake`] frame; the server refuses apps
/// speaking a different version rather than guessing at compatibility.
pub const PROTOCOL_VERSION: u32 = 1;

/// One message on a socket transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SyncFrame {
    /// Full encoded snapshot of the session graph. Always the first frame a
    /// subscriber receives, and re-sent whenever a gap is detected.
    StoreInit {
        /// Encoded root snapshot.
        snapshot: WireValue,
    },
    /// One incremental change record.
    StoreUpdate {
        /// The serialized change.
        envelope: Envelope,
    },
    /// A configuration change travelling against the usual flow, from the
    /// server back to the app that owns the canonical graph.
    ConfigUpdate {
        /// The serialized change, rooted at the config subtree.
        envelope: Envelope,
    },
    /// First frame an app sends after connecting upstream.
    Handshake {
        /// The app's [`PROTOCOL_VERSION`].
        version: u32,
    },
    /// The server's verdict on a [`SyncFrame::Handshake`].
    #[serde(rename_all = "camelCase")]
    HandshakeAck {
        /// State the app should record; anything other than
        /// [`ConnectionState::Connecting`] ends the session.
        connection_state: ConnectionState,
        /// The server's [`PROTOCOL_VERSION`].
        version: u32,
    },
    /// Latency probe. The receiver echoes the nonce back unchanged.
    LatencyPing {
        /// Correlates the pong with the outstanding ping.
        nonce: u64,
    },
    /// Echo of a [`SyncFrame::LatencyPing`].
    LatencyPong {
        /// Nonce of the ping being answered.
        nonce: u64,
    },
}
