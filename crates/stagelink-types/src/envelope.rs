//! The change-record envelope that crosses every transport.
//!
//! Each fine-grained mutation of the session graph becomes one [`Envelope`]:
//! a slash-delimited path from the graph root, the operation that happened
//! there, and (when the new value is a schema'd model rather than a plain
//! record) a [`ModelKind`] tag telling the far side which schema rebuilds it.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// JSON value as it travels on the wire.
///
/// Encoded model payloads, plain-record copies, and opaque overlay options
/// all pass through this type between the codec and the transports.
pub type WireValue = serde_json::Value;

// ---------------------------------------------------------------------------
// Model tags
// ---------------------------------------------------------------------------

/// The closed set of schema'd models an envelope can carry.
///
/// Only these types have per-type serializer schemas; everything else in the
/// graph replicates as a plain deep copy. The wire names are stable protocol
/// strings, so renaming a Rust type must not change them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum ModelKind {
    /// The session graph root.
    #[serde(rename = "SessionStore")]
    Session,
    /// One device entry in the devices map.
    #[serde(rename = "DeviceStore")]
    Device,
    /// Identity record of a device on the link network.
    #[serde(rename = "DeviceInfo")]
    DeviceInfo,
    /// Per-slot database hydration progress.
    #[serde(rename = "HydrationInfo")]
    Hydration,
    /// Mix-status subtree holding the played-track history.
    #[serde(rename = "MixStore")]
    Mix,
    /// One entry of the played-track history.
    #[serde(rename = "PlayedTrack")]
    Played,
    /// The replicated application configuration.
    #[serde(rename = "StudioConfig")]
    Config,
    /// Connection status of the upstream publisher.
    #[serde(rename = "CloudStatus")]
    Cloud,
}

impl ModelKind {
    /// The wire name of this model, as carried in `serializerModel`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Session => "SessionStore",
            Self::Device => "DeviceStore",
            Self::DeviceInfo => "DeviceInfo",
            Self::Hydration => "HydrationInfo",
            Self::Mix => "MixStore",
            Self::Played => "PlayedTrack",
            Self::Config => "StudioConfig",
            Self::Cloud => "CloudStatus",
        }
    }
}

impl core::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Change operations
// ---------------------------------------------------------------------------

/// One mutation observed at a path in the session graph.
///
/// `add`, `update`, and `delete` address object properties and map keys by
/// `name`; the array variants address list elements by `index`. The payload
/// values have already been through the codec when they appear here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChangeOp {
    /// A property or map key that did not previously exist was set.
    #[serde(rename_all = "camelCase")]
    Add {
        /// Property name or stringified map key.
        name: String,
        /// Encoded new value.
        #[serde(default)]
        new_value: WireValue,
    },
    /// An existing property or map key was replaced.
    #[serde(rename_all = "camelCase")]
    Update {
        /// Property name or stringified map key.
        name: String,
        /// Encoded new value.
        #[serde(default)]
        new_value: WireValue,
    },
    /// A property or map key was removed.
    Delete {
        /// Property name or stringified map key.
        name: String,
    },
    /// A list element was replaced in place.
    #[serde(rename_all = "camelCase")]
    ArrayUpdate {
        /// Position of the replaced element.
        index: usize,
        /// Encoded new value.
        #[serde(default)]
        new_value: WireValue,
    },
    /// A contiguous list region was removed and new elements inserted.
    #[serde(rename_all = "camelCase")]
    ArraySplice {
        /// Position the splice starts at.
        index: usize,
        /// Number of elements removed starting at `index`.
        removed_count: usize,
        /// Encoded elements inserted at `index`.
        #[serde(default)]
        added: Vec<WireValue>,
    },
}

impl ChangeOp {
    /// Wire name of this operation, as carried in the `type` tag.
    #[must_use]
    pub const fn op_name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::ArrayUpdate { .. } => "arrayUpdate",
            Self::ArraySplice { .. } => "arraySplice",
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// A serialized change record, ready to cross a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Slash-delimited path from the graph root to the changed container.
    /// The root itself is the empty string.
    pub path: String,
    /// The operation that happened at `path`.
    pub change: ChangeOp,
    /// Schema tag for the payload, present only when the new value (or the
    /// first spliced-in element) is itself a schema'd model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serializer_model: Option<ModelKind>,
}
