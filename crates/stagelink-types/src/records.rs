//! Plain data records carried inside the session graph.
//!
//! These types have no per-type serializer schema: they cross the wire as
//! deep plain copies (the `Raw` field codec) and are reconstructed with
//! serde on the far side. Field names are camelCase on the wire because
//! change-record path segments address them by their serialized names.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{DeviceKind, MediaSlot, MixMode, PlayState};
use crate::envelope::WireValue;
use crate::ids::DeviceId;

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

/// Identity of one device announced on the link network.
///
/// Unlike the other records in this module, `DeviceInfo` carries a
/// serializer schema (its address field uses the network-address codec),
/// so wholesale replacements travel with a `serializerModel` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// The player number the device announced.
    pub id: DeviceId,
    /// Model name reported by the device (e.g. `CDJ-3000`).
    pub name: String,
    /// Hardware classification.
    pub kind: DeviceKind,
    /// IP address the device announces from. String-encoded on the wire.
    #[ts(as = "String")]
    pub addr: std::net::IpAddr,
}

/// Live transport state of a player deck.
///
/// Mutated field-by-field as status packets arrive, so replicas receive
/// one change record per changed field rather than the whole record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    /// Current transport state.
    pub play_state: PlayState,
    /// Identifier of the loaded track within its source database.
    pub track_id: Option<u32>,
    /// Device the loaded track's media lives on.
    pub track_device: Option<DeviceId>,
    /// Media slot the loaded track was read from.
    pub track_slot: Option<MediaSlot>,
    /// Absolute beat counter since the track started.
    pub beat: Option<u32>,
    /// Position within the current measure (1-4).
    pub beat_in_measure: Option<u8>,
    /// Track tempo as mastered, in beats per minute.
    #[ts(as = "Option<String>")]
    pub bpm: Option<Decimal>,
    /// Pitch fader adjustment as a signed percentage.
    #[ts(as = "Option<String>")]
    pub pitch: Option<Decimal>,
    /// Whether the mixer reports this channel as on-air.
    pub is_on_air: bool,
    /// Whether the deck is beat-synced.
    pub is_sync: bool,
    /// Whether the deck is the tempo master.
    pub is_master: bool,
}

/// Metadata of a track loaded from a device database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Identifier within the source database.
    pub id: u32,
    /// Track title.
    pub title: String,
    /// Artist name, when present in the database.
    pub artist: Option<String>,
    /// Album name.
    pub album: Option<String>,
    /// Genre label.
    pub genre: Option<String>,
    /// Record label.
    pub label: Option<String>,
    /// Free-form comment field.
    pub comment: Option<String>,
    /// Track length in seconds.
    pub duration_secs: Option<u32>,
    /// Tempo as mastered.
    #[ts(as = "Option<String>")]
    pub bpm: Option<Decimal>,
    /// Musical key label.
    pub key: Option<String>,
}

// ---------------------------------------------------------------------------
// Database sync progress
// ---------------------------------------------------------------------------

/// Progress of fetching a device's database export over the network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct FetchProgress {
    /// Bytes read so far.
    pub read: u64,
    /// Total bytes, when the device reports one.
    pub total: Option<u64>,
}

/// Per-table progress of hydrating a fetched database export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct TableProgress {
    /// Entities hydrated so far.
    pub complete: u32,
    /// Total entities in the table.
    pub total: u32,
}

// ---------------------------------------------------------------------------
// Configuration records
// ---------------------------------------------------------------------------

/// Tunables of the mix-status processor.
///
/// Lives inside the studio configuration and is edited field-by-field from
/// the settings UI, so each field change replicates independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct MixSettings {
    /// Reporting strategy.
    pub mode: MixMode,
    /// Beats a track may be cut away before losing now-playing status.
    pub allowed_interrupt_beats: u32,
    /// Beats a track must play before being reported.
    pub beats_until_reported: u32,
    /// Minutes of silence that mark the end of a set.
    pub time_between_sets: u32,
    /// Whether the mixer's on-air flags gate reporting.
    pub use_on_air_status: bool,
}

impl Default for MixSettings {
    fn default() -> Self {
        Self {
            mode: MixMode::SmartTiming,
            allowed_interrupt_beats: 8,
            beats_until_reported: 128,
            time_between_sets: 30,
            use_on_air_status: true,
        }
    }
}

/// One configured overlay and its overlay-specific options.
///
/// The options blob is owned by the overlay implementation and treated as
/// an opaque deep-copied value here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct OverlayInstance {
    /// Stable key identifying this overlay instance in URLs.
    pub key: String,
    /// Which overlay implementation renders this instance.
    #[serde(rename = "type")]
    #[ts(rename = "type")]
    pub kind: String,
    /// Overlay-specific settings, opaque to the replication engine.
    pub options: WireValue,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn player_state_wire_names_are_camel_case() {
        let state = PlayerState {
            play_state: PlayState::Playing,
            bpm: Some(Decimal::new(12850, 2)),
            is_on_air: true,
            ..PlayerState::default()
        };
        let json = serde_json::to_value(&state).ok();
        let json = json.as_ref().and_then(|j| j.as_object());
        assert!(json.is_some_and(|o| o.contains_key("playState")));
        assert!(json.is_some_and(|o| o.contains_key("isOnAir")));
        assert!(json.is_some_and(|o| !o.contains_key("play_state")));
    }

    #[test]
    fn decimal_fields_serialize_as_strings() {
        let state = PlayerState {
            bpm: Some(Decimal::new(12850, 2)),
            ..PlayerState::default()
        };
        let json = serde_json::to_value(&state).ok();
        let bpm = json.as_ref().and_then(|j| j.get("bpm")).cloned();
        assert_eq!(bpm, Some(serde_json::json!("128.50")));
    }

    #[test]
    fn overlay_instance_uses_type_on_the_wire() {
        let overlay = OverlayInstance {
            key: String::from("ovl-1"),
            kind: String::from("nowPlaying"),
            options: serde_json::json!({"showArtwork": true}),
        };
        let json = serde_json::to_value(&overlay).ok();
        let json = json.as_ref().and_then(|j| j.as_object());
        assert!(json.is_some_and(|o| o.contains_key("type")));
        assert!(json.is_some_and(|o| !o.contains_key("kind")));
    }

    #[test]
    fn mix_settings_defaults_match_shipped_config() {
        let settings = MixSettings::default();
        assert_eq!(settings.mode, MixMode::SmartTiming);
        assert_eq!(settings.allowed_interrupt_beats, 8);
        assert_eq!(settings.beats_until_reported, 128);
        assert!(settings.use_on_air_status);
    }
}
