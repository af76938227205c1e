//! Replicated application configuration.

use serde::{Deserialize, Serialize};
use stagelink_types::{ChangeOp, MixSettings, ModelKind, OverlayInstance, Theme, WireValue};
use uuid::Uuid;

use crate::codec::{self, FieldCodec, Schema};
use crate::error::{ApplyError, CodecError};
use crate::models::{apply_plain, apply_to_plain_list, ApplyOutcome, StoreModel};

/// User configuration, replicated so remote surfaces can render and, for
/// select fields, edit it.
///
/// The whole struct rides the same change stream as the rest of the
/// graph; persistence snapshots it independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudioConfig {
    /// Key identifying this installation to the upstream hub.
    pub api_key: Uuid,
    /// Whether the upstream connection should be established at all.
    pub enable_cloud: bool,
    /// UI theme selection.
    pub theme: Theme,
    /// Marker inserted into overlay text in place of track IDs.
    pub id_marker: String,
    /// Maximum number of entries kept in the played-track history.
    /// Zero disables trimming.
    pub history_limit: u32,
    /// Mix reporting behavior.
    pub mix_settings: MixSettings,
    /// Configured overlay instances.
    pub overlays: Vec<OverlayInstance>,
}

impl StudioConfig {
    /// Mint a fresh API key if the stored one is still the nil
    /// placeholder. Returns whether a key was minted.
    pub fn ensure_defaults(&mut self) -> bool {
        if self.api_key.is_nil() {
            self.api_key = Uuid::new_v4();
            true
        } else {
            false
        }
    }
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            api_key: Uuid::nil(),
            enable_cloud: false,
            theme: Theme::Light,
            id_marker: String::from("[ID]"),
            history_limit: 50,
            mix_settings: MixSettings::default(),
            overlays: Vec::new(),
        }
    }
}

impl StoreModel for StudioConfig {
    const KIND: ModelKind = ModelKind::Config;

    const SCHEMA: Schema = Schema {
        model: ModelKind::Config,
        fields: &[
            ("apiKey", FieldCodec::Raw),
            ("enableCloud", FieldCodec::Raw),
            ("theme", FieldCodec::Raw),
            ("idMarker", FieldCodec::Raw),
            ("historyLimit", FieldCodec::Raw),
            ("mixSettings", FieldCodec::Raw),
            ("overlays", FieldCodec::Raw),
        ],
    };

    fn to_wire(&self) -> Result<WireValue, CodecError> {
        codec::encode_raw(self)
    }

    fn from_wire(value: &WireValue) -> Result<Self, CodecError> {
        codec::decode_raw(value)
    }

    fn apply_at(
        &mut self,
        segments: &[&str],
        op: &ChangeOp,
    ) -> Result<ApplyOutcome, ApplyError> {
        let Some((head, rest)) = segments.split_first() else {
            return self.apply_here(op);
        };
        match *head {
            "mixSettings" => apply_plain(&mut self.mix_settings, rest, op),
            "overlays" => {
                let Some((index, below)) = rest.split_first() else {
                    return apply_to_plain_list(&mut self.overlays, op);
                };
                let index: usize = index.parse().map_err(|_err| ApplyError::InvalidKey {
                    key: (*index).to_owned(),
                })?;
                let Some(overlay) = self.overlays.get_mut(index) else {
                    return Ok(ApplyOutcome::Skipped);
                };
                apply_plain(overlay, below, op)
            }
            other => Err(ApplyError::UnknownField {
                model: ModelKind::Config,
                field: other.to_owned(),
            }),
        }
    }
}

impl StudioConfig {
    fn apply_here(&mut self, op: &ChangeOp) -> Result<ApplyOutcome, ApplyError> {
        match op {
            ChangeOp::Add { name, new_value } | ChangeOp::Update { name, new_value } => {
                match name.as_str() {
                    "apiKey" => self.api_key = codec::decode_raw(new_value)?,
                    "enableCloud" => self.enable_cloud = codec::decode_raw(new_value)?,
                    "theme" => self.theme = codec::decode_raw(new_value)?,
                    "idMarker" => self.id_marker = codec::decode_raw(new_value)?,
                    "historyLimit" => self.history_limit = codec::decode_raw(new_value)?,
                    "mixSettings" => self.mix_settings = codec::decode_raw(new_value)?,
                    "overlays" => self.overlays = codec::decode_raw(new_value)?,
                    other => {
                        return Err(ApplyError::UnknownField {
                            model: ModelKind::Config,
                            field: other.to_owned(),
                        })
                    }
                }
                Ok(ApplyOutcome::Applied)
            }
            ChangeOp::Delete { .. }
            | ChangeOp::ArrayUpdate { .. }
            | ChangeOp::ArraySplice { .. } => {
                Err(ApplyError::WrongContainer { op: op.op_name() })
            }
        }
    }
}
