//! Played-track history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stagelink_types::{ChangeOp, ModelKind, Track, WireValue};

use crate::codec::{self, FieldCodec, Schema};
use crate::error::{ApplyError, CodecError};
use crate::models::{apply_plain, apply_to_model_list, ApplyOutcome, StoreModel};

/// Mix state: the ordered history of tracks reported as played.
///
/// The history only changes through splices and index updates, so
/// replicas converge on the exact same ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixStore {
    /// Reported tracks, oldest first.
    pub track_history: Vec<PlayedTrack>,
}

impl StoreModel for MixStore {
    const KIND: ModelKind = ModelKind::Mix;

    const SCHEMA: Schema = Schema {
        model: ModelKind::Mix,
        fields: &[("trackHistory", FieldCodec::ModelList(ModelKind::Played))],
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
            return match op {
                ChangeOp::Add { name, new_value } | ChangeOp::Update { name, new_value } => {
                    match name.as_str() {
                        "trackHistory" => {
                            self.track_history = codec::decode_raw(new_value)?;
                            Ok(ApplyOutcome::Applied)
                        }
                        other => Err(ApplyError::UnknownField {
                            model: ModelKind::Mix,
                            field: other.to_owned(),
                        }),
                    }
                }
                ChangeOp::Delete { .. }
                | ChangeOp::ArrayUpdate { .. }
                | ChangeOp::ArraySplice { .. } => {
                    Err(ApplyError::WrongContainer { op: op.op_name() })
                }
            };
        };
        if *head != "trackHistory" {
            return Err(ApplyError::UnknownField {
                model: ModelKind::Mix,
                field: (*head).to_owned(),
            });
        }
        let Some((index, below)) = rest.split_first() else {
            return apply_to_model_list(&mut self.track_history, op);
        };
        let index: usize = index.parse().map_err(|_err| ApplyError::InvalidKey {
            key: (*index).to_owned(),
        })?;
        let Some(played) = self.track_history.get_mut(index) else {
            return Ok(ApplyOutcome::Skipped);
        };
        played.apply_at(below, op)
    }
}

// ---------------------------------------------------------------------------
// History entries
// ---------------------------------------------------------------------------

/// One entry in the played-track history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayedTrack {
    /// When the track was reported as played.
    pub played_at: DateTime<Utc>,
    /// Metadata of the played track, captured at report time.
    pub track: Track,
    /// Artwork captured at report time.
    pub artwork: Option<Vec<u8>>,
}

impl PlayedTrack {
    /// Create a history entry without artwork.
    #[must_use]
    pub const fn new(played_at: DateTime<Utc>, track: Track) -> Self {
        Self {
            played_at,
            track,
            artwork: None,
        }
    }
}

impl StoreModel for PlayedTrack {
    const KIND: ModelKind = ModelKind::Played;

    const SCHEMA: Schema = Schema {
        model: ModelKind::Played,
        fields: &[
            ("playedAt", FieldCodec::Timestamp),
            ("track", FieldCodec::Raw),
            ("artwork", FieldCodec::Bytes),
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
            return match op {
                ChangeOp::Add { name, new_value } | ChangeOp::Update { name, new_value } => {
                    match name.as_str() {
                        "playedAt" => self.played_at = codec::decode_timestamp(new_value)?,
                        "track" => self.track = codec::decode_raw(new_value)?,
                        "artwork" => {
                            self.artwork = if new_value.is_null() {
                                None
                            } else {
                                Some(codec::decode_bytes(new_value)?)
                            };
                        }
                        other => {
                            return Err(ApplyError::UnknownField {
                                model: ModelKind::Played,
                                field: other.to_owned(),
                            })
                        }
                    }
                    Ok(ApplyOutcome::Applied)
                }
                ChangeOp::Delete { name } => {
                    if name == "artwork" {
                        self.artwork = None;
                        Ok(ApplyOutcome::Applied)
                    } else {
                        Err(ApplyError::WrongContainer { op: op.op_name() })
                    }
                }
                ChangeOp::ArrayUpdate { .. } | ChangeOp::ArraySplice { .. } => {
                    Err(ApplyError::WrongContainer { op: op.op_name() })
                }
            };
        };
        if *head == "track" {
            apply_plain(&mut self.track, rest, op)
        } else {
            Err(ApplyError::UnknownField {
                model: ModelKind::Played,
                field: (*head).to_owned(),
            })
        }
    }
}
