//! Per-device state: the devices-map entry and its hydration tracker.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use stagelink_types::{
    ChangeOp, DeviceId, DeviceInfo, FetchProgress, MediaSlot, ModelKind, PlayerState,
    TableProgress, Track, WireValue,
};

use crate::codec::{self, FieldCodec, Schema};
use crate::error::{ApplyError, CodecError};
use crate::models::{apply_plain, ApplyOutcome, StoreModel};

/// Everything known about a single device on the link network.
///
/// Created when the device announces itself and dropped when it leaves.
/// The `state` subtree is mutated field-by-field as status packets arrive;
/// the rest is replaced wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStore {
    /// Player number, duplicated from `device` so map entries carry their
    /// own key in the flattened snapshot form.
    pub id: DeviceId,
    /// Identity the device announced.
    pub device: DeviceInfo,
    /// Live transport state. `None` until the first status packet.
    pub state: Option<PlayerState>,
    /// Currently loaded track metadata.
    pub track: Option<Track>,
    /// Artwork of the loaded track.
    pub artwork: Option<Vec<u8>>,
    /// Database fetch progress per media slot.
    pub fetch_progress: BTreeMap<MediaSlot, FetchProgress>,
    /// Database hydration progress per media slot.
    pub hydration_progress: BTreeMap<MediaSlot, HydrationInfo>,
}

impl DeviceStore {
    /// Create the entry for a newly announced device.
    #[must_use]
    pub const fn new(device: DeviceInfo) -> Self {
        Self {
            id: device.id,
            device,
            state: None,
            track: None,
            artwork: None,
            fetch_progress: BTreeMap::new(),
            hydration_progress: BTreeMap::new(),
        }
    }
}

impl StoreModel for DeviceStore {
    const KIND: ModelKind = ModelKind::Device;

    const SCHEMA: Schema = Schema {
        model: ModelKind::Device,
        fields: &[
            ("id", FieldCodec::Raw),
            ("device", FieldCodec::Model(ModelKind::DeviceInfo)),
            ("state", FieldCodec::Raw),
            ("track", FieldCodec::Raw),
            ("artwork", FieldCodec::Bytes),
            ("fetchProgress", FieldCodec::Raw),
            ("hydrationProgress", FieldCodec::ModelMap(ModelKind::Hydration)),
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
            "device" => self.device.apply_at(rest, op),
            "state" => {
                let Some(state) = self.state.as_mut() else {
                    return Ok(ApplyOutcome::Skipped);
                };
                apply_plain(state, rest, op)
            }
            "track" => {
                let Some(track) = self.track.as_mut() else {
                    return Ok(ApplyOutcome::Skipped);
                };
                apply_plain(track, rest, op)
            }
            "fetchProgress" => {
                let Some((slot, below)) = rest.split_first() else {
                    return apply_to_slot_map(&mut self.fetch_progress, op, |value| {
                        codec::decode_raw(value).map_err(ApplyError::from)
                    });
                };
                let slot: MediaSlot = codec::parse_key(slot)?;
                let Some(progress) = self.fetch_progress.get_mut(&slot) else {
                    return Ok(ApplyOutcome::Skipped);
                };
                apply_plain(progress, below, op)
            }
            "hydrationProgress" => {
                let Some((slot, below)) = rest.split_first() else {
                    return apply_to_slot_map(&mut self.hydration_progress, op, |value| {
                        HydrationInfo::from_wire(value).map_err(ApplyError::from)
                    });
                };
                let slot: MediaSlot = codec::parse_key(slot)?;
                let Some(info) = self.hydration_progress.get_mut(&slot) else {
                    return Ok(ApplyOutcome::Skipped);
                };
                info.apply_at(below, op)
            }
            other => Err(ApplyError::UnknownField {
                model: ModelKind::Device,
                field: other.to_owned(),
            }),
        }
    }
}

impl DeviceStore {
    fn apply_here(&mut self, op: &ChangeOp) -> Result<ApplyOutcome, ApplyError> {
        match op {
            ChangeOp::Add { name, new_value } | ChangeOp::Update { name, new_value } => {
                match name.as_str() {
                    "id" => self.id = codec::decode_raw(new_value)?,
                    "device" => self.device = DeviceInfo::from_wire(new_value)?,
                    "state" => self.state = codec::decode_raw(new_value)?,
                    "track" => self.track = codec::decode_raw(new_value)?,
                    "artwork" => {
                        self.artwork = if new_value.is_null() {
                            None
                        } else {
                            Some(codec::decode_bytes(new_value)?)
                        };
                    }
                    "fetchProgress" => self.fetch_progress = codec::decode_raw(new_value)?,
                    "hydrationProgress" => {
                        self.hydration_progress = codec::decode_raw(new_value)?;
                    }
                    other => {
                        return Err(ApplyError::UnknownField {
                            model: ModelKind::Device,
                            field: other.to_owned(),
                        })
                    }
                }
                Ok(ApplyOutcome::Applied)
            }
            ChangeOp::Delete { name } => match name.as_str() {
                "state" => {
                    self.state = None;
                    Ok(ApplyOutcome::Applied)
                }
                "track" => {
                    self.track = None;
                    Ok(ApplyOutcome::Applied)
                }
                "artwork" => {
                    self.artwork = None;
                    Ok(ApplyOutcome::Applied)
                }
                _ => Err(ApplyError::WrongContainer { op: op.op_name() }),
            },
            ChangeOp::ArrayUpdate { .. } | ChangeOp::ArraySplice { .. } => {
                Err(ApplyError::WrongContainer { op: op.op_name() })
            }
        }
    }
}

/// Apply a map operation to a slot-keyed collection, decoding values with
/// `decode`. Slot keys are strings on the wire and parse through serde,
/// never numeric coercion.
fn apply_to_slot_map<V>(
    map: &mut BTreeMap<MediaSlot, V>,
    op: &ChangeOp,
    decode: impl Fn(&WireValue) -> Result<V, ApplyError>,
) -> Result<ApplyOutcome, ApplyError> {
    match op {
        ChangeOp::Add { name, new_value } | ChangeOp::Update { name, new_value } => {
            let slot: MediaSlot = codec::parse_key(name)?;
            map.insert(slot, decode(new_value)?);
            Ok(ApplyOutcome::Applied)
        }
        ChangeOp::Delete { name } => {
            let slot: MediaSlot = codec::parse_key(name)?;
            map.remove(&slot);
            Ok(ApplyOutcome::Applied)
        }
        ChangeOp::ArrayUpdate { .. } | ChangeOp::ArraySplice { .. } => {
            Err(ApplyError::WrongContainer { op: op.op_name() })
        }
    }
}

// ---------------------------------------------------------------------------
// Hydration tracking
// ---------------------------------------------------------------------------

/// Progress of hydrating one media slot's database export, per table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HydrationInfo {
    /// Per-table progress, keyed by table name. Table names are opaque
    /// strings even when they look numeric.
    pub per_table: BTreeMap<String, TableProgress>,
    /// Set once every table has finished hydrating.
    pub is_done: bool,
}

impl HydrationInfo {
    /// Total entities across all tables.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.per_table
            .values()
            .fold(0_u32, |sum, table| sum.saturating_add(table.total))
    }

    /// Completed entities across all tables.
    #[must_use]
    pub fn complete(&self) -> u32 {
        self.per_table
            .values()
            .fold(0_u32, |sum, table| sum.saturating_add(table.complete))
    }
}

impl StoreModel for HydrationInfo {
    const KIND: ModelKind = ModelKind::Hydration;

    const SCHEMA: Schema = Schema {
        model: ModelKind::Hydration,
        fields: &[
            ("perTable", FieldCodec::Raw),
            ("isDone", FieldCodec::Raw),
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
                        "perTable" => self.per_table = codec::decode_raw(new_value)?,
                        "isDone" => self.is_done = codec::decode_raw(new_value)?,
                        other => {
                            return Err(ApplyError::UnknownField {
                                model: ModelKind::Hydration,
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
            };
        };
        if *head != "perTable" {
            return Err(ApplyError::UnknownField {
                model: ModelKind::Hydration,
                field: (*head).to_owned(),
            });
        }
        let Some((table, below)) = rest.split_first() else {
            return match op {
                ChangeOp::Add { name, new_value } | ChangeOp::Update { name, new_value } => {
                    self.per_table
                        .insert(name.clone(), codec::decode_raw(new_value)?);
                    Ok(ApplyOutcome::Applied)
                }
                ChangeOp::Delete { name } => {
                    self.per_table.remove(name);
                    Ok(ApplyOutcome::Applied)
                }
                ChangeOp::ArrayUpdate { .. } | ChangeOp::ArraySplice { .. } => {
                    Err(ApplyError::WrongContainer { op: op.op_name() })
                }
            };
        };
        let Some(progress) = self.per_table.get_mut(*table) else {
            return Ok(ApplyOutcome::Skipped);
        };
        apply_plain(progress, below, op)
    }
}

// ---------------------------------------------------------------------------
// Device identity
// ---------------------------------------------------------------------------

impl StoreModel for DeviceInfo {
    const KIND: ModelKind = ModelKind::DeviceInfo;

    const SCHEMA: Schema = Schema {
        model: ModelKind::DeviceInfo,
        fields: &[
            ("id", FieldCodec::Raw),
            ("name", FieldCodec::Raw),
            ("kind", FieldCodec::Raw),
            ("addr", FieldCodec::Addr),
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
        if !segments.is_empty() {
            return Err(ApplyError::WrongContainer { op: op.op_name() });
        }
        match op {
            ChangeOp::Add { name, new_value } | ChangeOp::Update { name, new_value } => {
                match name.as_str() {
                    "id" => self.id = codec::decode_raw(new_value)?,
                    "name" => self.name = codec::decode_raw(new_value)?,
                    "kind" => self.kind = codec::decode_raw(new_value)?,
                    "addr" => self.addr = codec::decode_addr(new_value)?,
                    other => {
                        return Err(ApplyError::UnknownField {
                            model: ModelKind::DeviceInfo,
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

#[cfg(test)]
mod tests {
    use super::*;
    use stagelink_types::DeviceKind;

    fn sample_device(id: u8) -> DeviceStore {
        DeviceStore::new(DeviceInfo {
            id: DeviceId(id),
            name: String::from("CDJ-3000"),
            kind: DeviceKind::Player,
            addr: std::net::IpAddr::V4(std::net::Ipv4Addr::new(10, 0, 0, 5)),
        })
    }

    #[test]
    fn device_round_trips_through_its_schema() {
        let mut device = sample_device(5);
        device.artwork = Some(vec![1, 2, 3]);
        device.fetch_progress.insert(
            MediaSlot::Usb,
            FetchProgress {
                read: 512,
                total: Some(2048),
            },
        );
        let wire = device.to_wire().ok();
        let back = wire.as_ref().and_then(|w| DeviceStore::from_wire(w).ok());
        assert_eq!(back, Some(device));
    }

    #[test]
    fn wire_form_matches_schema_fields() {
        let wire = sample_device(2).to_wire().ok();
        let keys: Vec<String> = wire
            .as_ref()
            .and_then(|w| w.as_object())
            .map(|obj| obj.keys().cloned().collect())
            .unwrap_or_default();
        let mut expected: Vec<String> = DeviceStore::SCHEMA
            .fields
            .iter()
            .map(|(name, _)| (*name).to_owned())
            .collect();
        expected.sort();
        assert_eq!(keys, expected);
    }

    #[test]
    fn state_field_update_applies_into_plain_record() {
        let mut device = sample_device(5);
        device.state = Some(PlayerState::default());
        let op = ChangeOp::Update {
            name: String::from("bpm"),
            new_value: serde_json::json!("174.00"),
        };
        let outcome = device.apply_at(&["state"], &op);
        assert!(matches!(outcome, Ok(ApplyOutcome::Applied)));
        let bpm = device.state.and_then(|s| s.bpm);
        assert_eq!(bpm, Some(rust_decimal::Decimal::new(17_400, 2)));
    }

    #[test]
    fn state_update_without_state_is_a_skipped_race() {
        let mut device = sample_device(5);
        let op = ChangeOp::Update {
            name: String::from("beat"),
            new_value: serde_json::json!(64),
        };
        let outcome = device.apply_at(&["state"], &op);
        assert!(matches!(outcome, Ok(ApplyOutcome::Skipped)));
    }

    #[test]
    fn hydration_totals_sum_across_tables() {
        let mut info = HydrationInfo::default();
        info.per_table.insert(
            String::from("track"),
            TableProgress {
                complete: 10,
                total: 100,
            },
        );
        info.per_table.insert(
            String::from("artist"),
            TableProgress {
                complete: 5,
                total: 20,
            },
        );
        assert_eq!(info.total(), 120);
        assert_eq!(info.complete(), 15);
    }

    #[test]
    fn numeric_looking_table_names_stay_strings() {
        let mut info = HydrationInfo::default();
        let op = ChangeOp::Add {
            name: String::from("100"),
            new_value: serde_json::json!({"complete": 1, "total": 2}),
        };
        let outcome = info.apply_at(&["perTable"], &op);
        assert!(matches!(outcome, Ok(ApplyOutcome::Applied)));
        assert!(info.per_table.contains_key("100"));
    }

    #[test]
    fn unknown_media_slot_key_is_an_error() {
        let mut device = sample_device(5);
        let op = ChangeOp::Add {
            name: String::from("Cassette"),
            new_value: serde_json::json!({"read": 0, "total": null}),
        };
        assert!(device.apply_at(&["fetchProgress"], &op).is_err());
    }
}
