//! The session graph root.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use stagelink_types::{ChangeOp, DeviceId, LinkState, ModelKind, WireValue};

use crate::codec::{self, FieldCodec, Schema};
use crate::error::{ApplyError, CodecError};
use crate::models::{
    apply_to_value, descend_value, ApplyOutcome, CloudStatus, DeviceStore, MixStore, StoreModel,
    StudioConfig,
};

/// The canonical state graph.
///
/// One instance is authoritative per process; replicas converge on it by
/// applying the change stream. The devices map is keyed by player number
/// in memory but flattens to a list of entries on the wire, each entry
/// carrying its own `id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStore {
    /// Whether local track databases have been hydrated.
    pub is_hydrated: bool,
    /// State of the link network binding.
    pub link_state: LinkState,
    /// Devices currently on the network, keyed by player number.
    #[serde(with = "device_map_wire")]
    pub devices: BTreeMap<DeviceId, DeviceStore>,
    /// Played-track reporting state.
    pub mixstatus: MixStore,
    /// Replicated user configuration.
    pub config: StudioConfig,
    /// Upstream connection health.
    pub cloud: CloudStatus,
    /// Signed-in user profile, opaque to the graph.
    pub user: Option<WireValue>,
}

impl StoreModel for SessionStore {
    const KIND: ModelKind = ModelKind::Session;

    const SCHEMA: Schema = Schema {
        model: ModelKind::Session,
        fields: &[
            ("isHydrated", FieldCodec::Raw),
            ("linkState", FieldCodec::Raw),
            ("devices", FieldCodec::ModelMapAsList(ModelKind::Device)),
            ("mixstatus", FieldCodec::Model(ModelKind::Mix)),
            ("config", FieldCodec::Model(ModelKind::Config)),
            ("cloud", FieldCodec::Model(ModelKind::Cloud)),
            ("user", FieldCodec::Raw),
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
            "devices" => self.apply_devices(rest, op),
            "mixstatus" => self.mixstatus.apply_at(rest, op),
            "config" => self.config.apply_at(rest, op),
            "cloud" => self.cloud.apply_at(rest, op),
            "user" => {
                let Some(user) = self.user.as_mut() else {
                    return Ok(ApplyOutcome::Skipped);
                };
                let Some(node) = descend_value(user, rest)? else {
                    return Ok(ApplyOutcome::Skipped);
                };
                apply_to_value(node, op)
            }
            other => Err(ApplyError::UnknownField {
                model: ModelKind::Session,
                field: other.to_owned(),
            }),
        }
    }
}

impl SessionStore {
    fn apply_here(&mut self, op: &ChangeOp) -> Result<ApplyOutcome, ApplyError> {
        match op {
            ChangeOp::Add { name, new_value } | ChangeOp::Update { name, new_value } => {
                match name.as_str() {
                    "isHydrated" => self.is_hydrated = codec::decode_raw(new_value)?,
                    "linkState" => self.link_state = codec::decode_raw(new_value)?,
                    "devices" => self.devices = decode_device_list(new_value)?,
                    "mixstatus" => self.mixstatus = MixStore::from_wire(new_value)?,
                    "config" => self.config = StudioConfig::from_wire(new_value)?,
                    "cloud" => self.cloud = CloudStatus::from_wire(new_value)?,
                    "user" => {
                        self.user = if new_value.is_null() {
                            None
                        } else {
                            Some(new_value.clone())
                        };
                    }
                    other => {
                        return Err(ApplyError::UnknownField {
                            model: ModelKind::Session,
                            field: other.to_owned(),
                        })
                    }
                }
                Ok(ApplyOutcome::Applied)
            }
            ChangeOp::Delete { name } => {
                if name == "user" {
                    self.user = None;
                    Ok(ApplyOutcome::Applied)
                } else {
                    Err(ApplyError::WrongContainer { op: op.op_name() })
                }
            }
            ChangeOp::ArrayUpdate { .. } | ChangeOp::ArraySplice { .. } => {
                Err(ApplyError::WrongContainer { op: op.op_name() })
            }
        }
    }

    /// Changes under `devices`. Map keys are player numbers serialized
    /// as decimal strings; an unparsable key is a malformed record, a
    /// missing device is a race.
    fn apply_devices(
        &mut self,
        segments: &[&str],
        op: &ChangeOp,
    ) -> Result<ApplyOutcome, ApplyError> {
        let Some((key, below)) = segments.split_first() else {
            return match op {
                ChangeOp::Add { name, new_value } | ChangeOp::Update { name, new_value } => {
                    let id = parse_device_key(name)?;
                    self.devices.insert(id, DeviceStore::from_wire(new_value)?);
                    Ok(ApplyOutcome::Applied)
                }
                ChangeOp::Delete { name } => {
                    let id = parse_device_key(name)?;
                    self.devices.remove(&id);
                    Ok(ApplyOutcome::Applied)
                }
                ChangeOp::ArrayUpdate { .. } | ChangeOp::ArraySplice { .. } => {
                    Err(ApplyError::WrongContainer { op: op.op_name() })
                }
            };
        };
        let id = parse_device_key(key)?;
        let Some(device) = self.devices.get_mut(&id) else {
            return Ok(ApplyOutcome::Skipped);
        };
        device.apply_at(below, op)
    }
}

fn parse_device_key(key: &str) -> Result<DeviceId, ApplyError> {
    key.parse().map_err(|_err| ApplyError::InvalidKey {
        key: key.to_owned(),
    })
}

fn decode_device_list(value: &WireValue) -> Result<BTreeMap<DeviceId, DeviceStore>, CodecError> {
    let entries: Vec<DeviceStore> = codec::decode_raw(value)?;
    Ok(entries.into_iter().map(|d| (d.id, d)).collect())
}

/// The devices map crosses the wire flattened into a list of entries;
/// each entry's `id` field is the map key.
mod device_map_wire {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serializer};
    use stagelink_types::DeviceId;

    use crate::models::DeviceStore;

    pub(super) fn serialize<S>(
        map: &BTreeMap<DeviceId, DeviceStore>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(map.values())
    }

    pub(super) fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<BTreeMap<DeviceId, DeviceStore>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entries = Vec::<DeviceStore>::deserialize(deserializer)?;
        Ok(entries.into_iter().map(|d| (d.id, d)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagelink_types::{DeviceInfo, DeviceKind};

    fn sample_device(id: u8) -> DeviceStore {
        DeviceStore::new(DeviceInfo {
            id: DeviceId(id),
            name: String::from("CDJ-3000"),
            kind: DeviceKind::Player,
            addr: std::net::IpAddr::V4(std::net::Ipv4Addr::new(10, 0, 0, id)),
        })
    }

    #[test]
    fn wire_form_matches_schema_fields() {
        let wire = SessionStore::default().to_wire().ok();
        let keys: Vec<String> = wire
            .as_ref()
            .and_then(|w| w.as_object())
            .map(|obj| obj.keys().cloned().collect())
            .unwrap_or_default();
        let mut expected: Vec<String> = SessionStore::SCHEMA
            .fields
            .iter()
            .map(|(name, _)| (*name).to_owned())
            .collect();
        expected.sort();
        assert_eq!(keys, expected);
    }

    #[test]
    fn devices_flatten_to_a_list_on_the_wire() {
        let mut session = SessionStore::default();
        let device = sample_device(2);
        session.devices.insert(device.id, device);
        let wire = session.to_wire().ok();
        let devices = wire.as_ref().and_then(|w| w.get("devices")).cloned();
        assert!(devices.as_ref().is_some_and(WireValue::is_array));
        let first_id = devices
            .as_ref()
            .and_then(|d| d.get(0))
            .and_then(|entry| entry.get("id"))
            .cloned();
        assert_eq!(first_id, Some(serde_json::json!(2)));
    }

    #[test]
    fn snapshot_round_trip_rebuilds_the_device_map() {
        let mut session = SessionStore::default();
        session.is_hydrated = true;
        session.link_state = LinkState::Connected;
        for id in [1_u8, 4] {
            let device = sample_device(id);
            session.devices.insert(device.id, device);
        }
        session.user = Some(serde_json::json!({"profile": {"displayName": "dj"}}));
        let wire = session.to_wire().ok();
        let back = wire.as_ref().and_then(|w| SessionStore::from_wire(w).ok());
        assert_eq!(back, Some(session));
    }

    #[test]
    fn map_add_coerces_numeric_keys() {
        let mut session = SessionStore::default();
        let device = sample_device(3);
        let op = ChangeOp::Add {
            name: String::from("3"),
            new_value: device.to_wire().unwrap_or(WireValue::Null),
        };
        let outcome = session.apply_at(&["devices"], &op);
        assert!(matches!(outcome, Ok(ApplyOutcome::Applied)));
        assert!(session.devices.contains_key(&DeviceId(3)));
    }

    #[test]
    fn non_numeric_device_keys_are_rejected() {
        let mut session = SessionStore::default();
        let op = ChangeOp::Delete {
            name: String::from("all"),
        };
        assert!(session.apply_at(&["devices"], &op).is_err());
    }

    #[test]
    fn updates_for_departed_devices_are_skipped() {
        let mut session = SessionStore::default();
        let op = ChangeOp::Update {
            name: String::from("isOnAir"),
            new_value: serde_json::json!(true),
        };
        let outcome = session.apply_at(&["devices", "2", "state"], &op);
        assert!(matches!(outcome, Ok(ApplyOutcome::Skipped)));
    }

    #[test]
    fn user_subtree_applies_as_plain_data() {
        let mut session = SessionStore::default();
        session.user = Some(serde_json::json!({"profile": {"displayName": "dj"}}));
        let op = ChangeOp::Update {
            name: String::from("displayName"),
            new_value: serde_json::json!("headliner"),
        };
        let outcome = session.apply_at(&["user", "profile"], &op);
        assert!(matches!(outcome, Ok(ApplyOutcome::Applied)));
        let name = session
            .user
            .as_ref()
            .and_then(|u| u.pointer("/profile/displayName"))
            .cloned();
        assert_eq!(name, Some(serde_json::json!("headliner")));

        let delete = ChangeOp::Delete {
            name: String::from("user"),
        };
        let outcome = session.apply_at(&[], &delete);
        assert!(matches!(outcome, Ok(ApplyOutcome::Applied)));
        assert_eq!(session.user, None);
    }
}
