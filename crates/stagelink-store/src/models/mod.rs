//! The schema'd models that make up the session graph.
//!
//! Each model is a plain Rust struct with an explicit [`Schema`] const
//! describing how its fields cross the wire, and a [`StoreModel`] impl
//! providing encode, decode, and typed change application. Descent through
//! the graph is written out per model: objects resolve segments by wire
//! field name, maps by (possibly numerically coerced) key, lists by index.
//! Plain-record interiors are reached through a serde value detour so
//! arbitrary-depth changes inside untyped data still apply.
//!
//! # Modules
//!
//! - [`session`] -- The graph root ([`SessionStore`]) and the devices map
//! - [`device`] -- Per-device state ([`DeviceStore`], [`HydrationInfo`])
//! - [`mix`] -- Played-track history ([`MixStore`], [`PlayedTrack`])
//! - [`config`] -- Replicated application configuration ([`StudioConfig`])
//! - [`cloud`] -- Upstream connection status ([`CloudStatus`])

pub mod cloud;
pub mod config;
pub mod device;
pub mod mix;
pub mod session;

pub use cloud::CloudStatus;
pub use config::StudioConfig;
pub use device::{DeviceStore, HydrationInfo};
pub use mix::{MixStore, PlayedTrack};
pub use session::SessionStore;

use serde::Serialize;
use serde::de::DeserializeOwned;
use stagelink_types::{ChangeOp, ModelKind, WireValue};

use crate::codec::{self, Schema};
use crate::error::{ApplyError, CodecError};

/// What happened when a change record was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The target resolved and the change took effect.
    Applied,
    /// The target no longer exists; the change was dropped as a
    /// recognized race, not an error.
    Skipped,
}

/// A type that participates in the session graph with its own schema.
pub trait StoreModel: Sized {
    /// The tag carried in `serializerModel` for payloads of this type.
    const KIND: ModelKind;

    /// The explicit serialization schema for this model.
    const SCHEMA: Schema;

    /// Encode this instance into its wire form.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Json`] if a field cannot be represented as
    /// JSON; this does not happen for well-formed graph data.
    fn to_wire(&self) -> Result<WireValue, CodecError>;

    /// Reconstruct an instance from its wire form.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the wire value does not match this
    /// model's schema.
    fn from_wire(value: &WireValue) -> Result<Self, CodecError>;

    /// Apply one change record addressed `segments` below this model.
    ///
    /// An empty `segments` means the operation targets this model itself.
    ///
    /// # Errors
    ///
    /// Returns an [`ApplyError`] when the operation or its payload is
    /// malformed for the position it addresses. A missing target is not
    /// an error; it yields [`ApplyOutcome::Skipped`].
    fn apply_at(&mut self, segments: &[&str], op: &ChangeOp) -> Result<ApplyOutcome, ApplyError>;
}

/// Total schema lookup over the closed model set.
#[must_use]
pub const fn schema_of(kind: ModelKind) -> Schema {
    match kind {
        ModelKind::Session => SessionStore::SCHEMA,
        ModelKind::Device => DeviceStore::SCHEMA,
        ModelKind::DeviceInfo => stagelink_types::DeviceInfo::SCHEMA,
        ModelKind::Hydration => HydrationInfo::SCHEMA,
        ModelKind::Mix => MixStore::SCHEMA,
        ModelKind::Played => PlayedTrack::SCHEMA,
        ModelKind::Config => StudioConfig::SCHEMA,
        ModelKind::Cloud => CloudStatus::SCHEMA,
    }
}

// ---------------------------------------------------------------------------
// Shared apply plumbing
// ---------------------------------------------------------------------------

/// Apply a change inside a plain (schema-less) record.
///
/// The record makes a round trip through its serde value form: descend the
/// remaining segments inside that value, apply the operation, decode back.
/// This is how changes reach arbitrary depths of untyped interiors.
pub(crate) fn apply_plain<T>(
    target: &mut T,
    segments: &[&str],
    op: &ChangeOp,
) -> Result<ApplyOutcome, ApplyError>
where
    T: Serialize + DeserializeOwned,
{
    let mut value = codec::encode_raw(target)?;
    let Some(node) = descend_value(&mut value, segments)? else {
        return Ok(ApplyOutcome::Skipped);
    };
    let outcome = apply_to_value(node, op)?;
    if outcome == ApplyOutcome::Applied {
        *target = serde_json::from_value(value).map_err(CodecError::Json)?;
    }
    Ok(outcome)
}

/// Walk `segments` inside a wire value: objects by key, arrays by decimal
/// index. `Ok(None)` means a missing target (race); a non-numeric index
/// on an array is a malformed record.
pub(crate) fn descend_value<'a>(
    root: &'a mut WireValue,
    segments: &[&str],
) -> Result<Option<&'a mut WireValue>, ApplyError> {
    let mut node = root;
    for segment in segments {
        node = match node {
            WireValue::Object(map) => match map.get_mut(*segment) {
                Some(child) => child,
                None => return Ok(None),
            },
            WireValue::Array(items) => {
                let index: usize = segment.parse().map_err(|_err| ApplyError::InvalidKey {
                    key: (*segment).to_owned(),
                })?;
                match items.get_mut(index) {
                    Some(child) => child,
                    None => return Ok(None),
                }
            }
            _ => return Ok(None),
        };
    }
    Ok(Some(node))
}

/// Apply one operation to a plain wire-value container.
pub(crate) fn apply_to_value(
    target: &mut WireValue,
    op: &ChangeOp,
) -> Result<ApplyOutcome, ApplyError> {
    match op {
        ChangeOp::Add { name, new_value } | ChangeOp::Update { name, new_value } => {
            match target {
                WireValue::Object(map) => {
                    map.insert(name.clone(), new_value.clone());
                    Ok(ApplyOutcome::Applied)
                }
                WireValue::Array(items) => {
                    let index: usize = name.parse().map_err(|_err| ApplyError::InvalidKey {
                        key: name.clone(),
                    })?;
                    let len = items.len();
                    match items.get_mut(index) {
                        Some(slot) => {
                            *slot = new_value.clone();
                            Ok(ApplyOutcome::Applied)
                        }
                        None if index == len => {
                            items.push(new_value.clone());
                            Ok(ApplyOutcome::Applied)
                        }
                        None => Ok(ApplyOutcome::Skipped),
                    }
                }
                _ => Err(ApplyError::WrongContainer { op: op.op_name() }),
            }
        }
        ChangeOp::Delete { name } => match target {
            WireValue::Object(map) => {
                map.remove(name);
                Ok(ApplyOutcome::Applied)
            }
            WireValue::Array(items) => {
                let index: usize = name.parse().map_err(|_err| ApplyError::InvalidKey {
                    key: name.clone(),
                })?;
                if index < items.len() {
                    items.remove(index);
                    Ok(ApplyOutcome::Applied)
                } else {
                    Ok(ApplyOutcome::Skipped)
                }
            }
            _ => Err(ApplyError::WrongContainer { op: op.op_name() }),
        },
        ChangeOp::ArrayUpdate { index, new_value } => {
            let WireValue::Array(items) = target else {
                return Err(ApplyError::WrongContainer { op: op.op_name() });
            };
            let Some(slot) = items.get_mut(*index) else {
                return Ok(ApplyOutcome::Skipped);
            };
            *slot = new_value.clone();
            Ok(ApplyOutcome::Applied)
        }
        ChangeOp::ArraySplice {
            index,
            removed_count,
            added,
        } => {
            let WireValue::Array(items) = target else {
                return Err(ApplyError::WrongContainer { op: op.op_name() });
            };
            let start = (*index).min(items.len());
            let end = start.saturating_add(*removed_count).min(items.len());
            drop(items.splice(start..end, added.iter().cloned()));
            Ok(ApplyOutcome::Applied)
        }
    }
}

/// Apply an array operation to a list of schema'd models.
///
/// Spliced-in elements are decoded through the model schema exactly like
/// `add`/`update` payloads; a list never accepts plain values.
pub(crate) fn apply_to_model_list<M: StoreModel>(
    items: &mut Vec<M>,
    op: &ChangeOp,
) -> Result<ApplyOutcome, ApplyError> {
    match op {
        ChangeOp::ArrayUpdate { index, new_value } => {
            let Some(slot) = items.get_mut(*index) else {
                return Ok(ApplyOutcome::Skipped);
            };
            *slot = M::from_wire(new_value)?;
            Ok(ApplyOutcome::Applied)
        }
        ChangeOp::ArraySplice {
            index,
            removed_count,
            added,
        } => {
            let decoded = added
                .iter()
                .map(M::from_wire)
                .collect::<Result<Vec<_>, _>>()?;
            let start = (*index).min(items.len());
            let end = start.saturating_add(*removed_count).min(items.len());
            drop(items.splice(start..end, decoded));
            Ok(ApplyOutcome::Applied)
        }
        _ => Err(ApplyError::WrongContainer { op: op.op_name() }),
    }
}

/// Apply an array operation to a list of plain records.
pub(crate) fn apply_to_plain_list<T>(
    items: &mut Vec<T>,
    op: &ChangeOp,
) -> Result<ApplyOutcome, ApplyError>
where
    T: Serialize + DeserializeOwned,
{
    match op {
        ChangeOp::ArrayUpdate { index, new_value } => {
            let Some(slot) = items.get_mut(*index) else {
                return Ok(ApplyOutcome::Skipped);
            };
            *slot = codec::decode_raw(new_value)?;
            Ok(ApplyOutcome::Applied)
        }
        ChangeOp::ArraySplice {
            index,
            removed_count,
            added,
        } => {
            let decoded = added
                .iter()
                .map(codec::decode_raw)
                .collect::<Result<Vec<T>, _>>()?;
            let start = (*index).min(items.len());
            let end = start.saturating_add(*removed_count).min(items.len());
            drop(items.splice(start..end, decoded));
            Ok(ApplyOutcome::Applied)
        }
        _ => Err(ApplyError::WrongContainer { op: op.op_name() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FieldCodec;

    #[test]
    fn schema_registry_is_total_and_tagged_consistently() {
        for kind in [
            ModelKind::Session,
            ModelKind::Device,
            ModelKind::DeviceInfo,
            ModelKind::Hydration,
            ModelKind::Mix,
            ModelKind::Played,
            ModelKind::Config,
            ModelKind::Cloud,
        ] {
            assert_eq!(schema_of(kind).model, kind);
            assert!(!schema_of(kind).fields.is_empty());
        }
    }

    #[test]
    fn field_codec_lookup_follows_the_schema_tables() {
        let session = schema_of(ModelKind::Session);
        assert_eq!(
            session.codec_for("devices"),
            Some(FieldCodec::ModelMapAsList(ModelKind::Device))
        );
        let device = schema_of(ModelKind::Device);
        assert_eq!(device.codec_for("artwork"), Some(FieldCodec::Bytes));
        let info = schema_of(ModelKind::DeviceInfo);
        assert_eq!(info.codec_for("addr"), Some(FieldCodec::Addr));
        let played = schema_of(ModelKind::Played);
        assert_eq!(played.codec_for("playedAt"), Some(FieldCodec::Timestamp));
        assert_eq!(played.codec_for("remixer"), None);
    }

    #[test]
    fn descend_handles_objects_arrays_and_races() {
        let mut value = serde_json::json!({"a": {"b": [10, 20]}});
        let node = descend_value(&mut value, &["a", "b", "1"]);
        assert!(matches!(node, Ok(Some(n)) if *n == serde_json::json!(20)));

        let mut value = serde_json::json!({"a": {}});
        let node = descend_value(&mut value, &["a", "missing"]);
        assert!(matches!(node, Ok(None)));

        let mut value = serde_json::json!({"a": [1]});
        let node = descend_value(&mut value, &["a", "x"]);
        assert!(node.is_err());
    }

    #[test]
    fn value_splice_clamps_out_of_range() {
        let mut value = serde_json::json!([1, 2, 3]);
        let op = ChangeOp::ArraySplice {
            index: 2,
            removed_count: 10,
            added: vec![serde_json::json!(9)],
        };
        let outcome = apply_to_value(&mut value, &op);
        assert!(matches!(outcome, Ok(ApplyOutcome::Applied)));
        assert_eq!(value, serde_json::json!([1, 2, 9]));
    }

    #[test]
    fn object_ops_reject_scalar_targets() {
        let mut value = serde_json::json!(42);
        let op = ChangeOp::Update {
            name: String::from("x"),
            new_value: serde_json::json!(1),
        };
        assert!(apply_to_value(&mut value, &op).is_err());
    }
}
