//! Upstream connection status.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stagelink_types::{ChangeOp, ConnectionState, ModelKind, WireValue};

use crate::codec::{self, FieldCodec, Schema};
use crate::error::{ApplyError, CodecError};
use crate::models::{ApplyOutcome, StoreModel};

/// Health of the link to the upstream hub, replicated so overlays can
/// render connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudStatus {
    /// Where the upstream connection currently stands.
    pub connection_state: ConnectionState,
    /// Most recent round-trip latency measurement.
    pub latency_ms: Option<Decimal>,
}

impl Default for CloudStatus {
    fn default() -> Self {
        Self {
            connection_state: ConnectionState::Disconnected,
            latency_ms: None,
        }
    }
}

impl StoreModel for CloudStatus {
    const KIND: ModelKind = ModelKind::Cloud;

    const SCHEMA: Schema = Schema {
        model: ModelKind::Cloud,
        fields: &[
            ("connectionState", FieldCodec::Raw),
            ("latencyMs", FieldCodec::Raw),
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
                    "connectionState" => self.connection_state = codec::decode_raw(new_value)?,
                    "latencyMs" => self.latency_ms = codec::decode_raw(new_value)?,
                    other => {
                        return Err(ApplyError::UnknownField {
                            model: ModelKind::Cloud,
                            field: other.to_owned(),
                        })
                    }
                }
                Ok(ApplyOutcome::Applied)
            }
            ChangeOp::Delete { name } => {
                if name == "latencyMs" {
                    self.latency_ms = None;
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected_with_no_reading() {
        let cloud = CloudStatus::default();
        assert_eq!(cloud.connection_state, ConnectionState::Disconnected);
        assert_eq!(cloud.latency_ms, None);
    }

    #[test]
    fn connection_state_crosses_in_lowercase() {
        let wire = CloudStatus::default().to_wire().ok();
        let state = wire
            .as_ref()
            .and_then(|w| w.get("connectionState"))
            .cloned();
        assert_eq!(state, Some(serde_json::json!("disconnected")));
    }

    #[test]
    fn latency_updates_apply_as_decimal_strings() {
        let mut cloud = CloudStatus::default();
        let op = ChangeOp::Update {
            name: String::from("latencyMs"),
            new_value: serde_json::json!("12.5"),
        };
        let outcome = cloud.apply_at(&[], &op);
        assert!(matches!(outcome, Ok(ApplyOutcome::Applied)));
        assert_eq!(cloud.latency_ms, Some(Decimal::new(125, 1)));
    }
}
