//! Wire codecs for schema'd model fields.
//!
//! Every value that leaves the graph is encoded by exactly one rule,
//! resolved in precedence order:
//!
//! 1. the value's own type carries a [`Schema`] -> it serializes through
//!    that schema and the envelope is tagged with its
//!    [`ModelKind`](stagelink_types::ModelKind);
//! 2. otherwise the parent schema names a dedicated codec for the field
//!    ([`FieldCodec::Bytes`], [`FieldCodec::Timestamp`],
//!    [`FieldCodec::Addr`]);
//! 3. otherwise the value crosses as a raw deep plain copy, untagged.
//!
//! Decoding mirrors the same precedence. The helpers here are the
//! concrete rules; the per-model schema tables in [`crate::models`] say
//! which rule each field uses.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use stagelink_types::{ModelKind, WireValue};

use crate::error::CodecError;

// ---------------------------------------------------------------------------
// Schemas
// ---------------------------------------------------------------------------

/// The encoding rule one schema field travels through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCodec {
    /// Deep plain copy through serde, untagged.
    Raw,
    /// Byte buffer as a JSON array of integers in 0-255.
    Bytes,
    /// UTC timestamp as an RFC 3339 string.
    Timestamp,
    /// IP address as a string.
    Addr,
    /// A nested schema'd model.
    Model(ModelKind),
    /// An ordered list of schema'd models.
    ModelList(ModelKind),
    /// A map of schema'd models keyed by stringified keys.
    ModelMap(ModelKind),
    /// A map of schema'd models flattened into a list of entries, each
    /// carrying its own key field.
    ModelMapAsList(ModelKind),
}

/// Explicit serialization schema for one model: the ordered table of its
/// wire field names and the codec each field uses.
///
/// Schemas are `const` values registered once per model; lookup is total
/// over [`ModelKind`] via [`crate::models::schema_of`].
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    /// The model this schema describes.
    pub model: ModelKind,
    /// Wire field names in serialization order, with their codecs.
    pub fields: &'static [(&'static str, FieldCodec)],
}

impl Schema {
    /// Look up the codec a wire field travels through, or `None` when the
    /// field is not part of this schema.
    #[must_use]
    pub fn codec_for(&self, field: &str) -> Option<FieldCodec> {
        self.fields
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, codec)| *codec)
    }
}

// ---------------------------------------------------------------------------
// Concrete codecs
// ---------------------------------------------------------------------------

/// Encode any serde-serializable value as a raw wire value.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if the value cannot be represented as
/// JSON.
pub fn encode_raw<T: Serialize>(value: &T) -> Result<WireValue, CodecError> {
    Ok(serde_json::to_value(value)?)
}

/// Decode a raw wire value into a serde-deserializable type.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if the wire value does not match the
/// target type's shape.
pub fn decode_raw<T: DeserializeOwned>(value: &WireValue) -> Result<T, CodecError> {
    Ok(serde_json::from_value(value.clone())?)
}

/// Encode a byte buffer as an array of integers.
#[must_use]
pub fn encode_bytes(bytes: &[u8]) -> WireValue {
    WireValue::Array(bytes.iter().map(|b| WireValue::from(*b)).collect())
}

/// Decode an array of integers back into a byte buffer.
///
/// # Errors
///
/// Returns [`CodecError::InvalidBytes`] if the value is not an array or
/// any element is not an integer in 0-255.
pub fn decode_bytes(value: &WireValue) -> Result<Vec<u8>, CodecError> {
    let items = value
        .as_array()
        .ok_or_else(|| CodecError::InvalidBytes(String::from("expected an array")))?;
    items
        .iter()
        .map(|item| {
            item.as_u64()
                .and_then(|n| u8::try_from(n).ok())
                .ok_or_else(|| CodecError::InvalidBytes(format!("element {item} is not a byte")))
        })
        .collect()
}

/// Decode an RFC 3339 string back into a UTC timestamp.
///
/// # Errors
///
/// Returns [`CodecError::InvalidTimestamp`] if the value is not a string
/// or does not parse as RFC 3339.
pub fn decode_timestamp(value: &WireValue) -> Result<DateTime<Utc>, CodecError> {
    let text = value
        .as_str()
        .ok_or_else(|| CodecError::InvalidTimestamp(value.to_string()))?;
    DateTime::parse_from_rfc3339(text)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| CodecError::InvalidTimestamp(format!("{text}: {err}")))
}

/// Decode an address string back into an IP address.
///
/// # Errors
///
/// Returns [`CodecError::InvalidAddr`] if the value is not a string or
/// does not parse as an IPv4/IPv6 address.
pub fn decode_addr(value: &WireValue) -> Result<std::net::IpAddr, CodecError> {
    let text = value
        .as_str()
        .ok_or_else(|| CodecError::InvalidAddr(value.to_string()))?;
    text.parse()
        .map_err(|_err| CodecError::InvalidAddr(text.to_owned()))
}

/// Parse a stringified collection key back into its key type.
///
/// Only for key types that serialize as strings (media slots, table
/// names). Numerically keyed collections coerce their keys through
/// [`FromStr`](core::str::FromStr) at path resolution instead.
///
/// # Errors
///
/// Returns [`CodecError::InvalidKey`] if the string is not a valid key
/// of the target type.
pub fn parse_key<T: DeserializeOwned>(key: &str) -> Result<T, CodecError> {
    serde_json::from_value(WireValue::String(key.to_owned()))
        .map_err(|_err| CodecError::InvalidKey(key.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagelink_types::MediaSlot;

    #[test]
    fn bytes_round_trip() {
        let artwork = vec![0_u8, 127, 255];
        let wire = encode_bytes(&artwork);
        assert_eq!(wire, serde_json::json!([0, 127, 255]));
        assert_eq!(decode_bytes(&wire).ok(), Some(artwork));
    }

    #[test]
    fn bytes_reject_out_of_range_elements() {
        assert!(decode_bytes(&serde_json::json!([0, 256])).is_err());
        assert!(decode_bytes(&serde_json::json!([0, -1])).is_err());
        assert!(decode_bytes(&serde_json::json!("AAEC")).is_err());
    }

    #[test]
    fn timestamp_decodes_rfc3339() {
        use chrono::TimeZone;

        let wire = serde_json::json!("2024-06-01T20:30:00Z");
        let decoded = decode_timestamp(&wire).ok();
        assert_eq!(
            decoded,
            Utc.with_ymd_and_hms(2024, 6, 1, 20, 30, 0).single()
        );
        assert!(decode_timestamp(&serde_json::json!("last tuesday")).is_err());
        assert!(decode_timestamp(&serde_json::json!(1_717_273_800)).is_err());
    }

    #[test]
    fn addr_decodes_both_families() {
        let v4 = decode_addr(&serde_json::json!("10.0.0.5")).ok();
        assert_eq!(v4, "10.0.0.5".parse().ok());
        let v6 = decode_addr(&serde_json::json!("::1")).ok();
        assert_eq!(v6, "::1".parse().ok());
        assert!(decode_addr(&serde_json::json!("not-an-address")).is_err());
    }

    #[test]
    fn string_keys_parse_into_key_types() {
        assert_eq!(parse_key::<MediaSlot>("Usb").ok(), Some(MediaSlot::Usb));
        assert!(parse_key::<MediaSlot>("Floppy").is_err());
    }
}
