//! Error types for the replication engine.
//!
//! Errors are scoped to the operation family that produces them:
//! [`CodecError`] for wire encode/decode, [`ApplyError`] for applying a
//! change record to a replica, [`PersistError`] for the settings file.
//! An unresolvable path at apply time is deliberately *not* an error;
//! see [`ApplyOutcome`](crate::models::ApplyOutcome).

use stagelink_types::ModelKind;

/// Errors produced while encoding or decoding wire values.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A serde serialization or deserialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A model payload was not the JSON object its schema requires.
    #[error("{model} payload is not an object")]
    NotAnObject {
        /// The model being decoded.
        model: ModelKind,
    },

    /// A model payload is missing a field its schema requires.
    #[error("missing field `{field}` in {model} payload")]
    MissingField {
        /// The model being decoded.
        model: ModelKind,
        /// The absent wire field name.
        field: &'static str,
    },

    /// A byte-buffer value was not an array of integers in 0-255.
    #[error("invalid byte buffer: {0}")]
    InvalidBytes(String),

    /// A timestamp value was not an RFC 3339 string.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// A network address value was not a parseable address string.
    #[error("invalid network address: {0}")]
    InvalidAddr(String),

    /// A collection key could not be parsed as the key type the
    /// collection uses.
    #[error("invalid collection key `{0}`")]
    InvalidKey(String),
}

/// Errors produced while applying a change record to a replica.
///
/// Every variant means the envelope itself was malformed for the position
/// it addressed. Callers must contain these per envelope so one bad record
/// cannot stop subsequent records from applying.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// The payload could not be decoded into the type the target
    /// position holds.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A path segment or operation key could not be coerced into the
    /// addressed collection's key type.
    #[error("key `{key}` is not valid for this collection")]
    InvalidKey {
        /// The offending key or segment.
        key: String,
    },

    /// The operation named a field the addressed model does not have.
    #[error("unknown field `{field}` on {model}")]
    UnknownField {
        /// The model the operation addressed.
        model: ModelKind,
        /// The unrecognized wire field name.
        field: String,
    },

    /// The operation kind does not fit the container at the addressed
    /// path (an array operation on an object, or the reverse).
    #[error("`{op}` cannot be applied to the container at this path")]
    WrongContainer {
        /// Wire name of the offending operation.
        op: &'static str,
    },

    /// A record arrived on the config backchannel addressing something
    /// outside the config subtree.
    #[error("config channel rejects path `{path}`")]
    OutsideConfig {
        /// The out-of-bounds path.
        path: String,
    },
}

/// Errors produced while loading or saving the settings file.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// Reading or writing the settings file failed.
    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The settings file content could not be decoded as a config.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The settings file was not valid JSON at all.
    #[error("settings file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
