//! Error types for the client adapters.

use stagelink_store::CodecError;

/// Errors from establishing or running a relay connection.
///
/// The spawn loops treat all of these as session-ending and retry with
/// backoff, so they surface mainly in logs and in tests that drive a
/// single session directly.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The relay could not be reached or refused the upgrade.
    #[error("connect error: {0}")]
    Connect(String),

    /// The relay refused or garbled the opening exchange.
    #[error("handshake error: {0}")]
    Handshake(String),

    /// The connection failed mid-session.
    #[error("transport error: {0}")]
    Transport(String),

    /// Local graph state could not be encoded or decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}
