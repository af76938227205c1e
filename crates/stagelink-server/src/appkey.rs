//! Public overlay key derivation.
//!
//! Overlay URLs are shared on stream layouts and chat commands, so they
//! must not contain the API key itself. Overlays are addressed by a
//! truncated digest of the key instead: stable across restarts, cheap
//! to derive on every ingest connection, and useless for recovering
//! the key.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Length of the public key carried in overlay URLs.
const APP_KEY_LEN: usize = 20;

/// Derive the public overlay key for a private API key.
///
/// The digest is SHA-256 of the key's canonical hyphenated form,
/// hex-encoded and truncated to [`APP_KEY_LEN`] characters.
#[must_use]
pub fn derive(api_key: &Uuid) -> String {
    let digest = Sha256::digest(api_key.to_string().as_bytes());
    let mut encoded = hex::encode(digest);
    encoded.truncate(APP_KEY_LEN);
    encoded
}
