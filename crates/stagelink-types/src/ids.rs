//! The numeric device identifier used to key the devices map.
//!
//! Pro-link hardware reports a small player number (1-6 for players, higher
//! values for mixers and laptop software). Unlike the app-minted UUIDs used
//! elsewhere, these identifiers come from the wire, so [`DeviceId`] is a thin
//! `u8` newtype with decimal string parsing.
//!
//! Collection keys travel as decimal string path segments; [`DeviceId`]'s
//! [`FromStr`] impl is the single place that coercion back to a number lives.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Error returned when a path segment or wire value is not a valid device id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid device id {value:?}: expected a decimal number in 0-255")]
pub struct DeviceIdError {
    /// The offending input.
    pub value: String,
}

/// Identifier for one device on the link network.
///
/// Serializes as a bare number on the wire. When used as a map key it is
/// carried as a decimal string and coerced back at path-resolution time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub struct DeviceId(pub u8);

impl DeviceId {
    /// Return the inner player number.
    pub const fn into_inner(self) -> u8 {
        self.0
    }
}

impl core::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for DeviceId {
    fn from(id: u8) -> Self {
        Self(id)
    }
}

impl From<DeviceId> for u8 {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

impl FromStr for DeviceId {
    type Err = DeviceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u8>().map(Self).map_err(|_err| DeviceIdError {
            value: s.to_owned(),
        })
    }
}
