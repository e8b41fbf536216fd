//! Unprovisioned device identity.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ManagerError;

/// A 16-byte device UUID carried in unprovisioned beacons and scan reports.
///
/// The all-zero UUID is valid data but carries "no filter" semantics in a
/// scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceUuid(#[serde(with = "hex::serde")] [u8; 16]);

impl DeviceUuid {
    /// The all-zero UUID.
    pub const ZERO: Self = Self([0u8; 16]);

    /// Wrap a 16-byte UUID.
    #[must_use]
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Parse a UUID from a wire byte slice, rejecting any other length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ManagerError> {
        let bytes: [u8; 16] = bytes
            .try_into()
            .map_err(|_| ManagerError::InvalidArguments("bad device UUID"))?;
        Ok(Self(bytes))
    }

    /// Underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Whether this is the all-zero UUID.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 16]
    }
}

impl From<[u8; 16]> for DeviceUuid {
    fn from(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

impl From<uuid::Uuid> for DeviceUuid {
    fn from(uuid: uuid::Uuid) -> Self {
        Self(uuid.into_bytes())
    }
}

impl From<DeviceUuid> for uuid::Uuid {
    fn from(uuid: DeviceUuid) -> Self {
        Self::from_bytes(uuid.0)
    }
}

impl fmt::Display for DeviceUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_slice_rejects_wrong_length() {
        assert!(DeviceUuid::from_slice(&[0u8; 15]).is_err());
        assert!(DeviceUuid::from_slice(&[0u8; 17]).is_err());
        assert!(DeviceUuid::from_slice(&[0u8; 16]).is_ok());
    }

    #[test]
    fn zero_marks_no_filter() {
        assert!(DeviceUuid::ZERO.is_zero());
        assert!(!DeviceUuid::new([1u8; 16]).is_zero());
    }

    #[test]
    fn round_trips_through_rfc4122() {
        let external = uuid::Uuid::new_v4();
        let device = DeviceUuid::from(external);
        assert_eq!(uuid::Uuid::from(device), external);
    }
}
