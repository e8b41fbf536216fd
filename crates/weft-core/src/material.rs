//! Raw key material.

use std::fmt;

use constant_time_eq::constant_time_eq_16;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::ManagerError;

/// 16 bytes of network, application, or device key material.
///
/// Zeroized on drop; equality is constant-time; `Debug` never prints the
/// bytes.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial(#[serde(with = "hex::serde")] [u8; 16]);

impl KeyMaterial {
    /// Wrap existing key bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Generate fresh random key material from the OS entropy source.
    #[must_use]
    pub fn random() -> Self {
        let mut bytes = [0u8; 16];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Parse key material from a wire byte slice, rejecting any other length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ManagerError> {
        let bytes: [u8; 16] = bytes
            .try_into()
            .map_err(|_| ManagerError::InvalidArguments("bad key"))?;
        Ok(Self(bytes))
    }

    /// Underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl PartialEq for KeyMaterial {
    fn eq(&self, other: &Self) -> bool {
        constant_time_eq_16(&self.0, &other.0)
    }
}

impl Eq for KeyMaterial {}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial(..)")
    }
}
