//! Key records as the durable store holds them.

use serde::{Deserialize, Serialize};

use weft_core::{AppKeyIndex, KeyMaterial, ManagerError, NetKeyIndex, UnicastAddress};

/// Phase of the network key-refresh procedure.
///
/// `None` means no refresh is underway and the old/new slots hold identical
/// material. `One` distributes the new key, `Two` switches traffic over the
/// air, `Three` revokes the old key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub enum KeyRefreshPhase {
    /// No refresh underway.
    #[default]
    None,
    /// New key distributed to nodes.
    One,
    /// Network transmitting with the new key.
    Two,
    /// Old key revoked; refresh completing.
    Three,
}

impl KeyRefreshPhase {
    /// Decode the wire phase byte (`0..=3`).
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::None),
            1 => Some(Self::One),
            2 => Some(Self::Two),
            3 => Some(Self::Three),
            _ => None,
        }
    }

    /// Wire phase byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::None => 0,
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
        }
    }
}

impl TryFrom<u8> for KeyRefreshPhase {
    type Error = ManagerError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Self::from_byte(byte).ok_or(ManagerError::InvalidArguments("bad phase"))
    }
}

/// A stored network (subnet) key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetKeyRecord {
    /// Subnet index.
    pub index: NetKeyIndex,
    /// Key in use by the network.
    pub old_key: KeyMaterial,
    /// Key being distributed during a refresh; equals `old_key` otherwise.
    pub new_key: KeyMaterial,
    /// Current refresh phase.
    pub phase: KeyRefreshPhase,
}

impl NetKeyRecord {
    /// A fresh record outside any refresh: both slots hold `key`.
    #[must_use]
    pub fn fresh(index: NetKeyIndex, key: KeyMaterial) -> Self {
        Self {
            index,
            old_key: key.clone(),
            new_key: key,
            phase: KeyRefreshPhase::None,
        }
    }
}

/// A stored application key, bound to one subnet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppKeyRecord {
    /// Application key index.
    pub index: AppKeyIndex,
    /// Index of the bound subnet key.
    pub net_index: NetKeyIndex,
    /// Key in use.
    pub old_key: KeyMaterial,
    /// Key being distributed during the bound subnet's refresh.
    pub new_key: KeyMaterial,
}

impl AppKeyRecord {
    /// A fresh record with both slots holding `key`.
    #[must_use]
    pub fn fresh(index: AppKeyIndex, net_index: NetKeyIndex, key: KeyMaterial) -> Self {
        Self {
            index,
            net_index,
            old_key: key.clone(),
            new_key: key,
        }
    }
}

/// A remote device key committed at the end of provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceKeyRecord {
    /// Primary unicast address of the device.
    pub unicast: UnicastAddress,
    /// Number of addressable elements.
    pub element_count: u8,
    /// The per-device secret.
    pub key: KeyMaterial,
}

/// Everything `ExportKeys` returns: the node's network and device keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyExport {
    /// All stored network keys, refresh state included.
    pub net_keys: Vec<NetKeyRecord>,
    /// All stored remote device keys.
    pub device_keys: Vec<DeviceKeyRecord>,
}
