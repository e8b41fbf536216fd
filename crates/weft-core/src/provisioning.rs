//! Provisioning transport modes and result codes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Re-provisioning sub-mode applied to an already-provisioned device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NppiMode {
    /// Refresh the device key, keeping address and composition.
    DeviceKeyRefresh,
    /// Move the device to a new unicast address; the old device key is
    /// purged once the new one is committed.
    AddressChange,
    /// Refresh the device composition in place.
    CompositionRefresh,
}

impl NppiMode {
    /// Parse the wire mode byte (`0..=2`).
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::DeviceKeyRefresh),
            1 => Some(Self::AddressChange),
            2 => Some(Self::CompositionRefresh),
            _ => None,
        }
    }

    /// Wire mode byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::DeviceKeyRefresh => 0,
            Self::AddressChange => 1,
            Self::CompositionRefresh => 2,
        }
    }
}

/// How a provisioning session reaches its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportMode {
    /// Full provisioning of a brand-new device.
    NewDevice,
    /// Re-provisioning of an existing device in one of the NPPI sub-modes.
    Nppi(NppiMode),
}

impl TransportMode {
    /// Whether this session re-provisions an existing device.
    #[must_use]
    pub const fn is_reprovision(self) -> bool {
        matches!(self, Self::Nppi(_))
    }
}

/// Outcome code of a provisioning handshake.
///
/// Mirrors the provisioning-protocol error space plus the engine's local
/// timeout. `reason` strings are what the `AddNodeFailed` signal carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProvStatus {
    Success,
    InvalidPdu,
    InvalidFormat,
    UnexpectedPdu,
    ConfirmationFailed,
    OutOfResources,
    DecryptionFailed,
    UnexpectedError,
    CannotAssignAddresses,
    Timeout,
    Unknown(u8),
}

impl ProvStatus {
    /// Decode a wire status byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => Self::Success,
            0x01 => Self::InvalidPdu,
            0x02 => Self::InvalidFormat,
            0x03 => Self::UnexpectedPdu,
            0x04 => Self::ConfirmationFailed,
            0x05 => Self::OutOfResources,
            0x06 => Self::DecryptionFailed,
            0x07 => Self::UnexpectedError,
            0x08 => Self::CannotAssignAddresses,
            0x09 => Self::Timeout,
            other => Self::Unknown(other),
        }
    }

    /// Whether the handshake completed successfully.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Human-readable status string for client-facing signals.
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::InvalidPdu => "invalid-pdu",
            Self::InvalidFormat => "invalid-format",
            Self::UnexpectedPdu => "unexpected-pdu",
            Self::ConfirmationFailed => "confirmation-failed",
            Self::OutOfResources => "out-of-resources",
            Self::DecryptionFailed => "decryption-failed",
            Self::UnexpectedError => "unexpected-error",
            Self::CannotAssignAddresses => "cannot-assign-addresses",
            Self::Timeout => "timeout",
            Self::Unknown(_) => "unknown-error",
        }
    }
}

impl fmt::Display for ProvStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}
