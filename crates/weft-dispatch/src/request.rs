//! The decoded management requests, one variant per RPC method.

use crate::options::OptionValue;

/// String-keyed option pairs as the transport decodes them.
pub type OptionPairs = Vec<(String, OptionValue)>;

/// One decoded management call.
///
/// Fields are wire-shaped (raw addresses, raw byte arrays); the dispatcher
/// validates and types them before any manager runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagementRequest {
    /// Provision a new device, or re-key via a remote server.
    AddNode {
        /// 16-byte device UUID; empty means no target device.
        uuid: Vec<u8>,
        /// `Seconds` / `Server` / `Subnet`.
        options: OptionPairs,
    },
    /// Re-provision an existing device.
    Reprovision {
        /// Unicast address of the target device.
        unicast: u16,
        /// `NPPI` / `Subnet`.
        options: OptionPairs,
    },
    /// Record a device key established out-of-band.
    ImportRemoteNode {
        /// Primary unicast address of the device.
        primary: u16,
        /// Element count.
        count: u8,
        /// 16-byte device key.
        device_key: Vec<u8>,
    },
    /// Forget a remote device's key.
    DeleteRemoteNode {
        /// Primary unicast address of the device.
        primary: u16,
        /// Element count.
        count: u8,
    },
    /// Start unprovisioned-device discovery.
    UnprovisionedScan {
        /// `Seconds` / `Subnet` / `Server` / `Filter` / `Extended`.
        options: OptionPairs,
    },
    /// Stop all discovery for the node.
    UnprovisionedScanCancel,
    /// Create a subnet with generated key material.
    CreateSubnet {
        /// Subnet index.
        net_index: u16,
    },
    /// Begin a key refresh on a subnet.
    UpdateSubnet {
        /// Subnet index.
        net_index: u16,
    },
    /// Delete a subnet.
    DeleteSubnet {
        /// Subnet index.
        net_index: u16,
    },
    /// Create a subnet with supplied key material.
    ImportSubnet {
        /// Subnet index.
        net_index: u16,
        /// 16-byte network key.
        net_key: Vec<u8>,
    },
    /// Create an app key with generated material.
    CreateAppKey {
        /// Bound subnet index.
        net_index: u16,
        /// App key index.
        app_index: u16,
    },
    /// Refresh an app key inside its subnet's refresh window.
    UpdateAppKey {
        /// App key index.
        app_index: u16,
    },
    /// Delete an app key.
    DeleteAppKey {
        /// App key index.
        app_index: u16,
    },
    /// Create an app key with supplied material.
    ImportAppKey {
        /// Bound subnet index.
        net_index: u16,
        /// App key index.
        app_index: u16,
        /// 16-byte application key.
        app_key: Vec<u8>,
    },
    /// Advance or cancel a subnet's key-refresh phase.
    SetKeyPhase {
        /// Subnet index.
        net_index: u16,
        /// Target phase byte.
        phase: u8,
    },
    /// Snapshot all network and device keys.
    ExportKeys,
}

impl ManagementRequest {
    /// Wire method name, for logging. Deliberately not the request itself:
    /// several variants carry key material.
    #[must_use]
    pub const fn method_name(&self) -> &'static str {
        match self {
            Self::AddNode { .. } => "AddNode",
            Self::Reprovision { .. } => "Reprovision",
            Self::ImportRemoteNode { .. } => "ImportRemoteNode",
            Self::DeleteRemoteNode { .. } => "DeleteRemoteNode",
            Self::UnprovisionedScan { .. } => "UnprovisionedScan",
            Self::UnprovisionedScanCancel => "UnprovisionedScanCancel",
            Self::CreateSubnet { .. } => "CreateSubnet",
            Self::UpdateSubnet { .. } => "UpdateSubnet",
            Self::DeleteSubnet { .. } => "DeleteSubnet",
            Self::ImportSubnet { .. } => "ImportSubnet",
            Self::CreateAppKey { .. } => "CreateAppKey",
            Self::UpdateAppKey { .. } => "UpdateAppKey",
            Self::DeleteAppKey { .. } => "DeleteAppKey",
            Self::ImportAppKey { .. } => "ImportAppKey",
            Self::SetKeyPhase { .. } => "SetKeyPhase",
            Self::ExportKeys => "ExportKeys",
        }
    }
}
