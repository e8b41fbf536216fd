//! The client-facing side of the managers: deferred replies, one-way
//! signals, the nested provisioning-data request, and disconnect watches.
//!
//! The RPC transport and marshalling live outside the core; this trait is
//! the whole surface the managers see of them.

use weft_core::{ClientId, DeviceUuid, ManagerError, NetKeyIndex, NppiMode, UnicastAddress};
use weft_keys::KeyExport;

use crate::engine::SessionId;
use crate::scan::ScanServer;

/// Payload of a successful method reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyBody {
    /// Empty reply.
    Empty,
    /// `ExportKeys` reply.
    Keys(KeyExport),
}

/// A held client request that must be resolved with exactly one reply.
///
/// Dropping an unresolved handle abandons the request without a reply; the
/// managers only do that when the owning client has already disconnected.
pub trait ReplyHandle {
    /// Consume the handle, sending the reply or error to the client.
    fn resolve(self: Box<Self>, result: Result<ReplyBody, ManagerError>);
}

/// Handle of an installed client-disconnect watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

/// One-way notifications to the originating client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// The provisioning session ended without admitting the device.
    AddNodeFailed {
        /// UUID the session targeted (all-zero for re-provisioning).
        uuid: DeviceUuid,
        /// Human-readable status.
        reason: &'static str,
    },
    /// A new device joined the network.
    AddNodeComplete {
        /// UUID of the admitted device.
        uuid: DeviceUuid,
        /// Assigned primary unicast address.
        unicast: UnicastAddress,
        /// Element count the device reported.
        element_count: u8,
    },
    /// A re-provision of an existing device completed.
    ReprovComplete {
        /// The device's unicast address before re-provisioning.
        original: UnicastAddress,
        /// Sub-mode that was applied.
        nppi: NppiMode,
        /// The device's (possibly new) primary unicast address.
        unicast: UnicastAddress,
        /// Element count the device reported.
        element_count: u8,
    },
    /// An unprovisioned device was discovered.
    ScanResult {
        /// Where the report came from.
        server: ScanServer,
        /// Strongest signal seen for this device so far.
        rssi: i16,
        /// Device UUID from the beacon.
        uuid: DeviceUuid,
        /// Trailing OOB data from the beacon, possibly empty.
        oob: Vec<u8>,
    },
}

/// What the manager asks the client for once the element count is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvDataKind {
    /// A new device with `element_count` elements needs a subnet and an
    /// address assignment.
    NewDevice {
        /// Elements to allocate for.
        element_count: u8,
    },
    /// An address-change re-provision needs the replacement address.
    AddressChange {
        /// Address the device currently holds.
        original: UnicastAddress,
        /// Elements to allocate for.
        element_count: u8,
    },
}

/// The client's answer to a [`ProvDataKind`] request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvData {
    /// Assignment for a new device.
    NewDevice {
        /// Subnet the device joins.
        net_index: NetKeyIndex,
        /// Primary unicast address to assign.
        unicast: UnicastAddress,
    },
    /// Replacement address for an address-change re-provision; the subnet
    /// is carried over from the session.
    AddressChange {
        /// New primary unicast address.
        unicast: UnicastAddress,
    },
}

/// Client transport as the managers see it.
pub trait ClientGateway {
    /// Emit a one-way signal to `client`.
    fn send_signal(&self, client: &ClientId, signal: Signal);

    /// Ask `client` for provisioning data; the answer comes back through
    /// the provisioning manager's `provision_data` entry point carrying
    /// `session`.
    fn request_prov_data(&self, client: &ClientId, session: SessionId, request: ProvDataKind);

    /// Watch `client` for disconnection; the event arrives at the
    /// provisioning manager's `client_disconnected` entry point.
    fn watch_disconnect(&self, client: &ClientId) -> WatchId;

    /// Remove a disconnect watch. Removing an already-fired watch is a
    /// no-op.
    fn unwatch_disconnect(&self, watch: WatchId);
}
