//! The over-the-air provisioning engine, as the session manager drives it.
//!
//! The engine performs the cryptographic handshake and reports back through
//! the manager's callback entry points, carrying the [`SessionId`] it was
//! started with. A stale id (the session was superseded or torn down in the
//! meantime) makes the callback a no-op, signalled to the engine as
//! [`EngineAck::Rejected`].

use std::fmt;

use thiserror::Error;

use weft_core::{DeviceUuid, KeyMaterial, NetKeyIndex, NodeId, TransportMode, UnicastAddress};

/// Identity of one provisioning attempt, unique for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prov-{}", self.0)
    }
}

/// Everything the engine needs to start a handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiatorParams {
    /// Session the callbacks will refer to.
    pub session: SessionId,
    /// Node the handshake runs on behalf of.
    pub node: NodeId,
    /// New-device provisioning or an NPPI re-provision sub-mode.
    pub transport: TransportMode,
    /// Handshake target: the re-provision target, the remote provisioning
    /// server, or the node's own primary for a local new-device session.
    pub target: UnicastAddress,
    /// Subnet the handshake (and any remote server traffic) uses.
    pub net_index: NetKeyIndex,
    /// Device UUID to provision; `None` re-keys an already-known target.
    pub uuid: Option<DeviceUuid>,
    /// Attention-timer value for the provisioning invite.
    pub attention: u8,
    /// Seconds before the engine abandons the handshake.
    pub timeout_secs: u16,
}

/// What the engine hands over when a handshake completes successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedDevice {
    /// The freshly established per-device secret.
    pub device_key: KeyMaterial,
    /// Primary unicast address assigned to the device.
    pub unicast: UnicastAddress,
    /// Number of addressable elements the device reported.
    pub element_count: u8,
}

/// The engine could not bring the initiator up.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("failed to start provisioning initiator")]
pub struct StartError;

/// Typed acknowledgement the manager returns to an engine callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum EngineAck {
    /// The callback matched the live session and was processed.
    Accepted,
    /// The session is gone or the callback does not apply; the engine
    /// should abandon the exchange.
    Rejected,
}

/// External provisioning handshake engine.
pub trait ProvisionInitiator {
    /// Begin a handshake. The outcome arrives through the manager's
    /// `engine_started` / `engine_element_count` / `engine_complete`
    /// entry points.
    fn start(&self, params: InitiatorParams);

    /// Abort an in-flight handshake; no further callbacks follow.
    fn cancel(&self, session: SessionId);

    /// Hand the client-supplied provisioning data (subnet and primary
    /// address) back into a handshake that asked for it.
    fn deliver_prov_data(&self, session: SessionId, net_index: NetKeyIndex, primary: UnicastAddress);

    /// Attach the node to the engine's unprovisioned-device discovery
    /// machinery.
    fn scan_register(&self, node: NodeId);

    /// Detach the node from discovery.
    fn scan_unregister(&self, node: NodeId);
}
