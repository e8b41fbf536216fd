//! The provisioning session manager.
//!
//! At most one provisioning session exists per node; a second start while
//! one is pending fails `InProgress` instead of displacing it. The session
//! advances through the engine's three callbacks and is destroyed on every
//! terminal path: success, failure, or the owning client disconnecting.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use weft_core::{
    ClientId, DeviceUuid, ManagerError, NetKeyIndex, NodeContext, NodeId, NppiMode, ProvStatus,
    TransportMode, UnicastAddress,
};
use weft_keys::{DeviceKeyRecord, KeyStore};

use crate::engine::{
    EngineAck, InitiatorParams, ProvisionInitiator, ProvisionedDevice, SessionId, StartError,
};
use crate::gateway::{ClientGateway, ProvData, ProvDataKind, ReplyBody, ReplyHandle, Signal, WatchId};
use crate::scan::ScanManager;

/// Attention-timer value placed in the provisioning invite.
const ATTENTION_TIMER: u8 = 99;

/// Engine timeout for re-provisioning handshakes.
const REPROVISION_TIMEOUT_SECS: u16 = 60;

/// Validated parameters of an `AddNode` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddNodeParams {
    /// Device to provision; `None` re-keys via a remote server.
    pub uuid: Option<DeviceUuid>,
    /// Engine timeout in seconds.
    pub seconds: u16,
    /// Remote provisioning server; `None` provisions over the local radio.
    pub server: Option<UnicastAddress>,
    /// Subnet for the handshake; `None` means the node's primary.
    pub net_index: Option<NetKeyIndex>,
}

/// Validated parameters of a `Reprovision` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReprovisionParams {
    /// The device to re-provision.
    pub target: UnicastAddress,
    /// Which NPPI sub-mode to apply.
    pub mode: NppiMode,
    /// Subnet for the handshake; `None` means the node's primary.
    pub net_index: Option<NetKeyIndex>,
}

/// Live states of a session; terminal outcomes destroy it instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    /// Engine invoked, start acknowledgement outstanding.
    Pending,
    /// Started; waiting for the device's element count.
    AwaitingElementCount,
    /// Provisioning data delivered; waiting for the terminal callback.
    AwaitingCommit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionTarget {
    NewDevice { uuid: DeviceUuid },
    Reprovision { original: UnicastAddress, mode: NppiMode },
}

impl SessionTarget {
    const fn transport(&self) -> TransportMode {
        match self {
            Self::NewDevice { .. } => TransportMode::NewDevice,
            Self::Reprovision { mode, .. } => TransportMode::Nppi(*mode),
        }
    }

    /// UUID carried in failure signals; all-zero for re-provisioning.
    const fn uuid(&self) -> DeviceUuid {
        match self {
            Self::NewDevice { uuid } => *uuid,
            Self::Reprovision { .. } => DeviceUuid::ZERO,
        }
    }
}

struct ProvisioningSession {
    id: SessionId,
    node: NodeId,
    client: ClientId,
    state: SessionState,
    target: SessionTarget,
    net_index: NetKeyIndex,
    reply: Option<Box<dyn ReplyHandle>>,
    watch: WatchId,
}

/// Sequences client-initiated device addition and re-provisioning through
/// the external engine.
pub struct ProvisioningManager {
    engine: Arc<dyn ProvisionInitiator>,
    gateway: Arc<dyn ClientGateway>,
    sessions: HashMap<NodeId, ProvisioningSession>,
    next_session: u64,
}

impl ProvisioningManager {
    /// Create a manager over the engine and client gateway.
    pub fn new(engine: Arc<dyn ProvisionInitiator>, gateway: Arc<dyn ClientGateway>) -> Self {
        Self {
            engine,
            gateway,
            sessions: HashMap::new(),
            next_session: 0,
        }
    }

    /// Begin provisioning a new device.
    ///
    /// Requires the provisioner role and an attached authentication agent.
    /// Without a device UUID the request must name a remote server (a bare
    /// re-key of the local device has no target). Discovery is mutually
    /// exclusive with provisioning, so every scan session of the node is
    /// cancelled first. The reply is deferred until the engine's start
    /// acknowledgement.
    pub fn start_add_node(
        &mut self,
        scans: &mut ScanManager,
        node: &dyn NodeContext,
        params: AddNodeParams,
        reply: Box<dyn ReplyHandle>,
    ) {
        debug!(node = %node.id(), "add node request");

        if params.uuid.is_none() && params.server.is_none() {
            reply.resolve(Err(ManagerError::InvalidArguments("no provisioning target")));
            return;
        }

        let uuid = params.uuid;
        let target = SessionTarget::NewDevice {
            uuid: uuid.unwrap_or(DeviceUuid::ZERO),
        };
        self.start_session(
            scans,
            node,
            target,
            params.server,
            uuid,
            params.net_index,
            params.seconds,
            reply,
        );
    }

    /// Begin re-provisioning an existing device.
    pub fn start_reprovision(
        &mut self,
        scans: &mut ScanManager,
        node: &dyn NodeContext,
        params: ReprovisionParams,
        reply: Box<dyn ReplyHandle>,
    ) {
        debug!(node = %node.id(), target = %params.target, "reprovision request");

        let target = SessionTarget::Reprovision {
            original: params.target,
            mode: params.mode,
        };
        self.start_session(
            scans,
            node,
            target,
            Some(params.target),
            None,
            params.net_index,
            REPROVISION_TIMEOUT_SECS,
            reply,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn start_session(
        &mut self,
        scans: &mut ScanManager,
        node: &dyn NodeContext,
        target: SessionTarget,
        engine_target: Option<UnicastAddress>,
        uuid: Option<DeviceUuid>,
        net_index: Option<NetKeyIndex>,
        timeout_secs: u16,
        reply: Box<dyn ReplyHandle>,
    ) {
        if !node.is_provisioner() || !node.has_agent() {
            reply.resolve(Err(ManagerError::NotAuthorized("missing interfaces")));
            return;
        }

        if self.sessions.contains_key(&node.id()) {
            reply.resolve(Err(ManagerError::InProgress("provisioning in progress")));
            return;
        }

        // Engine target falls back to the node's own primary for a local
        // new-device handshake.
        let engine_target = match engine_target.or_else(|| node.primary_address()) {
            Some(addr) => addr,
            None => {
                reply.resolve(Err(ManagerError::Failed("node has no primary address")));
                return;
            }
        };
        let net_index = net_index.unwrap_or_else(|| node.primary_net_index());

        // Discovery and provisioning are mutually exclusive on a node.
        scans.cancel_node_scans(node.id());

        self.next_session += 1;
        let id = SessionId(self.next_session);
        let watch = self.gateway.watch_disconnect(node.owner());

        self.engine.start(InitiatorParams {
            session: id,
            node: node.id(),
            transport: target.transport(),
            target: engine_target,
            net_index,
            uuid,
            attention: ATTENTION_TIMER,
            timeout_secs,
        });

        self.sessions.insert(node.id(), ProvisioningSession {
            id,
            node: node.id(),
            client: node.owner().clone(),
            state: SessionState::Pending,
            target,
            net_index,
            reply: Some(reply),
            watch,
        });
        debug!(session = %id, node = %node.id(), "provisioning session created");
    }

    /// Engine start acknowledgement: resolves the deferred reply.
    ///
    /// A failed start also destroys the session; the engine produces no
    /// further callbacks for it.
    pub fn engine_started(&mut self, session: SessionId, result: Result<(), StartError>) {
        let Some(live) = self.sessions.values_mut().find(|s| s.id == session) else {
            warn!(%session, "start acknowledgement for unknown session");
            return;
        };
        if live.state != SessionState::Pending {
            warn!(%session, state = ?live.state, "unexpected start acknowledgement");
            return;
        }

        let reply = live.reply.take();
        match result {
            Ok(()) => {
                if let Some(reply) = reply {
                    reply.resolve(Ok(ReplyBody::Empty));
                }
                live.state = SessionState::AwaitingElementCount;
            }
            Err(StartError) => {
                if let Some(reply) = reply {
                    reply.resolve(Err(ManagerError::Failed(
                        "failed to start provisioning initiator",
                    )));
                }
                let node = live.node;
                if let Some(dead) = self.sessions.remove(&node) {
                    self.gateway.unwatch_disconnect(dead.watch);
                }
                debug!(%session, "session torn down after failed engine start");
            }
        }
    }

    /// Engine reports the device's element count.
    ///
    /// New-device and address-change sessions ask the owning client for the
    /// address assignment; the other NPPI modes need no data and the
    /// callback is rejected, as it is for a stale session.
    pub fn engine_element_count(&mut self, session: SessionId, element_count: u8) -> EngineAck {
        let Some(live) = self.sessions.values_mut().find(|s| s.id == session) else {
            warn!(%session, "element count for unknown session");
            return EngineAck::Rejected;
        };
        if live.state != SessionState::AwaitingElementCount {
            warn!(%session, state = ?live.state, "element count out of sequence");
            return EngineAck::Rejected;
        }

        let kind = match live.target {
            SessionTarget::NewDevice { .. } => ProvDataKind::NewDevice { element_count },
            SessionTarget::Reprovision {
                original,
                mode: NppiMode::AddressChange,
            } => ProvDataKind::AddressChange {
                original,
                element_count,
            },
            SessionTarget::Reprovision { .. } => return EngineAck::Rejected,
        };

        self.gateway.request_prov_data(&live.client, session, kind);
        EngineAck::Accepted
    }

    /// The client answered (or failed) the nested provisioning-data
    /// request; a successful answer is forwarded into the engine.
    pub fn provision_data(&mut self, session: SessionId, data: Result<ProvData, ManagerError>) {
        let Some(live) = self.sessions.values_mut().find(|s| s.id == session) else {
            warn!(%session, "provisioning data for unknown session");
            return;
        };
        if live.state != SessionState::AwaitingElementCount {
            warn!(%session, state = ?live.state, "provisioning data out of sequence");
            return;
        }

        let data = match data {
            Ok(data) => data,
            Err(err) => {
                // The engine's own timeout will end the session.
                debug!(%session, %err, "provisioning data request failed");
                return;
            }
        };

        let unicast = match (&live.target, data) {
            (SessionTarget::NewDevice { .. }, ProvData::NewDevice { net_index, unicast }) => {
                live.net_index = net_index;
                unicast
            }
            (
                SessionTarget::Reprovision {
                    mode: NppiMode::AddressChange,
                    ..
                },
                ProvData::AddressChange { unicast },
            ) => unicast,
            (_, data) => {
                warn!(%session, ?data, "provisioning data does not match session mode");
                return;
            }
        };

        live.state = SessionState::AwaitingCommit;
        self.engine.deliver_prov_data(session, live.net_index, unicast);
    }

    /// Terminal engine callback: commit the device key and signal the
    /// outcome. The session is destroyed on every path.
    pub fn engine_complete<K: KeyStore>(
        &mut self,
        store: &mut K,
        session: SessionId,
        status: ProvStatus,
        device: Option<ProvisionedDevice>,
    ) -> EngineAck {
        let Some(node) = self
            .sessions
            .values()
            .find(|s| s.id == session)
            .map(|s| s.node)
        else {
            warn!(%session, "completion for unknown session");
            return EngineAck::Rejected;
        };
        let Some(live) = self.sessions.remove(&node) else {
            return EngineAck::Rejected;
        };

        if !status.is_success() {
            debug!(%session, %status, "provisioning failed");
            self.fail(&live, status.reason());
            return EngineAck::Rejected;
        }

        let Some(device) = device else {
            warn!(%session, "success completion without device info");
            self.fail(&live, ProvStatus::UnexpectedError.reason());
            return EngineAck::Rejected;
        };

        // An address change obsoletes every key stored for the old address.
        if let SessionTarget::Reprovision {
            original,
            mode: NppiMode::AddressChange,
        } = live.target
        {
            if let Err(err) = store.delete_device_key_all(original) {
                warn!(%session, %original, %err, "stale device key purge failed");
            }
        }

        if store
            .put_device_key(DeviceKeyRecord {
                unicast: device.unicast,
                element_count: device.element_count,
                key: device.device_key,
            })
            .is_err()
        {
            self.fail(&live, ProvStatus::CannotAssignAddresses.reason());
            return EngineAck::Rejected;
        }

        let signal = match live.target {
            SessionTarget::NewDevice { uuid } => Signal::AddNodeComplete {
                uuid,
                unicast: device.unicast,
                element_count: device.element_count,
            },
            SessionTarget::Reprovision { original, mode } => Signal::ReprovComplete {
                original,
                nppi: mode,
                unicast: device.unicast,
                element_count: device.element_count,
            },
        };
        self.gateway.send_signal(&live.client, signal);
        self.finish(live);
        EngineAck::Accepted
    }

    /// The owning client disconnected: abort the engine, destroy the
    /// session, emit nothing into the dead transport.
    pub fn client_disconnected(&mut self, client: &ClientId) {
        let nodes: Vec<_> = self
            .sessions
            .values()
            .filter(|s| &s.client == client)
            .map(|s| s.node)
            .collect();

        for node in nodes {
            if let Some(session) = self.sessions.remove(&node) {
                debug!(session = %session.id, %node, "client disconnected, aborting session");
                self.engine.cancel(session.id);
                self.finish(session);
            }
        }
    }

    /// Whether a session is live for `node`.
    #[must_use]
    pub fn has_session(&self, node: NodeId) -> bool {
        self.sessions.contains_key(&node)
    }

    fn fail(&self, session: &ProvisioningSession, reason: &'static str) {
        self.gateway.send_signal(&session.client, Signal::AddNodeFailed {
            uuid: session.target.uuid(),
            reason,
        });
        self.gateway.unwatch_disconnect(session.watch);
    }

    fn finish(&self, session: ProvisioningSession) {
        self.gateway.unwatch_disconnect(session.watch);
        if session.reply.is_some() {
            debug!(session = %session.id, "dropping unresolved reply");
        }
    }
}
