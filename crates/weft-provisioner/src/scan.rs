//! Unprovisioned-device discovery sessions.
//!
//! One session may exist per (node, server) pair: either the node's own
//! radio listens for unprovisioned beacons, or a remote device already in
//! the mesh scans on the node's behalf via the Remote Provisioning model.
//! Sessions deduplicate repeated reports by UUID, track the strongest
//! signal, and tear themselves down on timeout.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use weft_core::{ClientId, DeviceUuid, ManagerError, NetKeyIndex, NodeContext, NodeId, UnicastAddress};

use crate::engine::ProvisionInitiator;
use crate::gateway::{ClientGateway, Signal};
use crate::io::{BeaconIo, ModelSender, ScanTimerKey, TimerHandle, Timers};

/// Remote Provisioning model opcodes the scan manager composes.
const OP_SCAN_START: u16 = 0x8052;
const OP_SCAN_STOP: u16 = 0x8053;

/// ScannedItemsLimit carried in the scan-start command.
const SCANNED_ITEMS_LIMIT: u8 = 5;

/// Default and maximum scan duration.
const DEFAULT_SCAN_SECONDS: u16 = 60;
const MAX_SCAN_SECONDS: u16 = 60;

/// Where a discovery session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanServer {
    /// The node's own radio.
    Local,
    /// A device already in the mesh acting as a scan proxy.
    Remote(UnicastAddress),
}

/// Validated options of an `UnprovisionedScan` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanParams {
    /// Scan duration; absent means the 60-second default.
    pub seconds: Option<u16>,
    /// Subnet used to reach a remote server; absent means the node's
    /// primary subnet.
    pub net_index: Option<NetKeyIndex>,
    /// Remote scan server; absent means the local radio.
    pub server: Option<UnicastAddress>,
    /// UUID filter forwarded to a remote server.
    pub filter: Option<DeviceUuid>,
    /// Opaque extended-scan data.
    pub extended: Option<Vec<u8>>,
}

/// One discovery report, local beacon or remote scan-report alike.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// Received signal strength.
    pub rssi: i8,
    /// Device UUID from the beacon.
    pub uuid: DeviceUuid,
    /// Trailing OOB data, possibly empty.
    pub oob: Vec<u8>,
    /// Whether this is an extended-scan report (its RSSI does not feed the
    /// best-signal tracking).
    pub extended: bool,
}

struct ScanSession {
    node: NodeId,
    client: ClientId,
    server: ScanServer,
    net_index: NetKeyIndex,
    /// UUID filter; doubles as the last UUID seen, for dedup.
    uuid: DeviceUuid,
    best_rssi: i8,
    #[allow(dead_code)]
    extended: Option<Vec<u8>>,
    timer: TimerHandle,
}

/// Tracks every outstanding discovery session and routes reports.
pub struct ScanManager {
    engine: Arc<dyn ProvisionInitiator>,
    sender: Arc<dyn ModelSender>,
    beacon: Arc<dyn BeaconIo>,
    timers: Arc<dyn Timers>,
    gateway: Arc<dyn ClientGateway>,
    sessions: HashMap<(NodeId, ScanServer), ScanSession>,
}

impl ScanManager {
    /// Create a manager over the discovery collaborators.
    pub fn new(
        engine: Arc<dyn ProvisionInitiator>,
        sender: Arc<dyn ModelSender>,
        beacon: Arc<dyn BeaconIo>,
        timers: Arc<dyn Timers>,
        gateway: Arc<dyn ClientGateway>,
    ) -> Self {
        Self {
            engine,
            sender,
            beacon,
            timers,
            gateway,
            sessions: HashMap::new(),
        }
    }

    /// Start (or restart) discovery for a node.
    ///
    /// A session already armed for the same (node, server) pair is replaced:
    /// its timer is cancelled and the new parameters take over. Remote
    /// sessions require a duration within `1..=60` seconds; local sessions
    /// fall back to 60 for absent or out-of-range values.
    pub fn start_scan(
        &mut self,
        node: &dyn NodeContext,
        requester: &ClientId,
        params: ScanParams,
    ) -> Result<(), ManagerError> {
        if node.owner() != requester {
            return Err(ManagerError::NotAuthorized("sender is not the node owner"));
        }
        if !node.is_provisioner() {
            return Err(ManagerError::NotAuthorized("node is not a provisioner"));
        }

        let requested = params.seconds.unwrap_or(DEFAULT_SCAN_SECONDS);
        let (server, seconds) = match params.server {
            Some(addr) => {
                if requested == 0 || requested > MAX_SCAN_SECONDS {
                    return Err(ManagerError::InvalidArguments("bad scan duration"));
                }
                (ScanServer::Remote(addr), requested)
            }
            None => {
                let seconds = if requested == 0 || requested > MAX_SCAN_SECONDS {
                    DEFAULT_SCAN_SECONDS
                } else {
                    requested
                };
                (ScanServer::Local, seconds)
            }
        };

        let net_index = params.net_index.unwrap_or_else(|| node.primary_net_index());
        let key = (node.id(), server);

        if let Some(previous) = self.sessions.remove(&key) {
            debug!(node = %node.id(), ?server, "restarting scan session");
            self.timers.cancel(previous.timer);
        }

        let timer = self.timers.arm(seconds, ScanTimerKey {
            node: node.id(),
            server,
        });

        match server {
            ScanServer::Remote(addr) => {
                self.sender.send_dev_command(
                    node.id(),
                    addr,
                    net_index,
                    scan_start_payload(seconds, params.filter.as_ref()),
                );
            }
            ScanServer::Local => self.beacon.register_beacon(node.id()),
        }
        self.engine.scan_register(node.id());

        self.sessions.insert(key, ScanSession {
            node: node.id(),
            client: node.owner().clone(),
            server,
            net_index,
            uuid: params.filter.unwrap_or(DeviceUuid::ZERO),
            best_rssi: i8::MIN,
            extended: params.extended,
            timer,
        });

        debug!(node = %node.id(), ?server, seconds, "scan session armed");
        Ok(())
    }

    /// Route a discovery report into its session.
    ///
    /// A repeat of the last-seen UUID is dropped unless it is an extended
    /// report or strictly stronger than the best signal so far; only
    /// non-extended reports feed the best-signal tracking.
    pub fn handle_report(&mut self, node: NodeId, server: ScanServer, report: &ScanReport) {
        let Some(session) = self.sessions.get_mut(&(node, server)) else {
            debug!(%node, ?server, "report without a scan session");
            return;
        };

        if report.uuid == session.uuid && !report.extended && report.rssi <= session.best_rssi {
            debug!(%node, uuid = %report.uuid, "duplicate report dropped");
            return;
        }

        if !report.extended && report.rssi > session.best_rssi {
            session.best_rssi = report.rssi;
        }
        session.uuid = report.uuid;

        self.gateway.send_signal(&session.client, Signal::ScanResult {
            server,
            rssi: i16::from(session.best_rssi),
            uuid: report.uuid,
            oob: report.oob.clone(),
        });
    }

    /// Client-requested cancellation of every session the node owns.
    pub fn cancel(
        &mut self,
        node: &dyn NodeContext,
        requester: &ClientId,
    ) -> Result<(), ManagerError> {
        if node.owner() != requester || !node.is_provisioner() {
            return Err(ManagerError::NotAuthorized("sender is not the node owner"));
        }
        self.cancel_node_scans(node.id());
        Ok(())
    }

    /// Tear down every session belonging to `node`.
    ///
    /// Also invoked by the provisioning manager: discovery and provisioning
    /// never run concurrently on one node.
    pub fn cancel_node_scans(&mut self, node: NodeId) {
        let keys: Vec<_> = self
            .sessions
            .keys()
            .filter(|(owner, _)| *owner == node)
            .copied()
            .collect();

        for key in keys {
            if let Some(session) = self.sessions.remove(&key) {
                self.timers.cancel(session.timer);
                self.teardown(&session);
            }
        }
    }

    /// Timer expiry for one session; same teardown as an explicit cancel.
    pub fn handle_timeout(&mut self, key: ScanTimerKey) {
        if let Some(session) = self.sessions.remove(&(key.node, key.server)) {
            debug!(node = %key.node, server = ?key.server, "scan session timed out");
            self.teardown(&session);
        }
    }

    /// Whether a session is armed for the pair.
    #[must_use]
    pub fn is_active(&self, node: NodeId, server: ScanServer) -> bool {
        self.sessions.contains_key(&(node, server))
    }

    /// Number of armed sessions across all nodes.
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    fn teardown(&self, session: &ScanSession) {
        match session.server {
            ScanServer::Remote(addr) => {
                self.sender
                    .send_dev_command(session.node, addr, session.net_index, scan_stop_payload());
            }
            ScanServer::Local => self.beacon.deregister_beacon(session.node),
        }
        self.engine.scan_unregister(session.node);
    }
}

fn opcode_bytes(opcode: u16) -> [u8; 2] {
    opcode.to_be_bytes()
}

fn scan_start_payload(seconds: u16, filter: Option<&DeviceUuid>) -> Vec<u8> {
    let opcode = opcode_bytes(OP_SCAN_START);
    let mut payload = vec![opcode[0], opcode[1], SCANNED_ITEMS_LIMIT, seconds as u8];
    if let Some(uuid) = filter {
        payload.extend_from_slice(uuid.as_bytes());
    }
    payload
}

fn scan_stop_payload() -> Vec<u8> {
    opcode_bytes(OP_SCAN_STOP).to_vec()
}
