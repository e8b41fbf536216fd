//! Routes validated requests onto the three managers.

use std::sync::Arc;

use tracing::debug;

use weft_core::{
    ClientId, DeviceUuid, KeyMaterial, ManagerError, NetKeyIndex, NodeContext, NodeId, ProvStatus,
    UnicastAddress,
};
use weft_keys::{KeyManager, KeyRefreshPhase, KeyStore};
use weft_provisioner::{
    AddNodeParams, BeaconIo, ClientGateway, EngineAck, ModelSender, ProvData, ProvisionInitiator,
    ProvisionedDevice, ProvisioningManager, ReplyBody, ReplyHandle, ReprovisionParams, ScanManager,
    ScanParams, ScanReport, ScanServer, ScanTimerKey, SessionId, StartError, Timers,
};

use crate::options::{AddNodeOptions, ReprovisionOptions, ScanOptions};
use crate::request::ManagementRequest;

/// Default engine timeout for `AddNode` when no `Seconds` option is given.
const DEFAULT_ADD_TIMEOUT_SECS: u16 = 60;

/// The management interface: decodes nothing, marshals nothing — takes
/// decoded requests, validates them, and drives the managers. Also the
/// funnel for every asynchronous event (engine callbacks, scan reports,
/// timer expiry, client disconnects) so managers and store stay on one
/// logical thread of control.
pub struct Dispatcher<K> {
    keys: KeyManager<K>,
    provisioning: ProvisioningManager,
    scans: ScanManager,
}

impl<K: KeyStore> Dispatcher<K> {
    /// Wire the managers up to their collaborators.
    pub fn new(
        store: K,
        engine: Arc<dyn ProvisionInitiator>,
        gateway: Arc<dyn ClientGateway>,
        sender: Arc<dyn ModelSender>,
        beacon: Arc<dyn BeaconIo>,
        timers: Arc<dyn Timers>,
    ) -> Self {
        Self {
            keys: KeyManager::new(store),
            provisioning: ProvisioningManager::new(engine.clone(), gateway.clone()),
            scans: ScanManager::new(engine, sender, beacon, timers, gateway),
        }
    }

    /// The key manager, for direct inspection.
    pub const fn keys(&self) -> &KeyManager<K> {
        &self.keys
    }

    /// The provisioning manager, for direct inspection.
    pub const fn provisioning(&self) -> &ProvisioningManager {
        &self.provisioning
    }

    /// The scan manager, for direct inspection.
    pub const fn scans(&self) -> &ScanManager {
        &self.scans
    }

    /// Handle one client call. Every request resolves `reply` exactly once:
    /// synchronously for validation failures and store operations, or later
    /// through the provisioning engine's start acknowledgement for the
    /// deferred methods.
    pub fn dispatch(
        &mut self,
        node: &dyn NodeContext,
        requester: &ClientId,
        request: ManagementRequest,
        reply: Box<dyn ReplyHandle>,
    ) {
        debug!(node = %node.id(), method = request.method_name(), "management request");
        match request {
            ManagementRequest::AddNode { uuid, options } => {
                let params = match Self::add_node_params(&uuid, &options) {
                    Ok(params) => params,
                    Err(err) => return reply.resolve(Err(err)),
                };
                self.provisioning
                    .start_add_node(&mut self.scans, node, params, reply);
            }
            ManagementRequest::Reprovision { unicast, options } => {
                let params = match Self::reprovision_params(unicast, &options) {
                    Ok(params) => params,
                    Err(err) => return reply.resolve(Err(err)),
                };
                self.provisioning
                    .start_reprovision(&mut self.scans, node, params, reply);
            }
            ManagementRequest::ImportRemoteNode {
                primary,
                count,
                device_key,
            } => {
                let result = Self::unicast(primary).and_then(|primary| {
                    let key = KeyMaterial::from_slice(&device_key)
                        .map_err(|_| ManagerError::InvalidArguments("bad device key"))?;
                    self.keys
                        .import_device_key(node, requester, primary, count, key)
                });
                resolve_empty(reply, result);
            }
            ManagementRequest::DeleteRemoteNode { primary, count } => {
                let result = Self::unicast(primary)
                    .and_then(|primary| self.keys.delete_device_key(node, requester, primary, count));
                resolve_empty(reply, result);
            }
            ManagementRequest::UnprovisionedScan { options } => {
                let result = ScanOptions::parse(&options).and_then(|options| {
                    self.scans.start_scan(node, requester, ScanParams {
                        seconds: options.seconds,
                        net_index: options.net_index,
                        server: options.server,
                        filter: options.filter,
                        extended: options.extended,
                    })
                });
                resolve_empty(reply, result);
            }
            ManagementRequest::UnprovisionedScanCancel => {
                resolve_empty(reply, self.scans.cancel(node, requester));
            }
            ManagementRequest::CreateSubnet { net_index } => {
                let result = Self::net_index(net_index)
                    .and_then(|index| self.keys.create_subnet(node, requester, index));
                resolve_empty(reply, result);
            }
            ManagementRequest::UpdateSubnet { net_index } => {
                let result = Self::net_index(net_index)
                    .and_then(|index| self.keys.update_subnet(node, requester, index));
                resolve_empty(reply, result);
            }
            ManagementRequest::DeleteSubnet { net_index } => {
                let result = Self::net_index(net_index)
                    .and_then(|index| self.keys.delete_subnet(node, requester, index));
                resolve_empty(reply, result);
            }
            ManagementRequest::ImportSubnet { net_index, net_key } => {
                let result = Self::net_index(net_index).and_then(|index| {
                    let key = KeyMaterial::from_slice(&net_key)
                        .map_err(|_| ManagerError::InvalidArguments("bad network key"))?;
                    self.keys.import_subnet(node, requester, index, key)
                });
                resolve_empty(reply, result);
            }
            ManagementRequest::CreateAppKey {
                net_index,
                app_index,
            } => {
                let result = Self::net_index(net_index).and_then(|net| {
                    let app = Self::app_index(app_index)?;
                    self.keys.create_app_key(node, requester, net, app)
                });
                resolve_empty(reply, result);
            }
            ManagementRequest::UpdateAppKey { app_index } => {
                let result = Self::app_index(app_index)
                    .and_then(|index| self.keys.update_app_key(node, requester, index));
                resolve_empty(reply, result);
            }
            ManagementRequest::DeleteAppKey { app_index } => {
                let result = Self::app_index(app_index)
                    .and_then(|index| self.keys.delete_app_key(node, requester, index));
                resolve_empty(reply, result);
            }
            ManagementRequest::ImportAppKey {
                net_index,
                app_index,
                app_key,
            } => {
                let result = Self::net_index(net_index).and_then(|net| {
                    let app = Self::app_index(app_index)?;
                    let key = KeyMaterial::from_slice(&app_key)
                        .map_err(|_| ManagerError::InvalidArguments("bad application key"))?;
                    self.keys.import_app_key(node, requester, net, app, key)
                });
                resolve_empty(reply, result);
            }
            ManagementRequest::SetKeyPhase { net_index, phase } => {
                let result = Self::net_index(net_index).and_then(|index| {
                    let target = KeyRefreshPhase::from_byte(phase)
                        .ok_or(ManagerError::InvalidArguments("bad phase"))?;
                    self.keys.set_key_phase(node, requester, index, target)
                });
                resolve_empty(reply, result);
            }
            ManagementRequest::ExportKeys => {
                let result = self
                    .keys
                    .export_keys(node, requester)
                    .map(ReplyBody::Keys);
                reply.resolve(result);
            }
        }
    }

    // ── Asynchronous event entry points ─────────────────────────────────

    /// Engine start acknowledgement for a provisioning session.
    pub fn engine_started(&mut self, session: SessionId, result: Result<(), StartError>) {
        self.provisioning.engine_started(session, result);
    }

    /// Engine discovered the target's element count.
    pub fn engine_element_count(&mut self, session: SessionId, element_count: u8) -> EngineAck {
        self.provisioning.engine_element_count(session, element_count)
    }

    /// The client answered the nested provisioning-data request.
    pub fn provision_data(&mut self, session: SessionId, data: Result<ProvData, ManagerError>) {
        self.provisioning.provision_data(session, data);
    }

    /// Terminal engine callback for a provisioning session.
    pub fn engine_complete(
        &mut self,
        session: SessionId,
        status: ProvStatus,
        device: Option<ProvisionedDevice>,
    ) -> EngineAck {
        self.provisioning
            .engine_complete(self.keys.store_mut(), session, status, device)
    }

    /// A client connection went away.
    pub fn client_disconnected(&mut self, client: &ClientId) {
        self.provisioning.client_disconnected(client);
    }

    /// A discovery report arrived from the radio or a remote server.
    pub fn scan_report(&mut self, node: NodeId, server: ScanServer, report: &ScanReport) {
        self.scans.handle_report(node, server, report);
    }

    /// A scan session's countdown expired.
    pub fn scan_timeout(&mut self, key: ScanTimerKey) {
        self.scans.handle_timeout(key);
    }

    // ── Boundary validation helpers ─────────────────────────────────────

    fn add_node_params(
        uuid: &[u8],
        options: &[(String, crate::options::OptionValue)],
    ) -> Result<AddNodeParams, ManagerError> {
        let uuid = if uuid.is_empty() {
            None
        } else {
            Some(DeviceUuid::from_slice(uuid)
                .map_err(|_| ManagerError::InvalidArguments("bad device UUID"))?)
        };
        let options = AddNodeOptions::parse(options)?;
        Ok(AddNodeParams {
            uuid,
            seconds: options.seconds.unwrap_or(DEFAULT_ADD_TIMEOUT_SECS),
            server: options.server,
            net_index: options.net_index,
        })
    }

    fn reprovision_params(
        unicast: u16,
        options: &[(String, crate::options::OptionValue)],
    ) -> Result<ReprovisionParams, ManagerError> {
        let target =
            UnicastAddress::new(unicast).ok_or(ManagerError::InvalidArguments("bad unicast"))?;
        let options = ReprovisionOptions::parse(options)?;
        Ok(ReprovisionParams {
            target,
            mode: options.mode.unwrap_or(weft_core::NppiMode::DeviceKeyRefresh),
            net_index: options.net_index,
        })
    }

    fn unicast(raw: u16) -> Result<UnicastAddress, ManagerError> {
        UnicastAddress::new(raw).ok_or(ManagerError::InvalidArguments("bad unicast"))
    }

    fn net_index(raw: u16) -> Result<NetKeyIndex, ManagerError> {
        NetKeyIndex::new(raw).ok_or(ManagerError::InvalidArguments("bad net index"))
    }

    fn app_index(raw: u16) -> Result<weft_core::AppKeyIndex, ManagerError> {
        weft_core::AppKeyIndex::new(raw).ok_or(ManagerError::InvalidArguments("bad app index"))
    }
}

fn resolve_empty(reply: Box<dyn ReplyHandle>, result: Result<(), ManagerError>) {
    reply.resolve(result.map(|()| ReplyBody::Empty));
}
