//! Recording fake of the provisioning engine.

use std::collections::HashSet;

use parking_lot::Mutex;

use weft_core::{NetKeyIndex, NodeId, UnicastAddress};
use weft_provisioner::{InitiatorParams, ProvisionInitiator, SessionId};

/// One call received by the fake engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Start(InitiatorParams),
    Cancel(SessionId),
    DeliverProvData {
        session: SessionId,
        net_index: NetKeyIndex,
        unicast: UnicastAddress,
    },
    ScanRegister(NodeId),
    ScanUnregister(NodeId),
}

/// A `ProvisionInitiator` that records calls; tests drive the callbacks
/// directly on the manager.
#[derive(Debug, Default)]
pub struct FakeInitiator {
    calls: Mutex<Vec<EngineCall>>,
    scan_nodes: Mutex<HashSet<NodeId>>,
}

impl FakeInitiator {
    /// Every call received, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    /// Parameters of every `start` call.
    #[must_use]
    pub fn started(&self) -> Vec<InitiatorParams> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                EngineCall::Start(params) => Some(params.clone()),
                _ => None,
            })
            .collect()
    }

    /// Parameters of the most recent `start` call.
    #[must_use]
    pub fn last_started(&self) -> Option<InitiatorParams> {
        self.started().pop()
    }

    /// Sessions cancelled so far.
    #[must_use]
    pub fn cancelled(&self) -> Vec<SessionId> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                EngineCall::Cancel(session) => Some(*session),
                _ => None,
            })
            .collect()
    }

    /// Whether the node is currently scan-registered.
    #[must_use]
    pub fn scan_registered(&self, node: NodeId) -> bool {
        self.scan_nodes.lock().contains(&node)
    }
}

impl ProvisionInitiator for FakeInitiator {
    fn start(&self, params: InitiatorParams) {
        self.calls.lock().push(EngineCall::Start(params));
    }

    fn cancel(&self, session: SessionId) {
        self.calls.lock().push(EngineCall::Cancel(session));
    }

    fn deliver_prov_data(&self, session: SessionId, net_index: NetKeyIndex, unicast: UnicastAddress) {
        self.calls.lock().push(EngineCall::DeliverProvData {
            session,
            net_index,
            unicast,
        });
    }

    fn scan_register(&self, node: NodeId) {
        self.calls.lock().push(EngineCall::ScanRegister(node));
        self.scan_nodes.lock().insert(node);
    }

    fn scan_unregister(&self, node: NodeId) {
        self.calls.lock().push(EngineCall::ScanUnregister(node));
        self.scan_nodes.lock().remove(&node);
    }
}
