//! End-to-end exercises of the provisioning session manager against fake
//! collaborators: session lifecycle, engine callback sequencing, key
//! commits, and disconnect handling.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use weft_core::{
    ClientId, DeviceUuid, KeyMaterial, ManagerError, NetKeyIndex, NodeContext, NppiMode,
    ProvStatus, TransportMode, UnicastAddress,
};
use weft_keys::KeyStore;
use weft_provisioner::{
    AddNodeParams, EngineAck, ProvData, ProvDataKind, ProvisionedDevice, ProvisioningManager,
    ReplyBody, ReprovisionParams, ScanManager, ScanParams, SessionId, Signal, StartError,
};
use weft_testkit::{
    FakeBeacon, FakeInitiator, ManualTimers, MemoryKeyStore, RecordingGateway, RecordingSender,
    ReplySlot, StoreOp, TestNode,
};

struct Fixture {
    engine: Arc<FakeInitiator>,
    gateway: Arc<RecordingGateway>,
    beacon: Arc<FakeBeacon>,
    store: MemoryKeyStore,
    prov: ProvisioningManager,
    scans: ScanManager,
}

fn fixture() -> Fixture {
    weft_testkit::init_tracing();
    let engine = Arc::new(FakeInitiator::default());
    let gateway = Arc::new(RecordingGateway::default());
    let sender = Arc::new(RecordingSender::default());
    let beacon = Arc::new(FakeBeacon::default());
    let timers = Arc::new(ManualTimers::default());
    let prov = ProvisioningManager::new(engine.clone(), gateway.clone());
    let scans = ScanManager::new(
        engine.clone(),
        sender,
        beacon.clone(),
        timers,
        gateway.clone(),
    );
    Fixture {
        engine,
        gateway,
        beacon,
        store: MemoryKeyStore::new(),
        prov,
        scans,
    }
}

fn add_params(uuid: [u8; 16]) -> AddNodeParams {
    AddNodeParams {
        uuid: Some(DeviceUuid::new(uuid)),
        seconds: 60,
        server: None,
        net_index: None,
    }
}

fn device(unicast: u16, element_count: u8) -> ProvisionedDevice {
    ProvisionedDevice {
        device_key: KeyMaterial::new([0x99; 16]),
        unicast: UnicastAddress::new(unicast).unwrap(),
        element_count,
    }
}

fn started_session(fx: &Fixture) -> SessionId {
    fx.engine.last_started().unwrap().session
}

#[test]
fn add_node_defers_reply_and_starts_engine() {
    let mut fx = fixture();
    let node = TestNode::new(1, "client-a");
    let slot = ReplySlot::new();

    fx.prov
        .start_add_node(&mut fx.scans, &node, add_params([0xAA; 16]), slot.handle());

    assert!(!slot.is_resolved());
    assert!(fx.prov.has_session(node.id()));
    assert_eq!(fx.gateway.active_watches(), 1);

    let params = fx.engine.last_started().unwrap();
    assert_eq!(params.transport, TransportMode::NewDevice);
    assert_eq!(params.uuid, Some(DeviceUuid::new([0xAA; 16])));
    assert_eq!(params.attention, 99);
    assert_eq!(params.timeout_secs, 60);
    assert_eq!(params.net_index, NetKeyIndex::PRIMARY);
    // No server given: the handshake targets the node's own primary.
    assert_eq!(params.target, node.primary_address().unwrap());
}

#[test]
fn add_node_requires_provisioner_role_and_agent() {
    let mut fx = fixture();

    for node in [
        TestNode::new(1, "client-a").without_provisioner_role(),
        TestNode::new(2, "client-a").without_agent(),
    ] {
        let slot = ReplySlot::new();
        fx.prov
            .start_add_node(&mut fx.scans, &node, add_params([0xAA; 16]), slot.handle());

        assert_eq!(
            slot.result(),
            Some(Err(ManagerError::NotAuthorized("missing interfaces")))
        );
        assert!(!fx.prov.has_session(node.id()));
    }
    assert!(fx.engine.started().is_empty());
    assert_eq!(fx.gateway.active_watches(), 0);
}

#[test]
fn add_node_without_uuid_requires_remote_server() {
    let mut fx = fixture();
    let node = TestNode::new(1, "client-a");

    let slot = ReplySlot::new();
    fx.prov.start_add_node(
        &mut fx.scans,
        &node,
        AddNodeParams {
            uuid: None,
            seconds: 60,
            server: None,
            net_index: None,
        },
        slot.handle(),
    );
    assert!(matches!(
        slot.result(),
        Some(Err(ManagerError::InvalidArguments(_)))
    ));

    // With a remote server the bare re-key is a valid request.
    let slot = ReplySlot::new();
    fx.prov.start_add_node(
        &mut fx.scans,
        &node,
        AddNodeParams {
            uuid: None,
            seconds: 30,
            server: UnicastAddress::new(0x0042),
            net_index: None,
        },
        slot.handle(),
    );
    assert!(!slot.is_resolved());
    let params = fx.engine.last_started().unwrap();
    assert_eq!(params.uuid, None);
    assert_eq!(params.target.value(), 0x0042);
}

#[test]
fn second_start_on_same_node_fails_in_progress() {
    let mut fx = fixture();
    let node = TestNode::new(1, "client-a");

    let first = ReplySlot::new();
    fx.prov
        .start_add_node(&mut fx.scans, &node, add_params([0xAA; 16]), first.handle());
    let second = ReplySlot::new();
    fx.prov
        .start_add_node(&mut fx.scans, &node, add_params([0xBB; 16]), second.handle());

    assert_eq!(
        second.result(),
        Some(Err(ManagerError::InProgress("provisioning in progress")))
    );
    // The original session is untouched.
    assert!(!first.is_resolved());
    assert_eq!(fx.engine.started().len(), 1);
    assert_eq!(fx.gateway.active_watches(), 1);
}

#[test]
fn add_node_cancels_outstanding_scans() {
    let mut fx = fixture();
    let node = TestNode::new(1, "client-a");
    fx.scans
        .start_scan(&node, node.owner(), ScanParams::default())
        .unwrap();
    assert_eq!(fx.scans.active_sessions(), 1);

    let slot = ReplySlot::new();
    fx.prov
        .start_add_node(&mut fx.scans, &node, add_params([0xAA; 16]), slot.handle());

    assert_eq!(fx.scans.active_sessions(), 0);
    assert!(!fx.beacon.is_registered(node.id()));
}

#[test]
fn engine_start_ack_resolves_the_deferred_reply() {
    let mut fx = fixture();
    let node = TestNode::new(1, "client-a");
    let slot = ReplySlot::new();
    fx.prov
        .start_add_node(&mut fx.scans, &node, add_params([0xAA; 16]), slot.handle());

    fx.prov.engine_started(started_session(&fx), Ok(()));

    assert_eq!(slot.result(), Some(Ok(ReplyBody::Empty)));
    assert!(fx.prov.has_session(node.id()));
}

#[test]
fn failed_engine_start_replies_error_and_destroys_session() {
    let mut fx = fixture();
    let node = TestNode::new(1, "client-a");
    let slot = ReplySlot::new();
    fx.prov
        .start_add_node(&mut fx.scans, &node, add_params([0xAA; 16]), slot.handle());

    fx.prov.engine_started(started_session(&fx), Err(StartError));

    assert_eq!(
        slot.result(),
        Some(Err(ManagerError::Failed(
            "failed to start provisioning initiator"
        )))
    );
    assert!(!fx.prov.has_session(node.id()));
    assert_eq!(fx.gateway.active_watches(), 0);
}

#[test]
fn element_count_triggers_nested_prov_data_request() {
    let mut fx = fixture();
    let node = TestNode::new(1, "client-a");
    let slot = ReplySlot::new();
    fx.prov
        .start_add_node(&mut fx.scans, &node, add_params([0xAA; 16]), slot.handle());
    let session = started_session(&fx);
    fx.prov.engine_started(session, Ok(()));

    let ack = fx.prov.engine_element_count(session, 4);

    assert_eq!(ack, EngineAck::Accepted);
    let requests = fx.gateway.prov_data_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].1, session);
    assert_eq!(requests[0].2, ProvDataKind::NewDevice { element_count: 4 });
}

#[test]
fn element_count_for_stale_session_is_rejected() {
    let mut fx = fixture();
    let node = TestNode::new(1, "client-a");
    let slot = ReplySlot::new();
    fx.prov
        .start_add_node(&mut fx.scans, &node, add_params([0xAA; 16]), slot.handle());
    fx.prov.engine_started(started_session(&fx), Ok(()));

    assert_eq!(
        fx.prov.engine_element_count(SessionId(0xDEAD), 4),
        EngineAck::Rejected
    );
    assert!(fx.gateway.prov_data_requests().is_empty());
}

#[test]
fn prov_data_answer_is_forwarded_into_the_engine() {
    let mut fx = fixture();
    let node = TestNode::new(1, "client-a");
    let slot = ReplySlot::new();
    fx.prov
        .start_add_node(&mut fx.scans, &node, add_params([0xAA; 16]), slot.handle());
    let session = started_session(&fx);
    fx.prov.engine_started(session, Ok(()));
    let _ = fx.prov.engine_element_count(session, 4);

    fx.prov.provision_data(
        session,
        Ok(ProvData::NewDevice {
            net_index: NetKeyIndex::new(2).unwrap(),
            unicast: UnicastAddress::new(0x0200).unwrap(),
        }),
    );

    let delivered = fx
        .engine
        .calls()
        .into_iter()
        .find_map(|call| match call {
            weft_testkit::EngineCall::DeliverProvData {
                session: delivered,
                net_index,
                unicast,
            } => Some((delivered, net_index, unicast)),
            _ => None,
        })
        .unwrap();
    assert_eq!(delivered.0, session);
    assert_eq!(delivered.1.value(), 2);
    assert_eq!(delivered.2.value(), 0x0200);
}

#[test]
fn successful_completion_commits_device_key_and_signals() {
    let mut fx = fixture();
    let node = TestNode::new(1, "client-a");
    let slot = ReplySlot::new();
    fx.prov
        .start_add_node(&mut fx.scans, &node, add_params([0xAA; 16]), slot.handle());
    let session = started_session(&fx);
    fx.prov.engine_started(session, Ok(()));

    let ack = fx.prov.engine_complete(
        &mut fx.store,
        session,
        ProvStatus::Success,
        Some(device(0x0200, 2)),
    );

    assert_eq!(ack, EngineAck::Accepted);
    assert!(!fx.prov.has_session(node.id()));
    assert_eq!(fx.gateway.active_watches(), 0);
    assert_eq!(fx.store.device_records().len(), 1);
    assert_eq!(fx.store.device_records()[0].unicast.value(), 0x0200);

    let signals = fx.gateway.signals();
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].1, Signal::AddNodeComplete {
        uuid: DeviceUuid::new([0xAA; 16]),
        unicast: UnicastAddress::new(0x0200).unwrap(),
        element_count: 2,
    });
}

#[test]
fn failed_completion_signals_add_node_failed() {
    let mut fx = fixture();
    let node = TestNode::new(1, "client-a");
    let slot = ReplySlot::new();
    fx.prov
        .start_add_node(&mut fx.scans, &node, add_params([0xAA; 16]), slot.handle());
    let session = started_session(&fx);
    fx.prov.engine_started(session, Ok(()));

    let ack = fx
        .prov
        .engine_complete(&mut fx.store, session, ProvStatus::ConfirmationFailed, None);

    assert_eq!(ack, EngineAck::Rejected);
    assert!(!fx.prov.has_session(node.id()));
    assert_eq!(fx.gateway.signals(), vec![(
        node.owner().clone(),
        Signal::AddNodeFailed {
            uuid: DeviceUuid::new([0xAA; 16]),
            reason: "confirmation-failed",
        }
    )]);
    assert!(fx.store.device_records().is_empty());
}

#[test]
fn store_failure_on_commit_reports_address_assignment_failure() {
    let mut fx = fixture();
    let node = TestNode::new(1, "client-a");
    let slot = ReplySlot::new();
    fx.prov
        .start_add_node(&mut fx.scans, &node, add_params([0xAA; 16]), slot.handle());
    let session = started_session(&fx);
    fx.prov.engine_started(session, Ok(()));

    fx.store.fail_device_puts(true);
    let ack = fx.prov.engine_complete(
        &mut fx.store,
        session,
        ProvStatus::Success,
        Some(device(0x0200, 2)),
    );

    assert_eq!(ack, EngineAck::Rejected);
    let signals = fx.gateway.signals();
    assert_eq!(signals.len(), 1);
    assert!(matches!(&signals[0].1, Signal::AddNodeFailed { reason, .. }
        if *reason == "cannot-assign-addresses"));
}

#[test]
fn address_change_reprovision_purges_old_keys_before_commit() {
    let mut fx = fixture();
    let node = TestNode::new(1, "client-a");
    let original = UnicastAddress::new(0x0100).unwrap();
    fx.store
        .put_device_key(weft_keys::DeviceKeyRecord {
            unicast: original,
            element_count: 1,
            key: KeyMaterial::new([0x55; 16]),
        })
        .unwrap();

    let slot = ReplySlot::new();
    fx.prov.start_reprovision(
        &mut fx.scans,
        &node,
        ReprovisionParams {
            target: original,
            mode: NppiMode::AddressChange,
            net_index: None,
        },
        slot.handle(),
    );
    let session = started_session(&fx);
    assert_eq!(
        fx.engine.last_started().unwrap().transport,
        TransportMode::Nppi(NppiMode::AddressChange)
    );
    assert_eq!(fx.engine.last_started().unwrap().timeout_secs, 60);

    fx.prov.engine_started(session, Ok(()));

    let ack = fx.prov.engine_element_count(session, 1);
    assert_eq!(ack, EngineAck::Accepted);
    assert_eq!(fx.gateway.prov_data_requests()[0].2, ProvDataKind::AddressChange {
        original,
        element_count: 1,
    });

    fx.prov.provision_data(
        session,
        Ok(ProvData::AddressChange {
            unicast: UnicastAddress::new(0x0300).unwrap(),
        }),
    );

    let ack = fx.prov.engine_complete(
        &mut fx.store,
        session,
        ProvStatus::Success,
        Some(device(0x0300, 1)),
    );
    assert_eq!(ack, EngineAck::Accepted);

    // Old-address keys are purged before the new key is committed.
    let ops = fx.store.ops();
    let purge = ops
        .iter()
        .position(|op| *op == StoreOp::DeleteDeviceKeyAll(0x0100))
        .unwrap();
    let commit = ops
        .iter()
        .position(|op| *op == StoreOp::PutDeviceKey(0x0300))
        .unwrap();
    assert!(purge < commit);
    assert_eq!(fx.store.device_records().len(), 1);

    assert_eq!(fx.gateway.signals(), vec![(
        node.owner().clone(),
        Signal::ReprovComplete {
            original,
            nppi: NppiMode::AddressChange,
            unicast: UnicastAddress::new(0x0300).unwrap(),
            element_count: 1,
        }
    )]);
}

#[test]
fn device_key_refresh_needs_no_prov_data() {
    let mut fx = fixture();
    let node = TestNode::new(1, "client-a");
    let slot = ReplySlot::new();
    fx.prov.start_reprovision(
        &mut fx.scans,
        &node,
        ReprovisionParams {
            target: UnicastAddress::new(0x0100).unwrap(),
            mode: NppiMode::DeviceKeyRefresh,
            net_index: None,
        },
        slot.handle(),
    );
    let session = started_session(&fx);
    fx.prov.engine_started(session, Ok(()));

    assert_eq!(fx.prov.engine_element_count(session, 1), EngineAck::Rejected);
    assert!(fx.gateway.prov_data_requests().is_empty());
    // The session is still live; completion arrives without a data phase.
    assert!(fx.prov.has_session(node.id()));
}

#[test]
fn client_disconnect_aborts_session_without_any_reply_or_signal() {
    let mut fx = fixture();
    let node = TestNode::new(1, "client-a");
    let slot = ReplySlot::new();
    fx.prov
        .start_add_node(&mut fx.scans, &node, add_params([0xAA; 16]), slot.handle());
    let session = started_session(&fx);

    fx.prov.client_disconnected(&ClientId::new("client-a"));

    assert!(!fx.prov.has_session(node.id()));
    assert_eq!(fx.engine.cancelled(), vec![session]);
    assert!(fx.gateway.signals().is_empty());
    // The held request dies with the transport.
    assert!(!slot.is_resolved());
    assert_eq!(fx.gateway.active_watches(), 0);

    // Late engine callbacks are now stale.
    assert_eq!(fx.prov.engine_element_count(session, 2), EngineAck::Rejected);
    assert_eq!(
        fx.prov
            .engine_complete(&mut fx.store, session, ProvStatus::Success, Some(device(0x0200, 1))),
        EngineAck::Rejected
    );
}

#[test]
fn disconnect_of_a_different_client_leaves_session_alone() {
    let mut fx = fixture();
    let node = TestNode::new(1, "client-a");
    let slot = ReplySlot::new();
    fx.prov
        .start_add_node(&mut fx.scans, &node, add_params([0xAA; 16]), slot.handle());

    fx.prov.client_disconnected(&ClientId::new("client-b"));

    assert!(fx.prov.has_session(node.id()));
    assert!(fx.engine.cancelled().is_empty());
}
