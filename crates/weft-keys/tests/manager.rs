//! Lifecycle and authorization tests for `KeyManager`.
//!
//! These live as an integration test (rather than a `#[cfg(test)]` module in
//! `src/`) because they drive the manager through `weft-testkit`'s
//! `MemoryKeyStore`, and `weft-testkit` depends on `weft-keys`; a unit test
//! using it would pull in two distinct copies of this crate.

use pretty_assertions::assert_eq;

use weft_core::{
    AppKeyIndex, ClientId, KeyMaterial, ManagerError, NetKeyIndex, NodeContext, UnicastAddress,
};
use weft_keys::{KeyManager, KeyRefreshPhase};
use weft_testkit::{MemoryKeyStore, StoreOp, TestNode};


fn manager() -> KeyManager<MemoryKeyStore> {
    KeyManager::new(MemoryKeyStore::new())
}

fn net(raw: u16) -> NetKeyIndex {
    NetKeyIndex::new(raw).unwrap()
}

fn app(raw: u16) -> AppKeyIndex {
    AppKeyIndex::new(raw).unwrap()
}

fn key(byte: u8) -> KeyMaterial {
    KeyMaterial::new([byte; 16])
}

// ── Subnets ─────────────────────────────────────────────────────────

#[test]
fn import_subnet_is_idempotent_for_identical_material() {
    let node = TestNode::new(1, "client-a");
    let mut keys = manager();

    keys.import_subnet(&node, node.owner(), net(3), key(0x11)).unwrap();
    keys.import_subnet(&node, node.owner(), net(3), key(0x11)).unwrap();

    assert_eq!(keys.store().ops().len(), 1);
    let record = keys.store().net_record(net(3)).unwrap();
    assert_eq!(record.old_key, key(0x11));
    assert_eq!(record.new_key, key(0x11));
    assert_eq!(record.phase, KeyRefreshPhase::None);
}

#[test]
fn import_subnet_conflicts_on_different_material() {
    let node = TestNode::new(1, "client-a");
    let mut keys = manager();

    keys.import_subnet(&node, node.owner(), net(3), key(0x11)).unwrap();
    let err = keys
        .import_subnet(&node, node.owner(), net(3), key(0x22))
        .unwrap_err();

    assert_eq!(err, ManagerError::AlreadyExists("subnet exists"));
    assert_eq!(keys.store().net_record(net(3)).unwrap().old_key, key(0x11));
}

#[test]
fn create_subnet_rejects_primary_index() {
    let node = TestNode::new(1, "client-a");
    let mut keys = manager();

    let err = keys
        .create_subnet(&node, node.owner(), NetKeyIndex::PRIMARY)
        .unwrap_err();
    assert!(matches!(err, ManagerError::InvalidArguments(_)));
    assert!(keys.store().ops().is_empty());
}

#[test]
fn create_subnet_generates_fresh_material() {
    let node = TestNode::new(1, "client-a");
    let mut keys = manager();

    keys.create_subnet(&node, node.owner(), net(7)).unwrap();
    let record = keys.store().net_record(net(7)).unwrap();
    assert_eq!(record.old_key, record.new_key);
    assert_eq!(record.phase, KeyRefreshPhase::None);
}

#[test]
fn update_subnet_starts_refresh_then_is_a_no_op() {
    let node = TestNode::new(1, "client-a");
    let mut keys = manager();
    keys.import_subnet(&node, node.owner(), net(3), key(0x11)).unwrap();

    keys.update_subnet(&node, node.owner(), net(3)).unwrap();
    let after_first = keys.store().net_record(net(3)).unwrap().clone();
    assert_eq!(after_first.phase, KeyRefreshPhase::One);
    assert_eq!(after_first.old_key, key(0x11));
    assert_ne!(after_first.new_key, after_first.old_key);

    // Redundant call: success, material unchanged.
    keys.update_subnet(&node, node.owner(), net(3)).unwrap();
    assert_eq!(keys.store().net_record(net(3)).unwrap(), &after_first);
}

#[test]
fn update_subnet_rejects_later_phases() {
    let node = TestNode::new(1, "client-a");
    let mut keys = manager();
    keys.import_subnet(&node, node.owner(), net(3), key(0x11)).unwrap();
    keys.update_subnet(&node, node.owner(), net(3)).unwrap();
    keys.set_key_phase(&node, node.owner(), net(3), KeyRefreshPhase::Two)
        .unwrap();

    let err = keys.update_subnet(&node, node.owner(), net(3)).unwrap_err();
    assert_eq!(err, ManagerError::InProgress("key refresh in progress"));
}

#[test]
fn update_subnet_requires_existing_key() {
    let node = TestNode::new(1, "client-a");
    let mut keys = manager();
    assert!(matches!(
        keys.update_subnet(&node, node.owner(), net(9)),
        Err(ManagerError::DoesNotExist(_))
    ));
}

#[test]
fn delete_subnet_is_idempotent() {
    let node = TestNode::new(1, "client-a");
    let mut keys = manager();
    keys.import_subnet(&node, node.owner(), net(3), key(0x11)).unwrap();

    keys.delete_subnet(&node, node.owner(), net(3)).unwrap();
    keys.delete_subnet(&node, node.owner(), net(3)).unwrap();
    assert!(keys.store().net_record(net(3)).is_none());
}

// ── Key refresh phases ──────────────────────────────────────────────

#[test]
fn set_key_phase_rejects_phase_one() {
    let node = TestNode::new(1, "client-a");
    let mut keys = manager();
    keys.import_subnet(&node, node.owner(), net(3), key(0x11)).unwrap();

    let err = keys
        .set_key_phase(&node, node.owner(), net(3), KeyRefreshPhase::One)
        .unwrap_err();
    assert_eq!(err, ManagerError::InvalidArguments("bad phase"));
}

#[test]
fn cancel_refresh_from_phase_one_restores_old_material() {
    let node = TestNode::new(1, "client-a");
    let mut keys = manager();
    keys.import_subnet(&node, node.owner(), net(3), key(0x11)).unwrap();
    keys.update_subnet(&node, node.owner(), net(3)).unwrap();

    keys.set_key_phase(&node, node.owner(), net(3), KeyRefreshPhase::None)
        .unwrap();

    let record = keys.store().net_record(net(3)).unwrap();
    assert_eq!(record.phase, KeyRefreshPhase::None);
    assert_eq!(record.old_key, key(0x11));
    assert_eq!(record.new_key, key(0x11));
}

#[test]
fn cancel_refresh_rejected_once_network_switched() {
    let node = TestNode::new(1, "client-a");
    let mut keys = manager();
    keys.import_subnet(&node, node.owner(), net(3), key(0x11)).unwrap();
    keys.update_subnet(&node, node.owner(), net(3)).unwrap();
    keys.set_key_phase(&node, node.owner(), net(3), KeyRefreshPhase::Two)
        .unwrap();

    let err = keys
        .set_key_phase(&node, node.owner(), net(3), KeyRefreshPhase::None)
        .unwrap_err();
    assert!(matches!(err, ManagerError::InvalidArguments(_)));
    assert_eq!(
        keys.store().net_record(net(3)).unwrap().phase,
        KeyRefreshPhase::Two
    );
}

#[test]
fn finalize_promotes_new_key_and_bound_app_keys() {
    let node = TestNode::new(1, "client-a");
    let mut keys = manager();
    keys.import_subnet(&node, node.owner(), net(3), key(0x11)).unwrap();
    keys.import_app_key(&node, node.owner(), net(3), app(5), key(0x33))
        .unwrap();
    keys.update_subnet(&node, node.owner(), net(3)).unwrap();
    keys.update_app_key(&node, node.owner(), app(5)).unwrap();

    keys.set_key_phase(&node, node.owner(), net(3), KeyRefreshPhase::Three)
        .unwrap();

    let record = keys.store().net_record(net(3)).unwrap();
    assert_eq!(record.phase, KeyRefreshPhase::None);
    assert_eq!(record.old_key, record.new_key);
    assert_ne!(record.old_key, key(0x11));

    let app_record = keys.store().app_record(app(5)).unwrap();
    assert_eq!(app_record.old_key, app_record.new_key);
    assert_ne!(app_record.old_key, key(0x33));

    // App keys finalize before the subnet record is rewritten.
    let ops = keys.store().ops();
    let finalize = ops
        .iter()
        .position(|op| *op == StoreOp::FinalizeAppKeys(3))
        .unwrap();
    let last_put = ops
        .iter()
        .rposition(|op| *op == StoreOp::PutNetKey(3))
        .unwrap();
    assert!(finalize < last_put);
}

#[test]
fn finalize_from_phase_none_is_a_no_op() {
    let node = TestNode::new(1, "client-a");
    let mut keys = manager();
    keys.import_subnet(&node, node.owner(), net(3), key(0x11)).unwrap();
    let before = keys.store().ops().len();

    keys.set_key_phase(&node, node.owner(), net(3), KeyRefreshPhase::Three)
        .unwrap();
    assert_eq!(keys.store().ops().len(), before);
}

#[test]
fn finalize_from_phase_two_behaves_like_phase_one() {
    let node = TestNode::new(1, "client-a");
    let mut keys = manager();
    keys.import_subnet(&node, node.owner(), net(3), key(0x11)).unwrap();
    keys.update_subnet(&node, node.owner(), net(3)).unwrap();
    keys.set_key_phase(&node, node.owner(), net(3), KeyRefreshPhase::Two)
        .unwrap();

    keys.set_key_phase(&node, node.owner(), net(3), KeyRefreshPhase::Three)
        .unwrap();

    let record = keys.store().net_record(net(3)).unwrap();
    assert_eq!(record.phase, KeyRefreshPhase::None);
    assert_eq!(record.old_key, record.new_key);
}

#[test]
fn finalize_failure_leaves_phase_unchanged() {
    let node = TestNode::new(1, "client-a");
    let mut keys = manager();
    keys.import_subnet(&node, node.owner(), net(3), key(0x11)).unwrap();
    keys.update_subnet(&node, node.owner(), net(3)).unwrap();

    keys.store_mut().fail_finalize(true);
    let err = keys
        .set_key_phase(&node, node.owner(), net(3), KeyRefreshPhase::Three)
        .unwrap_err();
    assert_eq!(err, ManagerError::Failed("keyring failure"));

    let record = keys.store().net_record(net(3)).unwrap();
    assert_eq!(record.phase, KeyRefreshPhase::One);
    assert_eq!(record.old_key, key(0x11));
}

// ── Application keys ────────────────────────────────────────────────

#[test]
fn app_key_requires_bound_subnet() {
    let node = TestNode::new(1, "client-a");
    let mut keys = manager();
    assert!(matches!(
        keys.import_app_key(&node, node.owner(), net(3), app(5), key(0x33)),
        Err(ManagerError::DoesNotExist(_))
    ));
}

#[test]
fn app_key_create_is_idempotent_on_identical_material_and_binding() {
    let node = TestNode::new(1, "client-a");
    let mut keys = manager();
    keys.import_subnet(&node, node.owner(), net(3), key(0x11)).unwrap();
    keys.import_subnet(&node, node.owner(), net(4), key(0x22)).unwrap();

    keys.import_app_key(&node, node.owner(), net(3), app(5), key(0x33))
        .unwrap();
    keys.import_app_key(&node, node.owner(), net(3), app(5), key(0x33))
        .unwrap();

    // Same material but a different binding is a conflict.
    let err = keys
        .import_app_key(&node, node.owner(), net(4), app(5), key(0x33))
        .unwrap_err();
    assert_eq!(err, ManagerError::AlreadyExists("app key exists"));
}

#[test]
fn update_app_key_requires_bound_refresh_phase_one() {
    let node = TestNode::new(1, "client-a");
    let mut keys = manager();
    keys.import_subnet(&node, node.owner(), net(3), key(0x11)).unwrap();
    keys.import_app_key(&node, node.owner(), net(3), app(5), key(0x33))
        .unwrap();

    let err = keys.update_app_key(&node, node.owner(), app(5)).unwrap_err();
    assert_eq!(err, ManagerError::Failed("invalid phase"));
    let record = keys.store().app_record(app(5)).unwrap();
    assert_eq!(record.old_key, key(0x33));
    assert_eq!(record.new_key, key(0x33));

    keys.update_subnet(&node, node.owner(), net(3)).unwrap();
    keys.update_app_key(&node, node.owner(), app(5)).unwrap();
    let record = keys.store().app_record(app(5)).unwrap();
    assert_eq!(record.old_key, key(0x33));
    assert_ne!(record.new_key, key(0x33));
}

// ── Device keys ─────────────────────────────────────────────────────

#[test]
fn import_device_key_stores_record() {
    let node = TestNode::new(1, "client-a");
    let mut keys = manager();
    let unicast = UnicastAddress::new(0x0100).unwrap();

    keys.import_device_key(&node, node.owner(), unicast, 3, key(0x44))
        .unwrap();
    assert_eq!(keys.store().device_records().len(), 1);
    assert_eq!(keys.store().device_records()[0].unicast, unicast);
    assert_eq!(keys.store().device_records()[0].element_count, 3);
}

#[test]
fn delete_device_key_rejects_local_address() {
    let node = TestNode::new(1, "client-a").with_primary(0x0001).with_element_count(2);
    let mut keys = manager();
    let own = UnicastAddress::new(0x0002).unwrap();

    let err = keys
        .delete_device_key(&node, node.owner(), own, 1)
        .unwrap_err();
    assert_eq!(
        err,
        ManagerError::InvalidArguments("cannot remove local device key")
    );
    assert!(keys.store().ops().is_empty());
}

#[test]
fn delete_device_key_removes_remote_record() {
    let node = TestNode::new(1, "client-a");
    let mut keys = manager();
    let unicast = UnicastAddress::new(0x0100).unwrap();
    keys.import_device_key(&node, node.owner(), unicast, 3, key(0x44))
        .unwrap();

    keys.delete_device_key(&node, node.owner(), unicast, 3).unwrap();
    assert!(keys.store().device_records().is_empty());
}

// ── Export and authorization ────────────────────────────────────────

#[test]
fn export_returns_net_and_device_keys() {
    let node = TestNode::new(1, "client-a");
    let mut keys = manager();
    keys.import_subnet(&node, node.owner(), net(3), key(0x11)).unwrap();
    keys.import_device_key(
        &node,
        node.owner(),
        UnicastAddress::new(0x0100).unwrap(),
        1,
        key(0x44),
    )
    .unwrap();

    let export = keys.export_keys(&node, node.owner()).unwrap();
    assert_eq!(export.net_keys.len(), 1);
    assert_eq!(export.device_keys.len(), 1);
}

#[test]
fn every_operation_rejects_a_non_owner() {
    let node = TestNode::new(1, "client-a");
    let stranger = ClientId::new("client-b");
    let mut keys = manager();

    assert!(matches!(
        keys.create_subnet(&node, &stranger, net(3)),
        Err(ManagerError::NotAuthorized(_))
    ));
    assert!(matches!(
        keys.update_subnet(&node, &stranger, net(3)),
        Err(ManagerError::NotAuthorized(_))
    ));
    assert!(matches!(
        keys.set_key_phase(&node, &stranger, net(3), KeyRefreshPhase::Two),
        Err(ManagerError::NotAuthorized(_))
    ));
    assert!(matches!(
        keys.export_keys(&node, &stranger),
        Err(ManagerError::NotAuthorized(_))
    ));
    assert!(keys.store().ops().is_empty());
}
