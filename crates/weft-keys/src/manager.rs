//! The key lifecycle manager.

use tracing::debug;

use weft_core::{
    AppKeyIndex, ClientId, KeyMaterial, ManagerError, NetKeyIndex, NodeContext, UnicastAddress,
};

use crate::records::{AppKeyRecord, DeviceKeyRecord, KeyExport, KeyRefreshPhase, NetKeyRecord};
use crate::store::{KeyStore, StoreError};

/// Enforces key-rotation phase rules and idempotent create/import/delete
/// semantics over a [`KeyStore`].
///
/// Every operation authorizes the requester against the node owner before
/// any other validation, and validates before any store mutation. Records
/// are re-read on every call; nothing is cached across entry points.
#[derive(Debug)]
pub struct KeyManager<K> {
    store: K,
}

fn store_failed(_: StoreError) -> ManagerError {
    ManagerError::Failed("keyring failure")
}

fn authorize(node: &dyn NodeContext, requester: &ClientId) -> Result<(), ManagerError> {
    if node.owner() == requester {
        Ok(())
    } else {
        Err(ManagerError::NotAuthorized("sender is not the node owner"))
    }
}

impl<K: KeyStore> KeyManager<K> {
    /// Wrap a key store.
    pub const fn new(store: K) -> Self {
        Self { store }
    }

    /// Shared access to the underlying store.
    pub const fn store(&self) -> &K {
        &self.store
    }

    /// Exclusive access to the underlying store, for the provisioning
    /// manager's device-key commit path.
    pub fn store_mut(&mut self) -> &mut K {
        &mut self.store
    }

    // ── Network keys ────────────────────────────────────────────────────

    /// Create a subnet at `index` with freshly generated key material.
    ///
    /// The primary subnet's index is reserved and rejected here; it is
    /// created when the node itself is provisioned.
    pub fn create_subnet(
        &mut self,
        node: &dyn NodeContext,
        requester: &ClientId,
        index: NetKeyIndex,
    ) -> Result<(), ManagerError> {
        authorize(node, requester)?;
        if index.is_primary() {
            return Err(ManagerError::InvalidArguments("primary subnet is reserved"));
        }
        debug!(node = %node.id(), %index, "create subnet");
        self.store_new_subnet(index, KeyMaterial::random())
    }

    /// Import a subnet at `index` with caller-supplied key material.
    pub fn import_subnet(
        &mut self,
        node: &dyn NodeContext,
        requester: &ClientId,
        index: NetKeyIndex,
        key: KeyMaterial,
    ) -> Result<(), ManagerError> {
        authorize(node, requester)?;
        debug!(node = %node.id(), %index, "import subnet");
        self.store_new_subnet(index, key)
    }

    /// Begin (or re-confirm) a key refresh on the subnet at `index`.
    ///
    /// From phase `None` this generates new key material and advances to
    /// phase `One`; a repeated call in phase `One` is a successful no-op.
    /// Later phases mean the refresh is already transitioning over the air
    /// and the call fails `InProgress`.
    pub fn update_subnet(
        &mut self,
        node: &dyn NodeContext,
        requester: &ClientId,
        index: NetKeyIndex,
    ) -> Result<(), ManagerError> {
        authorize(node, requester)?;

        let mut record = self
            .store
            .net_key(index)
            .map_err(store_failed)?
            .ok_or(ManagerError::DoesNotExist("no such subnet"))?;

        match record.phase {
            KeyRefreshPhase::None => {
                record.new_key = KeyMaterial::random();
                record.phase = KeyRefreshPhase::One;
                self.store.put_net_key(record).map_err(store_failed)?;
                debug!(node = %node.id(), %index, "key refresh started");
                Ok(())
            }
            // Redundant calls while distributing are fine.
            KeyRefreshPhase::One => Ok(()),
            KeyRefreshPhase::Two | KeyRefreshPhase::Three => {
                Err(ManagerError::InProgress("key refresh in progress"))
            }
        }
    }

    /// Delete the subnet at `index`; deleting an absent subnet succeeds.
    pub fn delete_subnet(
        &mut self,
        node: &dyn NodeContext,
        requester: &ClientId,
        index: NetKeyIndex,
    ) -> Result<(), ManagerError> {
        authorize(node, requester)?;
        debug!(node = %node.id(), %index, "delete subnet");
        self.store.delete_net_key(index).map_err(store_failed)
    }

    /// Advance or cancel the key-refresh phase of the subnet at `index`.
    ///
    /// Phase `One` is only reachable through [`Self::update_subnet`] and is
    /// rejected here. Cancelling (target `None`) is only valid before the
    /// network has switched over (phase `Two`). Finalizing (target `Three`)
    /// promotes the new key, finalizes every bound app key, and resets the
    /// phase to `None`; a store failure leaves the phase untouched.
    pub fn set_key_phase(
        &mut self,
        node: &dyn NodeContext,
        requester: &ClientId,
        index: NetKeyIndex,
        target: KeyRefreshPhase,
    ) -> Result<(), ManagerError> {
        authorize(node, requester)?;
        if target == KeyRefreshPhase::One {
            return Err(ManagerError::InvalidArguments("bad phase"));
        }

        let mut record = self
            .store
            .net_key(index)
            .map_err(store_failed)?
            .ok_or(ManagerError::DoesNotExist("no such subnet"))?;

        // Cancelling is only possible while the old key still carries
        // traffic.
        if target == KeyRefreshPhase::None && record.phase >= KeyRefreshPhase::Two {
            return Err(ManagerError::InvalidArguments(
                "refresh has progressed past cancellation",
            ));
        }

        match target {
            KeyRefreshPhase::Three => {
                if record.phase == KeyRefreshPhase::None {
                    return Ok(());
                }
                // Bound app keys first: if their finalization fails, the
                // subnet record (and its phase) is still untouched.
                self.store.finalize_app_keys(index).map_err(store_failed)?;
                record.old_key = record.new_key.clone();
                record.phase = KeyRefreshPhase::None;
                self.store.put_net_key(record).map_err(store_failed)?;
                debug!(node = %node.id(), %index, "key refresh finalized");
                Ok(())
            }
            KeyRefreshPhase::None => {
                record.new_key = record.old_key.clone();
                record.phase = KeyRefreshPhase::None;
                self.store.put_net_key(record).map_err(store_failed)?;
                debug!(node = %node.id(), %index, "key refresh cancelled");
                Ok(())
            }
            KeyRefreshPhase::Two => {
                record.phase = KeyRefreshPhase::Two;
                self.store.put_net_key(record).map_err(store_failed)
            }
            KeyRefreshPhase::One => Err(ManagerError::InvalidArguments("bad phase")),
        }
    }

    fn store_new_subnet(&mut self, index: NetKeyIndex, key: KeyMaterial) -> Result<(), ManagerError> {
        if let Some(existing) = self.store.net_key(index).map_err(store_failed)? {
            // Redundant create with identical material is a retry, not a
            // conflict.
            if existing.old_key == key {
                return Ok(());
            }
            return Err(ManagerError::AlreadyExists("subnet exists"));
        }

        self.store
            .put_net_key(NetKeyRecord::fresh(index, key))
            .map_err(store_failed)
    }

    // ── Application keys ────────────────────────────────────────────────

    /// Create an app key at `app_index`, bound to `net_index`, with fresh
    /// key material.
    pub fn create_app_key(
        &mut self,
        node: &dyn NodeContext,
        requester: &ClientId,
        net_index: NetKeyIndex,
        app_index: AppKeyIndex,
    ) -> Result<(), ManagerError> {
        authorize(node, requester)?;
        debug!(node = %node.id(), %net_index, %app_index, "create app key");
        self.store_new_app_key(net_index, app_index, KeyMaterial::random())
    }

    /// Import an app key with caller-supplied material.
    pub fn import_app_key(
        &mut self,
        node: &dyn NodeContext,
        requester: &ClientId,
        net_index: NetKeyIndex,
        app_index: AppKeyIndex,
        key: KeyMaterial,
    ) -> Result<(), ManagerError> {
        authorize(node, requester)?;
        debug!(node = %node.id(), %net_index, %app_index, "import app key");
        self.store_new_app_key(net_index, app_index, key)
    }

    /// Generate new material for the app key at `app_index`.
    ///
    /// Only valid while the bound subnet is in refresh phase `One`; an
    /// app-key refresh rides inside its network's refresh window.
    pub fn update_app_key(
        &mut self,
        node: &dyn NodeContext,
        requester: &ClientId,
        app_index: AppKeyIndex,
    ) -> Result<(), ManagerError> {
        authorize(node, requester)?;

        let mut app = self
            .store
            .app_key(app_index)
            .map_err(store_failed)?
            .ok_or(ManagerError::DoesNotExist("no such app key"))?;
        let net = self
            .store
            .net_key(app.net_index)
            .map_err(store_failed)?
            .ok_or(ManagerError::DoesNotExist("bound net key not found"))?;

        if net.phase != KeyRefreshPhase::One {
            return Err(ManagerError::Failed("invalid phase"));
        }

        app.new_key = KeyMaterial::random();
        self.store.put_app_key(app).map_err(store_failed)?;
        debug!(node = %node.id(), %app_index, "app key refresh started");
        Ok(())
    }

    /// Delete the app key at `app_index`; deleting an absent key succeeds.
    pub fn delete_app_key(
        &mut self,
        node: &dyn NodeContext,
        requester: &ClientId,
        app_index: AppKeyIndex,
    ) -> Result<(), ManagerError> {
        authorize(node, requester)?;
        debug!(node = %node.id(), %app_index, "delete app key");
        self.store.delete_app_key(app_index).map_err(store_failed)
    }

    fn store_new_app_key(
        &mut self,
        net_index: NetKeyIndex,
        app_index: AppKeyIndex,
        key: KeyMaterial,
    ) -> Result<(), ManagerError> {
        if self.store.net_key(net_index).map_err(store_failed)?.is_none() {
            return Err(ManagerError::DoesNotExist("bound net key not found"));
        }

        if let Some(existing) = self.store.app_key(app_index).map_err(store_failed)? {
            if existing.old_key == key && existing.net_index == net_index {
                return Ok(());
            }
            return Err(ManagerError::AlreadyExists("app key exists"));
        }

        self.store
            .put_app_key(AppKeyRecord::fresh(app_index, net_index, key))
            .map_err(store_failed)
    }

    // ── Remote device keys ──────────────────────────────────────────────

    /// Record the device key of a node provisioned out-of-band.
    pub fn import_device_key(
        &mut self,
        node: &dyn NodeContext,
        requester: &ClientId,
        unicast: UnicastAddress,
        element_count: u8,
        key: KeyMaterial,
    ) -> Result<(), ManagerError> {
        authorize(node, requester)?;
        debug!(node = %node.id(), %unicast, element_count, "import device key");
        self.store
            .put_device_key(DeviceKeyRecord {
                unicast,
                element_count,
                key,
            })
            .map_err(store_failed)
    }

    /// Forget the device key of a remote node.
    ///
    /// The local device's own key cannot be removed this way.
    pub fn delete_device_key(
        &mut self,
        node: &dyn NodeContext,
        requester: &ClientId,
        unicast: UnicastAddress,
        element_count: u8,
    ) -> Result<(), ManagerError> {
        authorize(node, requester)?;
        if node.is_local_address(unicast, element_count) {
            return Err(ManagerError::InvalidArguments(
                "cannot remove local device key",
            ));
        }
        debug!(node = %node.id(), %unicast, element_count, "delete device key");
        self.store
            .delete_device_key(unicast, element_count)
            .map_err(store_failed)
    }

    // ── Export ──────────────────────────────────────────────────────────

    /// Snapshot every network and device key in the node's view.
    pub fn export_keys(
        &self,
        node: &dyn NodeContext,
        requester: &ClientId,
    ) -> Result<KeyExport, ManagerError> {
        authorize(node, requester)?;
        debug!(node = %node.id(), "export keys");
        self.store.export().map_err(store_failed)
    }
}
