//! In-memory key store with an operation log and failure injection.

use std::collections::BTreeMap;

use weft_core::{AppKeyIndex, NetKeyIndex, UnicastAddress};
use weft_keys::{AppKeyRecord, DeviceKeyRecord, KeyExport, KeyStore, NetKeyRecord, StoreError};

/// One recorded store mutation, for ordering assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    PutNetKey(u16),
    DeleteNetKey(u16),
    PutAppKey(u16),
    DeleteAppKey(u16),
    FinalizeAppKeys(u16),
    PutDeviceKey(u16),
    DeleteDeviceKey(u16, u8),
    DeleteDeviceKeyAll(u16),
}

/// A `KeyStore` backed by maps, recording every mutation.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    net: BTreeMap<u16, NetKeyRecord>,
    app: BTreeMap<u16, AppKeyRecord>,
    device: Vec<DeviceKeyRecord>,
    ops: Vec<StoreOp>,
    fail_net_puts: bool,
    fail_app_puts: bool,
    fail_device_puts: bool,
    fail_finalize: bool,
}

impl MemoryKeyStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent network-key puts fail.
    pub fn fail_net_puts(&mut self, fail: bool) {
        self.fail_net_puts = fail;
    }

    /// Make subsequent app-key puts fail.
    pub fn fail_app_puts(&mut self, fail: bool) {
        self.fail_app_puts = fail;
    }

    /// Make subsequent device-key puts fail.
    pub fn fail_device_puts(&mut self, fail: bool) {
        self.fail_device_puts = fail;
    }

    /// Make app-key finalization fail.
    pub fn fail_finalize(&mut self, fail: bool) {
        self.fail_finalize = fail;
    }

    /// Every mutation recorded so far, in order.
    #[must_use]
    pub fn ops(&self) -> &[StoreOp] {
        &self.ops
    }

    /// Direct view of a stored network key.
    #[must_use]
    pub fn net_record(&self, index: NetKeyIndex) -> Option<&NetKeyRecord> {
        self.net.get(&index.value())
    }

    /// Direct view of a stored app key.
    #[must_use]
    pub fn app_record(&self, index: AppKeyIndex) -> Option<&AppKeyRecord> {
        self.app.get(&index.value())
    }

    /// Direct view of the stored device keys.
    #[must_use]
    pub fn device_records(&self) -> &[DeviceKeyRecord] {
        &self.device
    }
}

impl KeyStore for MemoryKeyStore {
    fn net_key(&self, index: NetKeyIndex) -> Result<Option<NetKeyRecord>, StoreError> {
        Ok(self.net.get(&index.value()).cloned())
    }

    fn put_net_key(&mut self, record: NetKeyRecord) -> Result<(), StoreError> {
        if self.fail_net_puts {
            return Err(StoreError::Write("injected net-key failure"));
        }
        self.ops.push(StoreOp::PutNetKey(record.index.value()));
        self.net.insert(record.index.value(), record);
        Ok(())
    }

    fn delete_net_key(&mut self, index: NetKeyIndex) -> Result<(), StoreError> {
        self.ops.push(StoreOp::DeleteNetKey(index.value()));
        self.net.remove(&index.value());
        Ok(())
    }

    fn app_key(&self, index: AppKeyIndex) -> Result<Option<AppKeyRecord>, StoreError> {
        Ok(self.app.get(&index.value()).cloned())
    }

    fn put_app_key(&mut self, record: AppKeyRecord) -> Result<(), StoreError> {
        if self.fail_app_puts {
            return Err(StoreError::Write("injected app-key failure"));
        }
        self.ops.push(StoreOp::PutAppKey(record.index.value()));
        self.app.insert(record.index.value(), record);
        Ok(())
    }

    fn delete_app_key(&mut self, index: AppKeyIndex) -> Result<(), StoreError> {
        self.ops.push(StoreOp::DeleteAppKey(index.value()));
        self.app.remove(&index.value());
        Ok(())
    }

    fn finalize_app_keys(&mut self, net_index: NetKeyIndex) -> Result<(), StoreError> {
        if self.fail_finalize {
            return Err(StoreError::Write("injected finalize failure"));
        }
        self.ops.push(StoreOp::FinalizeAppKeys(net_index.value()));
        for record in self.app.values_mut() {
            if record.net_index == net_index {
                record.old_key = record.new_key.clone();
            }
        }
        Ok(())
    }

    fn put_device_key(&mut self, record: DeviceKeyRecord) -> Result<(), StoreError> {
        if self.fail_device_puts {
            return Err(StoreError::Write("injected device-key failure"));
        }
        self.ops.push(StoreOp::PutDeviceKey(record.unicast.value()));
        self.device.retain(|existing| {
            existing.unicast != record.unicast || existing.element_count != record.element_count
        });
        self.device.push(record);
        Ok(())
    }

    fn delete_device_key(&mut self, unicast: UnicastAddress, count: u8) -> Result<(), StoreError> {
        self.ops.push(StoreOp::DeleteDeviceKey(unicast.value(), count));
        self.device
            .retain(|existing| existing.unicast != unicast || existing.element_count != count);
        Ok(())
    }

    fn delete_device_key_all(&mut self, unicast: UnicastAddress) -> Result<(), StoreError> {
        self.ops.push(StoreOp::DeleteDeviceKeyAll(unicast.value()));
        self.device.retain(|existing| existing.unicast != unicast);
        Ok(())
    }

    fn export(&self) -> Result<KeyExport, StoreError> {
        Ok(KeyExport {
            net_keys: self.net.values().cloned().collect(),
            device_keys: self.device.clone(),
        })
    }
}
