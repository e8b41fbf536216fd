//! The narrow interface to the durable keyring.

use thiserror::Error;

use weft_core::{AppKeyIndex, NetKeyIndex, UnicastAddress};

use crate::records::{AppKeyRecord, DeviceKeyRecord, KeyExport, NetKeyRecord};

/// Failure inside the keyring backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be read.
    #[error("keyring read failed: {0}")]
    Read(&'static str),

    /// The backend rejected or failed a mutation.
    #[error("keyring write failed: {0}")]
    Write(&'static str),
}

/// Durable storage for network, application, and remote device keys.
///
/// The store holds the authoritative records; the control plane only reads
/// and mutates through this interface, one call at a time, and re-reads
/// after every callback boundary instead of caching records.
///
/// Mutations are atomic from the caller's perspective: a failed put/delete
/// leaves the prior record intact.
pub trait KeyStore {
    /// Look up a network key by index.
    fn net_key(&self, index: NetKeyIndex) -> Result<Option<NetKeyRecord>, StoreError>;

    /// Insert or replace a network key record.
    fn put_net_key(&mut self, record: NetKeyRecord) -> Result<(), StoreError>;

    /// Remove a network key; removing an absent index is not an error.
    fn delete_net_key(&mut self, index: NetKeyIndex) -> Result<(), StoreError>;

    /// Look up an application key by index.
    fn app_key(&self, index: AppKeyIndex) -> Result<Option<AppKeyRecord>, StoreError>;

    /// Insert or replace an application key record.
    fn put_app_key(&mut self, record: AppKeyRecord) -> Result<(), StoreError>;

    /// Remove an application key; removing an absent index is not an error.
    fn delete_app_key(&mut self, index: AppKeyIndex) -> Result<(), StoreError>;

    /// Promote `new_key` into `old_key` for every app key bound to
    /// `net_index`, completing a key refresh.
    fn finalize_app_keys(&mut self, net_index: NetKeyIndex) -> Result<(), StoreError>;

    /// Insert or replace a remote device key record.
    fn put_device_key(&mut self, record: DeviceKeyRecord) -> Result<(), StoreError>;

    /// Remove the device key covering exactly `unicast` with `count`
    /// elements.
    fn delete_device_key(&mut self, unicast: UnicastAddress, count: u8) -> Result<(), StoreError>;

    /// Remove every device key recorded at `unicast`, regardless of element
    /// count. Used when a re-provision moves a device to a new address.
    fn delete_device_key_all(&mut self, unicast: UnicastAddress) -> Result<(), StoreError>;

    /// Snapshot all network and device key records.
    fn export(&self) -> Result<KeyExport, StoreError>;
}
