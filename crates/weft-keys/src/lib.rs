//! Key store interface and key lifecycle management.
//!
//! The durable keyring lives outside this crate; [`KeyStore`] is the narrow
//! interface the control plane drives it through. [`KeyManager`] enforces the
//! key-rotation phase rules and the idempotent create/import/delete
//! semantics on top of it.

#![forbid(unsafe_code)]

mod manager;
mod records;
mod store;

pub use manager::KeyManager;
pub use records::{AppKeyRecord, DeviceKeyRecord, KeyExport, KeyRefreshPhase, NetKeyRecord};
pub use store::{KeyStore, StoreError};
