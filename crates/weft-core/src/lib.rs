//! Core domain types for the weftmesh provisioner control plane.
//!
//! Everything here is plain data: mesh addresses, key indices, key material,
//! provisioning status codes, and the node abstraction the managers operate
//! against. No I/O, no protocol state.

#![forbid(unsafe_code)]

mod address;
mod device;
mod error;
mod index;
mod material;
mod node;
mod provisioning;

pub use address::UnicastAddress;
pub use device::DeviceUuid;
pub use error::ManagerError;
pub use index::{AppKeyIndex, MAX_KEY_INDEX, NetKeyIndex};
pub use material::KeyMaterial;
pub use node::{ClientId, NodeContext, NodeId};
pub use provisioning::{NppiMode, ProvStatus, TransportMode};
