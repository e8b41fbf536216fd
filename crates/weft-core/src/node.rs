//! The local node the control plane operates against.
//!
//! Nodes are owned elsewhere in the daemon; the managers only ever hold a
//! borrowed [`NodeContext`] for the duration of one entry point, plus the
//! cheap [`NodeId`] for registry keys.

use std::fmt;
use std::sync::Arc;

use crate::UnicastAddress;
use crate::index::NetKeyIndex;

/// Identity of a node registered with the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Identity of the client that attached a node, as reported by the RPC
/// transport (e.g. a bus unique name).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(Arc<str>);

impl ClientId {
    /// Wrap a transport-level sender identity.
    #[must_use]
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// The identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read-only view of a local node, as the managers need it.
///
/// The core never owns a node; every operation is handed a borrowed context
/// by the dispatch layer and must not retain it past the call.
pub trait NodeContext {
    /// Registry identity of this node.
    fn id(&self) -> NodeId;

    /// Identity of the client that owns (attached) this node.
    fn owner(&self) -> &ClientId;

    /// Primary unicast address of the node's first element.
    fn primary_address(&self) -> Option<UnicastAddress>;

    /// Index of the node's primary subnet.
    fn primary_net_index(&self) -> NetKeyIndex;

    /// Whether an authentication agent is attached.
    fn has_agent(&self) -> bool;

    /// Whether the node holds the provisioner role.
    fn is_provisioner(&self) -> bool;

    /// Whether `addr..addr + count` overlaps this node's own elements.
    fn is_local_address(&self, addr: UnicastAddress, count: u8) -> bool;
}
