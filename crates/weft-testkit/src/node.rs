//! A configurable `NodeContext` for tests.

use weft_core::{ClientId, NetKeyIndex, NodeContext, NodeId, UnicastAddress};

/// Test node; defaults to a provisioner with an agent, owner as given,
/// primary address `0x0001`, one element, primary subnet index.
#[derive(Debug, Clone)]
pub struct TestNode {
    id: NodeId,
    owner: ClientId,
    primary: Option<UnicastAddress>,
    net_index: NetKeyIndex,
    element_count: u8,
    agent: bool,
    provisioner: bool,
}

impl TestNode {
    /// A fully-capable provisioner node.
    #[must_use]
    pub fn new(id: u32, owner: &str) -> Self {
        Self {
            id: NodeId(id),
            owner: ClientId::new(owner),
            primary: UnicastAddress::new(0x0001),
            net_index: NetKeyIndex::PRIMARY,
            element_count: 1,
            agent: true,
            provisioner: true,
        }
    }

    /// Strip the provisioner role.
    #[must_use]
    pub fn without_provisioner_role(mut self) -> Self {
        self.provisioner = false;
        self
    }

    /// Detach the authentication agent.
    #[must_use]
    pub fn without_agent(mut self) -> Self {
        self.agent = false;
        self
    }

    /// Move the node's primary address.
    ///
    /// # Panics
    /// Panics when `addr` is not a unicast address.
    #[must_use]
    pub fn with_primary(mut self, addr: u16) -> Self {
        self.primary = Some(UnicastAddress::new(addr).expect("unicast address"));
        self
    }

    /// Change the node's own element count.
    #[must_use]
    pub fn with_element_count(mut self, count: u8) -> Self {
        self.element_count = count;
        self
    }
}

impl NodeContext for TestNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn owner(&self) -> &ClientId {
        &self.owner
    }

    fn primary_address(&self) -> Option<UnicastAddress> {
        self.primary
    }

    fn primary_net_index(&self) -> NetKeyIndex {
        self.net_index
    }

    fn has_agent(&self) -> bool {
        self.agent
    }

    fn is_provisioner(&self) -> bool {
        self.provisioner
    }

    fn is_local_address(&self, addr: UnicastAddress, count: u8) -> bool {
        let Some(primary) = self.primary else {
            return false;
        };
        let local_start = u32::from(primary.value());
        let local_end = local_start + u32::from(self.element_count);
        let start = u32::from(addr.value());
        let end = start + u32::from(count);
        start < local_end && local_start < end
    }
}
