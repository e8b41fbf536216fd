//! Recording fakes for the model sender, beacon IO, and timer service.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use weft_core::{NetKeyIndex, NodeId, UnicastAddress};
use weft_provisioner::{BeaconIo, ModelSender, ScanTimerKey, TimerHandle, Timers};

/// One model command captured by [`RecordingSender`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentCommand {
    /// Sending node.
    pub node: NodeId,
    /// Destination address.
    pub dst: UnicastAddress,
    /// Subnet the command went out on.
    pub net_index: NetKeyIndex,
    /// Raw access-layer payload.
    pub payload: Vec<u8>,
}

/// A `ModelSender` that captures outgoing commands.
#[derive(Debug, Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<SentCommand>>,
}

impl RecordingSender {
    /// Every command sent, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<SentCommand> {
        self.sent.lock().clone()
    }
}

impl ModelSender for RecordingSender {
    fn send_dev_command(
        &self,
        node: NodeId,
        dst: UnicastAddress,
        net_index: NetKeyIndex,
        payload: Vec<u8>,
    ) {
        self.sent.lock().push(SentCommand {
            node,
            dst,
            net_index,
            payload,
        });
    }
}

/// A `BeaconIo` tracking which nodes are registered.
#[derive(Debug, Default)]
pub struct FakeBeacon {
    registered: Mutex<HashSet<NodeId>>,
}

impl FakeBeacon {
    /// Whether beacon delivery is currently registered for `node`.
    #[must_use]
    pub fn is_registered(&self, node: NodeId) -> bool {
        self.registered.lock().contains(&node)
    }
}

impl BeaconIo for FakeBeacon {
    fn register_beacon(&self, node: NodeId) {
        self.registered.lock().insert(node);
    }

    fn deregister_beacon(&self, node: NodeId) {
        self.registered.lock().remove(&node);
    }
}

#[derive(Debug, Default)]
struct TimerState {
    next: u64,
    armed: HashMap<u64, (u16, ScanTimerKey)>,
    cancelled: u64,
}

/// A `Timers` service that never fires on its own; tests deliver expiry by
/// calling the scan manager's `handle_timeout` themselves.
#[derive(Debug, Default)]
pub struct ManualTimers {
    state: Mutex<TimerState>,
}

impl ManualTimers {
    /// Number of currently armed timers.
    #[must_use]
    pub fn armed_count(&self) -> usize {
        self.state.lock().armed.len()
    }

    /// Duration armed for `key`, if a timer is pending.
    #[must_use]
    pub fn armed_seconds(&self, key: ScanTimerKey) -> Option<u16> {
        self.state
            .lock()
            .armed
            .values()
            .find(|(_, armed)| *armed == key)
            .map(|(seconds, _)| *seconds)
    }

    /// Number of `cancel` calls observed.
    #[must_use]
    pub fn cancelled_count(&self) -> u64 {
        self.state.lock().cancelled
    }
}

impl Timers for ManualTimers {
    fn arm(&self, seconds: u16, key: ScanTimerKey) -> TimerHandle {
        let mut state = self.state.lock();
        state.next += 1;
        let handle = TimerHandle(state.next);
        state.armed.insert(handle.0, (seconds, key));
        handle
    }

    fn cancel(&self, handle: TimerHandle) {
        let mut state = self.state.lock();
        state.cancelled += 1;
        state.armed.remove(&handle.0);
    }
}
