//! Radio- and timer-facing collaborator traits.

use weft_core::{NetKeyIndex, NodeId, UnicastAddress};

use crate::scan::ScanServer;

/// Sends access-layer model messages on behalf of a node.
///
/// The scan manager uses this for the Remote Provisioning scan start/stop
/// commands; framing, TTL, and device-key encryption toward `dst` are the
/// transport's concern.
pub trait ModelSender {
    /// Send a device-key-encrypted command from `node` to `dst` over the
    /// subnet at `net_index`.
    fn send_dev_command(
        &self,
        node: NodeId,
        dst: UnicastAddress,
        net_index: NetKeyIndex,
        payload: Vec<u8>,
    );
}

/// The local radio's unprovisioned-beacon receive path.
pub trait BeaconIo {
    /// Start delivering unprovisioned-device beacons for `node`.
    fn register_beacon(&self, node: NodeId);

    /// Stop beacon delivery for `node`. Must be called on every local
    /// scan-session teardown so no stale reports arrive afterwards.
    fn deregister_beacon(&self, node: NodeId);
}

/// Identifies an armed scan timeout back to the scan manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScanTimerKey {
    /// Node the scan session belongs to.
    pub node: NodeId,
    /// Server half of the session key.
    pub server: ScanServer,
}

/// Handle of an armed countdown timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

/// Countdown timer service.
///
/// Expiry is delivered by the surrounding event loop as a call to the scan
/// manager's `handle_timeout` with the armed [`ScanTimerKey`].
pub trait Timers {
    /// Arm a one-shot timer.
    fn arm(&self, seconds: u16, key: ScanTimerKey) -> TimerHandle;

    /// Disarm a timer; cancelling an already-fired handle is a no-op.
    fn cancel(&self, handle: TimerHandle);
}
