//! Recording fake of the client gateway.

use std::sync::Arc;

use parking_lot::Mutex;

use weft_core::{ClientId, ManagerError};
use weft_provisioner::{
    ClientGateway, ProvDataKind, ReplyBody, ReplyHandle, SessionId, Signal, WatchId,
};

/// Observable slot for a deferred reply.
///
/// `handle()` mints the `ReplyHandle` given to the managers; the test keeps
/// the slot and asserts on what (if anything) resolved it.
#[derive(Debug, Clone, Default)]
pub struct ReplySlot {
    inner: Arc<Mutex<Option<Result<ReplyBody, ManagerError>>>>,
}

impl ReplySlot {
    /// Fresh unresolved slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle that resolves into this slot.
    #[must_use]
    pub fn handle(&self) -> Box<dyn ReplyHandle> {
        Box::new(SlotReply {
            inner: self.inner.clone(),
        })
    }

    /// Whether the handle has been resolved.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.inner.lock().is_some()
    }

    /// The resolution, if any.
    #[must_use]
    pub fn result(&self) -> Option<Result<ReplyBody, ManagerError>> {
        self.inner.lock().clone()
    }
}

struct SlotReply {
    inner: Arc<Mutex<Option<Result<ReplyBody, ManagerError>>>>,
}

impl ReplyHandle for SlotReply {
    fn resolve(self: Box<Self>, result: Result<ReplyBody, ManagerError>) {
        *self.inner.lock() = Some(result);
    }
}

#[derive(Debug, Default)]
struct WatchState {
    next: u64,
    active: Vec<WatchId>,
}

/// A `ClientGateway` that records signals, nested requests, and watches.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    signals: Mutex<Vec<(ClientId, Signal)>>,
    prov_data_requests: Mutex<Vec<(ClientId, SessionId, ProvDataKind)>>,
    watches: Mutex<WatchState>,
}

impl RecordingGateway {
    /// Every signal sent, in order.
    #[must_use]
    pub fn signals(&self) -> Vec<(ClientId, Signal)> {
        self.signals.lock().clone()
    }

    /// Every nested provisioning-data request, in order.
    #[must_use]
    pub fn prov_data_requests(&self) -> Vec<(ClientId, SessionId, ProvDataKind)> {
        self.prov_data_requests.lock().clone()
    }

    /// Number of disconnect watches currently installed.
    #[must_use]
    pub fn active_watches(&self) -> usize {
        self.watches.lock().active.len()
    }
}

impl ClientGateway for RecordingGateway {
    fn send_signal(&self, client: &ClientId, signal: Signal) {
        self.signals.lock().push((client.clone(), signal));
    }

    fn request_prov_data(&self, client: &ClientId, session: SessionId, request: ProvDataKind) {
        self.prov_data_requests
            .lock()
            .push((client.clone(), session, request));
    }

    fn watch_disconnect(&self, _client: &ClientId) -> WatchId {
        let mut state = self.watches.lock();
        state.next += 1;
        let watch = WatchId(state.next);
        state.active.push(watch);
        watch
    }

    fn unwatch_disconnect(&self, watch: WatchId) {
        self.watches.lock().active.retain(|active| *active != watch);
    }
}
