//! Tokio-backed implementation of the scan timer service.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use weft_provisioner::{ScanTimerKey, TimerHandle, Timers};

/// One-shot countdown timers on the tokio runtime.
///
/// Expirations are funneled into a channel rather than fired as callbacks:
/// the daemon's event loop drains the receiver and calls the dispatcher's
/// `scan_timeout`, keeping all manager state on one logical thread of
/// control. `arm` must run inside a tokio runtime.
pub struct TokioTimers {
    expired: mpsc::UnboundedSender<ScanTimerKey>,
    tasks: Mutex<HashMap<u64, JoinHandle<()>>>,
    next: AtomicU64,
}

impl TokioTimers {
    /// Create the service plus the receiver of expired timer keys.
    #[must_use]
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ScanTimerKey>) {
        let (expired, receiver) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                expired,
                tasks: Mutex::new(HashMap::new()),
                next: AtomicU64::new(0),
            }),
            receiver,
        )
    }
}

impl Timers for TokioTimers {
    fn arm(&self, seconds: u16, key: ScanTimerKey) -> TimerHandle {
        let id = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        let expired = self.expired.clone();
        let task = tokio::spawn(async move {
            sleep(Duration::from_secs(u64::from(seconds))).await;
            let _ = expired.send(key);
        });

        let mut tasks = self.tasks.lock();
        tasks.retain(|_, task| !task.is_finished());
        tasks.insert(id, task);
        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        if let Some(task) = self.tasks.lock().remove(&handle.0) {
            task.abort();
        }
    }
}
