//! One-shot delayed callbacks.
//!
//! The engine never sleeps itself: it asks a [`TimerService`] to call back
//! later. Production uses [`TokioTimer`]; tests drive time through
//! [`ManualClock`](super::ManualClock).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

/// Work run when a timer fires.
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Opaque handle for cancelling a scheduled callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerHandle(pub u64);

/// Capability to run a callback once after a delay.
pub trait TimerService: Send + Sync {
    /// Schedule `callback` to run after `delay`.
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle;

    /// Cancel a scheduled callback. Unknown or already fired handles are ignored.
    fn cancel(&self, handle: TimerHandle);
}

/// Timer backed by tokio tasks, one per scheduled callback.
pub struct TokioTimer {
    runtime: Handle,
    next_id: AtomicU64,
    live: Arc<Mutex<HashMap<TimerHandle, CancellationToken>>>,
}

impl TokioTimer {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            next_id: AtomicU64::new(1),
            live: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Bind to the runtime of the calling task.
    ///
    /// Panics when called outside a tokio runtime, like `tokio::spawn`.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Number of timers that have neither fired nor been cancelled.
    pub fn pending(&self) -> usize {
        self.live.lock().len()
    }
}

impl TimerService for TokioTimer {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let handle = TimerHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        let token = CancellationToken::new();
        self.live.lock().insert(handle, token.clone());

        let live = Arc::clone(&self.live);
        self.runtime.spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    // Cancelled between wake-up and here: drop the callback.
                    let armed = live.lock().remove(&handle).is_some();
                    if armed {
                        callback();
                    }
                }
            }
        });
        handle
    }

    fn cancel(&self, handle: TimerHandle) {
        if let Some(token) = self.live.lock().remove(&handle) {
            token.cancel();
        }
    }
}
