//! State-change notifications.
//!
//! Listeners are called synchronously, in subscription order, once per event.
//! Events are queued while the engine lock is held and delivered after it is
//! released, so a listener may call straight back into the engine. Whoever
//! holds the drain lock delivers everything queued, which keeps delivery in
//! commit order across threads.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::order::{Order, OrderId};
use super::worker::{Worker, WorkerId};

/// Broadcast buffer for async subscribers.
const STREAM_CAPACITY: usize = 1024;

/// Something that changed on the floor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineEvent {
    OrderCreated { order: Order },
    WorkerAdded { worker: Worker },
    WorkerRemoved {
        worker: Worker,
        requeued: Option<OrderId>,
    },
    OrderAssigned { order: OrderId, worker: WorkerId },
    OrderCompleted { order: OrderId, worker: WorkerId },
    /// An order put back to PENDING by recovery.
    OrderRequeued { order: OrderId },
    Reset,
}

/// Handle returned by [`ObserverHub::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

pub type Listener = Arc<dyn Fn(&EngineEvent) + Send + Sync>;

pub struct ObserverHub {
    listeners: Mutex<BTreeMap<SubscriptionId, Listener>>,
    next_id: AtomicU64,
    outbox: Mutex<VecDeque<EngineEvent>>,
    draining: Mutex<()>,
    sender: broadcast::Sender<EngineEvent>,
}

impl ObserverHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(STREAM_CAPACITY);
        Self {
            listeners: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            outbox: Mutex::new(VecDeque::new()),
            draining: Mutex::new(()),
            sender,
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().insert(id, Arc::new(listener));
        id
    }

    /// Returns false if the id was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.lock().remove(&id).is_some()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Async stream of every event delivered from now on.
    ///
    /// Slow receivers observe `RecvError::Lagged` once the buffer wraps.
    pub fn stream(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Queue an event for delivery. Call with the engine lock held.
    pub(crate) fn enqueue(&self, event: EngineEvent) {
        self.outbox.lock().push_back(event);
    }

    /// Deliver queued events. Call with the engine lock released.
    pub(crate) fn flush(&self) {
        loop {
            let Some(guard) = self.draining.try_lock() else {
                // Another caller (or an outer frame of this one) is delivering.
                return;
            };
            loop {
                let next = self.outbox.lock().pop_front();
                let Some(event) = next else { break };
                let listeners: Vec<Listener> = self.listeners.lock().values().cloned().collect();
                for listener in &listeners {
                    listener(&event);
                }
                // Zero receivers is not an error.
                let _ = self.sender.send(event);
            }
            drop(guard);
            if self.outbox.lock().is_empty() {
                return;
            }
        }
    }
}

impl Default for ObserverHub {
    fn default() -> Self {
        Self::new()
    }
}
