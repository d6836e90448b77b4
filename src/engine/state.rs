//! Authoritative engine state and its serializable forms.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::order::{Order, OrderId};
use super::worker::{Worker, WorkerId};
use crate::scheduler::{PriorityQueue, TimerHandle};

/// Service timer currently armed for a worker.
#[derive(Debug, Clone)]
pub(crate) struct ArmedTimer {
    pub ticket: u64,
    pub order: OrderId,
    pub handle: TimerHandle,
}

/// Everything the engine owns. Only touched under the engine lock.
#[derive(Debug)]
pub(crate) struct EngineState {
    /// Every order ever created, in creation order.
    pub orders: Vec<Order>,
    /// Live workers, oldest first.
    pub workers: Vec<Worker>,
    pub next_sequence: u64,
    pub queue: PriorityQueue,
    pub service_timers: HashMap<WorkerId, ArmedTimer>,
    /// Settle and recovery callbacks, keyed by ticket.
    pub deferred: HashMap<u64, TimerHandle>,
}

impl EngineState {
    pub fn new() -> Self {
        Self {
            orders: Vec::new(),
            workers: Vec::new(),
            next_sequence: 1,
            queue: PriorityQueue::new(),
            service_timers: HashMap::new(),
            deferred: HashMap::new(),
        }
    }

    /// Rebuild from a snapshot. No timers are armed.
    ///
    /// Workers are renumbered `worker-1..=n` in pool order so the next
    /// `add_worker` id is free.
    pub fn from_snapshot(snapshot: EngineSnapshot) -> Self {
        let EngineSnapshot {
            mut orders,
            mut workers,
            next_sequence,
        } = snapshot;
        renumber_workers(&mut workers, &mut orders);

        let mut queue = PriorityQueue::new();
        for order in &orders {
            queue.insert(order.clone());
        }
        let floor = orders.iter().map(|o| o.sequence + 1).max().unwrap_or(1);
        Self {
            orders,
            workers,
            next_sequence: next_sequence.max(floor),
            queue,
            service_timers: HashMap::new(),
            deferred: HashMap::new(),
        }
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            orders: self.orders.clone(),
            workers: self.workers.clone(),
            next_sequence: self.next_sequence,
        }
    }

    pub fn order(&self, id: &OrderId) -> Option<&Order> {
        self.orders.iter().find(|o| &o.id == id)
    }

    pub fn worker(&self, id: &WorkerId) -> Option<&Worker> {
        self.workers.iter().find(|w| &w.id == id)
    }

    pub fn worker_mut(&mut self, id: &WorkerId) -> Option<&mut Worker> {
        self.workers.iter_mut().find(|w| &w.id == id)
    }

    /// Apply the same edit to the history record and its queue entry.
    pub fn update_order(&mut self, id: &OrderId, f: impl Fn(&mut Order)) -> bool {
        let found = match self.orders.iter_mut().find(|o| &o.id == id) {
            Some(order) => {
                f(order);
                true
            }
            None => false,
        };
        self.queue.update(id, &f);
        found
    }

    pub fn busy_workers(&self) -> usize {
        self.workers.iter().filter(|w| !w.is_idle()).count()
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            pending: self.queue.pending().cloned().collect(),
            processing: self.queue.processing().cloned().collect(),
            complete: self.queue.complete().cloned().collect(),
            workers: self.workers.clone(),
            total_orders: self.orders.len(),
            next_sequence: self.next_sequence,
        }
    }
}

/// Give workers contiguous ids in pool order; order bindings follow.
fn renumber_workers(workers: &mut [Worker], orders: &mut [Order]) {
    let renames: HashMap<WorkerId, WorkerId> = workers
        .iter_mut()
        .enumerate()
        .filter_map(|(i, worker)| {
            let id = WorkerId::new(i + 1);
            (worker.id != id).then(|| (std::mem::replace(&mut worker.id, id.clone()), id))
        })
        .collect();
    if renames.is_empty() {
        return;
    }

    warn!(renamed = renames.len(), "Restored worker ids were not contiguous");
    for order in orders.iter_mut() {
        if let Some(id) = order.assigned_worker.as_ref().and_then(|w| renames.get(w)) {
            order.assigned_worker = Some(id.clone());
        }
    }
}

/// Serializable copy of (orders, workers, next sequence).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub orders: Vec<Order>,
    pub workers: Vec<Worker>,
    pub next_sequence: u64,
}

impl Default for EngineSnapshot {
    fn default() -> Self {
        Self {
            orders: Vec::new(),
            workers: Vec::new(),
            next_sequence: 1,
        }
    }
}

/// Floor overview: every listing plus counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub pending: Vec<Order>,
    pub processing: Vec<Order>,
    pub complete: Vec<Order>,
    pub workers: Vec<Worker>,
    pub total_orders: usize,
    pub next_sequence: u64,
}

impl StatusReport {
    pub fn idle_workers(&self) -> usize {
        self.workers.iter().filter(|w| w.is_idle()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::PriorityClass;
    use chrono::Utc;

    #[test]
    fn new_state_matches_empty_snapshot() {
        assert_eq!(EngineState::new().snapshot(), EngineSnapshot::default());
    }

    #[test]
    fn update_order_touches_history_and_queue() {
        let mut state = EngineState::new();
        let order = Order::new(PriorityClass::Normal, 1, Utc::now());
        let id = order.id.clone();
        state.orders.push(order.clone());
        state.queue.insert(order);

        let worker = WorkerId::new(1);
        let at = Utc::now();
        assert!(state.update_order(&id, |o| o.bind(&worker, at)));
        assert_eq!(state.order(&id), state.queue.get(&id));
        assert_eq!(state.queue.processing().count(), 1);

        assert!(!state.update_order(&OrderId::new(PriorityClass::Vip, 9), |o| o.release(at)));
    }

    #[test]
    fn from_snapshot_rebuilds_queue_and_sequence_floor() {
        let now = Utc::now();
        let snapshot = EngineSnapshot {
            orders: vec![
                Order::new(PriorityClass::Normal, 1, now),
                Order::new(PriorityClass::Vip, 2, now),
            ],
            workers: Vec::new(),
            next_sequence: 1,
        };
        let state = EngineState::from_snapshot(snapshot);
        let pending: Vec<_> = state.queue.pending().map(|o| o.id.to_string()).collect();
        assert_eq!(pending, ["VIP-002", "NORMAL-001"]);
        assert_eq!(state.next_sequence, 3);
        assert!(state.service_timers.is_empty());
    }

    #[test]
    fn from_snapshot_renumbers_gapped_worker_ids() {
        let now = Utc::now();
        let mut order = Order::new(PriorityClass::Normal, 1, now);
        let mut busy = Worker::new(2, now);
        busy.bind(&order.id, now);
        order.bind(&busy.id, now);
        let snapshot = EngineSnapshot {
            orders: vec![order.clone()],
            workers: vec![busy, Worker::new(5, now)],
            next_sequence: 2,
        };

        let state = EngineState::from_snapshot(snapshot);
        let ids: Vec<_> = state.workers.iter().map(|w| w.id.to_string()).collect();
        assert_eq!(ids, ["worker-1", "worker-2"]);
        assert!(state.workers[0].holds(&order.id));
        let restored = state.order(&order.id).unwrap();
        assert_eq!(restored.assigned_worker, Some(WorkerId::new(1)));
        assert_eq!(state.queue.get(&order.id), Some(restored));
    }
}
