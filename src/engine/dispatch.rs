//! The dispatch engine.
//!
//! One mutex guards all order and worker state. Every public operation and
//! every timer callback takes it once, runs to completion, then releases it
//! and hands queued events to the observer hub.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::config::DispatchConfig;
use super::error::DispatchError;
use super::observer::{EngineEvent, ObserverHub, SubscriptionId};
use super::order::{Order, OrderId, OrderStatus};
use super::state::{ArmedTimer, EngineSnapshot, EngineState, StatusReport};
use super::worker::{Worker, WorkerId};
use crate::scheduler::{Clock, PriorityClass, SystemClock, TimerService, TokioTimer};

/// Work deferred through the timer service other than service completion.
#[derive(Debug, Clone, Copy)]
enum Deferred {
    Settle,
    Recovery,
}

pub(super) struct Inner {
    pub(super) state: Mutex<EngineState>,
    pub(super) config: DispatchConfig,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) observers: ObserverHub,
    timers: Arc<dyn TimerService>,
    // Never reset, so a callback armed before `reset` can't match a later ticket.
    tickets: AtomicU64,
    me: Weak<Inner>,
}

/// Shared handle to one engine. Clones refer to the same state.
#[derive(Clone)]
pub struct DispatchEngine {
    pub(super) inner: Arc<Inner>,
}

impl DispatchEngine {
    pub fn new(config: DispatchConfig, timers: Arc<dyn TimerService>, clock: Arc<dyn Clock>) -> Self {
        Self::with_state(config, timers, clock, EngineState::new())
    }

    /// Engine on the current tokio runtime with the system clock.
    ///
    /// Panics when called outside a tokio runtime.
    pub fn on_current_runtime(config: DispatchConfig) -> Self {
        Self::new(config, Arc::new(TokioTimer::current()), Arc::new(SystemClock))
    }

    /// Rebuild an engine from state that survived a restart.
    ///
    /// No timers are armed; call [`start`](Self::start) or
    /// [`recover_stuck_orders`](Self::recover_stuck_orders) to repair them.
    pub fn restore(
        config: DispatchConfig,
        timers: Arc<dyn TimerService>,
        clock: Arc<dyn Clock>,
        snapshot: EngineSnapshot,
    ) -> Self {
        info!(
            orders = snapshot.orders.len(),
            workers = snapshot.workers.len(),
            "Restoring engine state"
        );
        Self::with_state(config, timers, clock, EngineState::from_snapshot(snapshot))
    }

    fn with_state(
        config: DispatchConfig,
        timers: Arc<dyn TimerService>,
        clock: Arc<dyn Clock>,
        state: EngineState,
    ) -> Self {
        let inner = Arc::new_cyclic(|me| Inner {
            state: Mutex::new(state),
            config,
            clock,
            observers: ObserverHub::new(),
            timers,
            tickets: AtomicU64::new(1),
            me: me.clone(),
        });
        Self { inner }
    }

    /// Schedule the one-shot recovery pass after `recovery_delay`.
    pub fn start(&self) {
        let mut state = self.inner.state.lock();
        self.inner
            .defer(&mut state, self.inner.config.recovery_delay, Deferred::Recovery);
        debug!(delay_ms = self.inner.config.recovery_delay.as_millis() as u64, "Recovery pass scheduled");
    }

    pub fn config(&self) -> DispatchConfig {
        self.inner.config
    }

    /// Create a PENDING order and try to assign it.
    ///
    /// Returns the order as it stands after the assignment pass.
    pub fn create_order(&self, class: PriorityClass) -> Order {
        let order = {
            let mut state = self.inner.state.lock();
            let now = self.inner.clock.now();
            let sequence = state.next_sequence;
            state.next_sequence += 1;

            let order = Order::new(class, sequence, now);
            state.orders.push(order.clone());
            state.queue.insert(order.clone());
            counter!("floor_orders_created_total", "class" => class.tag()).increment(1);
            info!(order = %order.id, "Order created");
            self.inner.observers.enqueue(EngineEvent::OrderCreated {
                order: order.clone(),
            });

            self.inner.try_assign(&mut state);
            self.inner.record_gauges(&state);
            state.order(&order.id).cloned().unwrap_or(order)
        };
        self.inner.observers.flush();
        order
    }

    /// Add an IDLE worker named after the new pool size.
    pub fn add_worker(&self) -> Worker {
        let worker = {
            let mut state = self.inner.state.lock();
            let worker = Worker::new(state.workers.len() + 1, self.inner.clock.now());
            state.workers.push(worker.clone());
            info!(worker = %worker.id, "Worker added");
            self.inner.observers.enqueue(EngineEvent::WorkerAdded {
                worker: worker.clone(),
            });

            self.inner.try_assign(&mut state);
            self.inner.record_gauges(&state);
            state.worker(&worker.id).cloned().unwrap_or(worker)
        };
        self.inner.observers.flush();
        worker
    }

    /// Remove the newest worker.
    ///
    /// An order it held goes back to PENDING at its class position and its
    /// timer is cancelled. Returns the worker as it was when removed.
    pub fn remove_worker(&self) -> Result<Worker, DispatchError> {
        let worker = {
            let mut state = self.inner.state.lock();
            let Some(worker) = state.workers.pop() else {
                debug!("Remove requested with no workers");
                return Err(DispatchError::EmptyPool);
            };
            if let Some(armed) = state.service_timers.remove(&worker.id) {
                self.inner.timers.cancel(armed.handle);
            }

            let requeued = worker.current_order.clone().filter(|id| {
                state
                    .order(id)
                    .is_some_and(|o| o.is_processing() && o.assigned_worker.as_ref() == Some(&worker.id))
            });
            if let Some(order_id) = &requeued {
                self.inner.requeue(&mut state, order_id, self.inner.clock.now());
            }
            info!(worker = %worker.id, requeued = ?requeued.as_ref().map(OrderId::as_str), "Worker removed");
            self.inner.observers.enqueue(EngineEvent::WorkerRemoved {
                worker: worker.clone(),
                requeued,
            });

            self.inner.try_assign(&mut state);
            self.inner.record_gauges(&state);
            worker
        };
        self.inner.observers.flush();
        Ok(worker)
    }

    /// Cancel every timer and return to the initial empty state.
    ///
    /// Subscribers stay registered and receive [`EngineEvent::Reset`].
    pub fn reset(&self) {
        {
            let mut state = self.inner.state.lock();
            for (_, armed) in state.service_timers.drain() {
                self.inner.timers.cancel(armed.handle);
            }
            for (_, handle) in state.deferred.drain() {
                self.inner.timers.cancel(handle);
            }
            *state = EngineState::new();
            info!("Engine reset");
            self.inner.observers.enqueue(EngineEvent::Reset);
            self.inner.record_gauges(&state);
        }
        self.inner.observers.flush();
    }

    /// PENDING orders in assignment order.
    pub fn pending_orders(&self) -> Vec<Order> {
        self.inner.state.lock().queue.pending().cloned().collect()
    }

    pub fn processing_orders(&self) -> Vec<Order> {
        self.inner.state.lock().queue.processing().cloned().collect()
    }

    pub fn complete_orders(&self) -> Vec<Order> {
        self.inner.state.lock().queue.complete().cloned().collect()
    }

    /// Live workers, oldest first.
    pub fn workers(&self) -> Vec<Worker> {
        self.inner.state.lock().workers.clone()
    }

    pub fn order(&self, id: &OrderId) -> Option<Order> {
        self.inner.state.lock().order(id).cloned()
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        self.inner.state.lock().snapshot()
    }

    pub fn status(&self) -> StatusReport {
        self.inner.state.lock().status()
    }

    /// Register a synchronous listener. It may call back into the engine.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        self.inner.observers.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.observers.unsubscribe(id)
    }

    /// Async stream of events for consumers that can't block the engine.
    pub fn events(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.observers.stream()
    }
}

impl Inner {
    fn next_ticket(&self) -> u64 {
        self.tickets.fetch_add(1, Ordering::Relaxed)
    }

    /// Pair idle workers (pool order) with pending orders (queue order).
    pub(super) fn try_assign(&self, state: &mut EngineState) {
        let idle: Vec<WorkerId> = state
            .workers
            .iter()
            .filter(|w| w.is_idle())
            .map(|w| w.id.clone())
            .collect();
        if idle.is_empty() {
            return;
        }
        let pending: Vec<OrderId> = state.queue.pending().map(|o| o.id.clone()).collect();
        for (worker_id, order_id) in idle.iter().zip(&pending) {
            self.assign(state, worker_id, order_id);
        }
    }

    fn assign(&self, state: &mut EngineState, worker_id: &WorkerId, order_id: &OrderId) {
        let now = self.clock.now();
        let Some(worker) = state.worker_mut(worker_id) else {
            return;
        };
        worker.bind(order_id, now);
        state.update_order(order_id, |o| o.bind(worker_id, now));
        self.arm_service(state, worker_id, order_id, self.config.service_duration);

        debug!(order = %order_id, worker = %worker_id, "Order assigned");
        self.observers.enqueue(EngineEvent::OrderAssigned {
            order: order_id.clone(),
            worker: worker_id.clone(),
        });
    }

    /// Arm (or re-arm) the worker's service timer.
    pub(super) fn arm_service(
        &self,
        state: &mut EngineState,
        worker_id: &WorkerId,
        order_id: &OrderId,
        delay: Duration,
    ) {
        if let Some(previous) = state.service_timers.remove(worker_id) {
            self.timers.cancel(previous.handle);
        }
        let ticket = self.next_ticket();
        let me = self.me.clone();
        let (worker, order) = (worker_id.clone(), order_id.clone());
        let handle = self.timers.schedule(
            delay,
            Box::new(move || {
                if let Some(inner) = me.upgrade() {
                    inner.on_service_elapsed(ticket, &worker, &order);
                }
            }),
        );
        state.service_timers.insert(
            worker_id.clone(),
            ArmedTimer {
                ticket,
                order: order_id.clone(),
                handle,
            },
        );
    }

    pub(super) fn disarm_service(&self, state: &mut EngineState, worker_id: &WorkerId) {
        if let Some(armed) = state.service_timers.remove(worker_id) {
            self.timers.cancel(armed.handle);
        }
    }

    fn on_service_elapsed(&self, ticket: u64, worker_id: &WorkerId, order_id: &OrderId) {
        {
            let mut state = self.state.lock();
            let armed = state
                .service_timers
                .get(worker_id)
                .is_some_and(|t| t.ticket == ticket && &t.order == order_id);
            if !armed {
                debug!(order = %order_id, worker = %worker_id, ticket, "Ignoring stale service timer");
                return;
            }
            state.service_timers.remove(worker_id);
            self.complete_locked(&mut state, worker_id, order_id);
            self.record_gauges(&state);
        }
        self.observers.flush();
    }

    /// Complete `order_id` on `worker_id` if that pairing still holds.
    pub(super) fn complete_locked(
        &self,
        state: &mut EngineState,
        worker_id: &WorkerId,
        order_id: &OrderId,
    ) -> bool {
        let paired = state
            .order(order_id)
            .is_some_and(|o| o.is_processing() && o.assigned_worker.as_ref() == Some(worker_id))
            && state.worker(worker_id).is_some_and(|w| w.holds(order_id));
        if !paired {
            debug!(order = %order_id, worker = %worker_id, "Completion no longer applies");
            return false;
        }

        let now = self.clock.now();
        if let Some(worker) = state.worker_mut(worker_id) {
            worker.release();
        }
        state.update_order(order_id, |o| o.set_status(OrderStatus::Complete, now));
        self.disarm_service(state, worker_id);

        counter!("floor_orders_completed_total").increment(1);
        info!(order = %order_id, worker = %worker_id, "Order complete");
        self.observers.enqueue(EngineEvent::OrderCompleted {
            order: order_id.clone(),
            worker: worker_id.clone(),
        });

        self.schedule_settle(state);
        true
    }

    /// Put a PROCESSING order back to PENDING at its class position.
    ///
    /// The order re-enters at its original sequence slot within its class,
    /// ahead of younger orders of the same class, never at the class tail.
    pub(super) fn requeue(&self, state: &mut EngineState, order_id: &OrderId, at: DateTime<Utc>) {
        state.update_order(order_id, |o| o.release(at));
        if let Some(entry) = state.queue.remove(order_id) {
            state.queue.insert(entry);
        }
        counter!("floor_orders_requeued_total").increment(1);
    }

    fn schedule_settle(&self, state: &mut EngineState) {
        if self.config.settle_delay.is_zero() {
            self.try_assign(state);
        } else {
            self.defer(state, self.config.settle_delay, Deferred::Settle);
        }
    }

    fn defer(&self, state: &mut EngineState, delay: Duration, kind: Deferred) {
        let ticket = self.next_ticket();
        let me = self.me.clone();
        let handle = self.timers.schedule(
            delay,
            Box::new(move || {
                if let Some(inner) = me.upgrade() {
                    inner.on_deferred(ticket, kind);
                }
            }),
        );
        state.deferred.insert(ticket, handle);
    }

    fn on_deferred(&self, ticket: u64, kind: Deferred) {
        {
            let mut state = self.state.lock();
            if state.deferred.remove(&ticket).is_none() {
                debug!(ticket, ?kind, "Ignoring cancelled deferred callback");
                return;
            }
            match kind {
                Deferred::Settle => self.try_assign(&mut state),
                Deferred::Recovery => {
                    self.recover_locked(&mut state);
                }
            }
            self.record_gauges(&state);
        }
        self.observers.flush();
    }

    pub(super) fn record_gauges(&self, state: &EngineState) {
        gauge!("floor_pending_orders").set(state.queue.pending().count() as f64);
        gauge!("floor_busy_workers").set(state.busy_workers() as f64);
        gauge!("floor_workers").set(state.workers.len() as f64);
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
