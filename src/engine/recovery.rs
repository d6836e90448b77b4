//! Restart reconciliation.
//!
//! Order and worker records may survive a restart while their timers do not.
//! The recovery pass re-derives timer state from timestamps: overdue orders
//! complete now, the rest are re-armed for what remains of their service time.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::dispatch::{DispatchEngine, Inner};
use super::observer::EngineEvent;
use super::order::OrderId;
use super::state::EngineState;
use super::worker::WorkerId;
use crate::scheduler::elapsed_between;

/// What one recovery pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryReport {
    /// Overdue orders completed on the spot.
    pub completed: Vec<OrderId>,
    /// Orders whose service timer was re-armed for the remaining time.
    pub rearmed: Vec<OrderId>,
    /// PROCESSING orders with no worker holding them, put back to PENDING.
    pub requeued: Vec<OrderId>,
    /// Workers marked PROCESSING without a matching order, set back to IDLE.
    pub released_workers: Vec<WorkerId>,
}

impl RecoveryReport {
    /// True if nothing needed repair.
    pub fn is_clean(&self) -> bool {
        self.completed.is_empty()
            && self.rearmed.is_empty()
            && self.requeued.is_empty()
            && self.released_workers.is_empty()
    }
}

impl DispatchEngine {
    /// Repair timers and derived status for every PROCESSING order.
    ///
    /// [`start`](Self::start) runs this once after the recovery delay; it is
    /// safe to call again at any time.
    pub fn recover_stuck_orders(&self) -> RecoveryReport {
        let report = {
            let mut state = self.inner.state.lock();
            let report = self.inner.recover_locked(&mut state);
            self.inner.record_gauges(&state);
            report
        };
        self.inner.observers.flush();
        report
    }
}

impl Inner {
    pub(super) fn recover_locked(&self, state: &mut EngineState) -> RecoveryReport {
        let now = self.clock.now();
        let threshold = self.config.stuck_threshold();
        let mut report = RecoveryReport::default();

        let processing: Vec<_> = state
            .queue
            .processing()
            .map(|o| (o.id.clone(), o.assigned_worker.clone(), o.processing_started_at))
            .collect();

        for (order_id, assigned, started_at) in processing {
            let holder = assigned.filter(|w| state.worker(w).is_some_and(|w| w.holds(&order_id)));
            let Some(worker_id) = holder else {
                warn!(order = %order_id, "Requeueing order with no worker holding it");
                self.requeue(state, &order_id, now);
                self.observers.enqueue(EngineEvent::OrderRequeued {
                    order: order_id.clone(),
                });
                report.requeued.push(order_id);
                continue;
            };

            // Missing start time means the age is unknown: treat as overdue.
            let elapsed = started_at.map_or(Duration::MAX, |at| elapsed_between(at, now));
            if elapsed > threshold {
                info!(order = %order_id, elapsed_ms = elapsed.as_millis() as u64, "Completing stuck order");
                self.disarm_service(state, &worker_id);
                if self.complete_locked(state, &worker_id, &order_id) {
                    report.completed.push(order_id);
                }
            } else {
                let remaining = self.config.service_duration.saturating_sub(elapsed);
                info!(order = %order_id, remaining_ms = remaining.as_millis() as u64, "Re-arming service timer");
                self.arm_service(state, &worker_id, &order_id, remaining);
                report.rearmed.push(order_id);
            }
        }

        let stray: Vec<WorkerId> = state
            .workers
            .iter()
            .filter(|w| !w.is_idle())
            .filter(|w| {
                !w.current_order.as_ref().is_some_and(|id| {
                    state
                        .order(id)
                        .is_some_and(|o| o.is_processing() && o.assigned_worker.as_ref() == Some(&w.id))
                })
            })
            .map(|w| w.id.clone())
            .collect();
        for worker_id in stray {
            warn!(worker = %worker_id, "Releasing worker with no matching order");
            self.disarm_service(state, &worker_id);
            if let Some(worker) = state.worker_mut(&worker_id) {
                worker.release();
            }
            report.released_workers.push(worker_id);
        }

        self.try_assign(state);
        if !report.is_clean() {
            info!(
                completed = report.completed.len(),
                rearmed = report.rearmed.len(),
                requeued = report.requeued.len(),
                released = report.released_workers.len(),
                "Recovery pass finished"
            );
        }
        report
    }
}
