//! Fuzz target for the dispatch engine.
//!
//! Runs an arbitrary sequence of operations on virtual time and checks the
//! queue and pairing invariants after each one.

#![no_main]

use std::sync::Arc;
use std::time::Duration;

use arbitrary::Arbitrary;
use floor_core::engine::{DispatchConfig, DispatchEngine, OrderStatus};
use floor_core::scheduler::{ManualClock, PriorityClass};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Op {
    Order { vip: bool },
    AddWorker,
    RemoveWorker,
    Advance { millis: u16 },
    Recover,
    Reset,
}

fuzz_target!(|ops: Vec<Op>| {
    let clock = Arc::new(ManualClock::new());
    let engine = DispatchEngine::new(DispatchConfig::default(), clock.clone(), clock.clone());

    for op in ops {
        match op {
            Op::Order { vip } => {
                let class = if vip { PriorityClass::Vip } else { PriorityClass::Normal };
                engine.create_order(class);
            }
            Op::AddWorker => {
                engine.add_worker();
            }
            Op::RemoveWorker => {
                let _ = engine.remove_worker();
            }
            Op::Advance { millis } => clock.advance(Duration::from_millis(u64::from(millis) * 10)),
            Op::Recover => {
                engine.recover_stuck_orders();
            }
            Op::Reset => engine.reset(),
        }

        let status = engine.status();
        let first_normal = status
            .pending
            .iter()
            .position(|o| o.class == PriorityClass::Normal)
            .unwrap_or(status.pending.len());
        assert!(status.pending[first_normal..]
            .iter()
            .all(|o| o.class == PriorityClass::Normal));

        for order in status.processing.iter() {
            let worker = order.assigned_worker.as_ref().expect("processing order has a worker");
            assert!(status
                .workers
                .iter()
                .any(|w| &w.id == worker && w.current_order.as_ref() == Some(&order.id)));
        }
        for order in status.complete.iter() {
            assert_eq!(order.status, OrderStatus::Complete);
            assert!(order.completed_at.is_some() && order.assigned_worker.is_none());
        }
        assert_eq!(
            status.workers.iter().filter(|w| !w.is_idle()).count(),
            status.processing.len()
        );
    }
});
