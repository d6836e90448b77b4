//! Metric descriptions for the dispatch engine.
//!
//! The engine records through the `metrics` macros directly; this only
//! attaches units and help text for whichever recorder is installed.

use metrics::{describe_counter, describe_gauge, Unit};

/// Describe every metric the engine emits. Safe to call more than once.
pub fn init_metrics() {
    describe_counter!(
        "floor_orders_created_total",
        Unit::Count,
        "Orders created, labelled by priority class"
    );
    describe_counter!(
        "floor_orders_completed_total",
        Unit::Count,
        "Orders that finished service"
    );
    describe_counter!(
        "floor_orders_requeued_total",
        Unit::Count,
        "Orders returned to PENDING by worker removal or recovery"
    );
    describe_gauge!("floor_pending_orders", Unit::Count, "Orders awaiting a worker");
    describe_gauge!("floor_busy_workers", Unit::Count, "Workers currently processing");
    describe_gauge!("floor_workers", Unit::Count, "Workers in the pool");
}
