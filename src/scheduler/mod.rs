//! Scheduling primitives for the dispatch engine.
//!
//! Holds the class-ordered order queue and the time abstractions the engine
//! consumes: a one-shot timer service and a wall clock.

mod clock;
mod priority;
mod timer;

pub(crate) use clock::elapsed_between;
pub use clock::{Clock, ManualClock, SystemClock};
pub use priority::{PriorityClass, PriorityQueue};
pub use timer::{TimerCallback, TimerHandle, TimerService, TokioTimer};
