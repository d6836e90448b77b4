//! Wall-clock sources.
//!
//! [`ManualClock`] is both a [`Clock`] and a [`TimerService`]: virtual time
//! only moves when [`ManualClock::advance`] is called, and every callback that
//! comes due along the way runs at its own deadline.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;

use super::timer::{TimerCallback, TimerHandle, TimerService};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Convert a std duration to a chrono delta, saturating on overflow.
pub(crate) fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or_else(|_| TimeDelta::max_value())
}

/// Elapsed time between two instants; zero when `later` precedes `earlier`.
pub(crate) fn elapsed_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> Duration {
    (later - earlier).to_std().unwrap_or(Duration::ZERO)
}

struct ManualState {
    origin: DateTime<Utc>,
    elapsed: Duration,
    next_id: u64,
    // (deadline, handle) keeps ties in scheduling order.
    due: BTreeMap<(Duration, TimerHandle), TimerCallback>,
    deadlines: HashMap<TimerHandle, Duration>,
}

/// Virtual clock and timer for deterministic tests and simulations.
pub struct ManualClock {
    state: Mutex<ManualState>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Start virtual time at a fixed instant.
    pub fn starting_at(origin: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(ManualState {
                origin,
                elapsed: Duration::ZERO,
                next_id: 1,
                due: BTreeMap::new(),
                deadlines: HashMap::new(),
            }),
        }
    }

    /// Virtual time elapsed since the origin.
    pub fn elapsed(&self) -> Duration {
        self.state.lock().elapsed
    }

    /// Number of callbacks still waiting to fire.
    pub fn pending(&self) -> usize {
        self.state.lock().due.len()
    }

    /// Move time forward, firing every callback that comes due.
    ///
    /// Callbacks run without the clock lock held, so they may schedule or
    /// cancel further timers; new ones inside the window fire too.
    pub fn advance(&self, by: Duration) {
        let target = self.state.lock().elapsed.saturating_add(by);
        loop {
            let callback = {
                let mut state = self.state.lock();
                let next = state.due.keys().next().copied();
                match next {
                    Some(key) if key.0 <= target => {
                        state.deadlines.remove(&key.1);
                        state.elapsed = state.elapsed.max(key.0);
                        state.due.remove(&key)
                    }
                    _ => {
                        state.elapsed = target;
                        return;
                    }
                }
            };
            if let Some(callback) = callback {
                callback();
            }
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let state = self.state.lock();
        state.origin + to_delta(state.elapsed)
    }
}

impl TimerService for ManualClock {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let mut state = self.state.lock();
        let handle = TimerHandle(state.next_id);
        state.next_id += 1;
        let deadline = state.elapsed.saturating_add(delay);
        state.due.insert((deadline, handle), callback);
        state.deadlines.insert(handle, deadline);
        handle
    }

    fn cancel(&self, handle: TimerHandle) {
        let mut state = self.state.lock();
        if let Some(deadline) = state.deadlines.remove(&handle) {
            state.due.remove(&(deadline, handle));
        }
    }
}
