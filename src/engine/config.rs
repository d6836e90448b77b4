//! Engine timing configuration.
//!
//! Service time is one fixed value per engine. The other three durations only
//! shape when follow-up work runs.

use std::time::Duration;

use serde::Serialize;

/// Timing knobs for a [`DispatchEngine`](super::DispatchEngine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchConfig {
    /// Time a worker spends on one order.
    pub service_duration: Duration,
    /// Extra time past `service_duration` before a recovered order counts as stuck.
    pub recovery_grace: Duration,
    /// Pause between a completion and the next assignment pass. Zero runs it inline.
    pub settle_delay: Duration,
    /// Delay between `start()` and the one-shot recovery pass.
    pub recovery_delay: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            service_duration: Duration::from_secs(10),
            recovery_grace: Duration::from_secs(2),
            settle_delay: Duration::from_millis(100),
            recovery_delay: Duration::from_secs(1),
        }
    }
}

impl DispatchConfig {
    /// Age past which a PROCESSING order is completed outright on recovery.
    pub fn stuck_threshold(&self) -> Duration {
        self.service_duration.saturating_add(self.recovery_grace)
    }

    /// Same timings with no settle pause, so completions reassign inline.
    pub fn immediate(self) -> Self {
        Self {
            settle_delay: Duration::ZERO,
            ..self
        }
    }
}
