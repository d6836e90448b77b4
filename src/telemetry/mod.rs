//! Telemetry for floor-core.
//!
//! Structured logging through `tracing` and counters/gauges through the
//! `metrics` facade. Nothing is exported over the network; a recorder must be
//! installed by the embedding process for metrics to go anywhere.

mod logging;
mod metrics;

pub use self::logging::{init_logging, LogConfig, LogError, LogFormat};
pub use self::metrics::init_metrics;
