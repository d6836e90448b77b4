//! floor-core
//!
//! An order-dispatch engine for a simulated service floor. Orders arrive as
//! NORMAL or VIP, a pool of workers serves them one at a time with a fixed
//! service time, and workers can be added or removed while orders are in
//! flight.
//!
//! # Layout
//!
//! - [`scheduler`]: the class-ordered queue plus the timer and clock the
//!   engine consumes.
//! - [`engine`]: authoritative state, assignment, completion, removal with
//!   requeue, restart recovery, and observers.
//! - [`ipc`]: length-prefixed JSON over a Unix socket.
//! - [`cli`], [`config`], [`telemetry`], [`shutdown`]: the process around it.

pub mod cli;
pub mod config;
pub mod engine;
pub mod ipc;
pub mod scheduler;
pub mod shutdown;
pub mod telemetry;

use std::sync::Arc;

use engine::{DispatchConfig, DispatchEngine};
use ipc::{IpcHandler, IpcHandlerConfig};
use shutdown::ShutdownCoordinator;

/// Runtime configuration.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub dispatch: DispatchConfig,
    pub ipc_handler: IpcHandlerConfig,
}

impl From<&config::EnvConfig> for RuntimeConfig {
    fn from(env: &config::EnvConfig) -> Self {
        Self {
            dispatch: env.dispatch,
            ipc_handler: IpcHandlerConfig {
                max_frame_size: env.ipc_server.max_frame_size,
            },
        }
    }
}

/// One engine plus the handles the front end needs.
pub struct Floor {
    pub engine: DispatchEngine,
    pub shutdown: Arc<ShutdownCoordinator>,
    pub ipc_handler: Arc<IpcHandler>,
}

impl Floor {
    /// Build on the current tokio runtime with the system clock.
    ///
    /// Panics when called outside a tokio runtime.
    pub fn new(config: RuntimeConfig) -> Self {
        let engine = DispatchEngine::on_current_runtime(config.dispatch);
        Self::with_engine(engine, config.ipc_handler)
    }

    /// Wrap an existing engine, e.g. one restored from a snapshot.
    pub fn with_engine(engine: DispatchEngine, ipc_config: IpcHandlerConfig) -> Self {
        let shutdown = Arc::new(ShutdownCoordinator::new());
        let ipc_handler = Arc::new(IpcHandler::new(
            engine.clone(),
            Arc::clone(&shutdown),
            ipc_config,
        ));
        Self {
            engine,
            shutdown,
            ipc_handler,
        }
    }
}
