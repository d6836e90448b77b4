//! Order-dispatch engine.
//!
//! Owns every order and worker, pairs idle workers with pending orders in
//! priority order, completes orders when their service timer fires, and
//! repairs timer state after a restart.

pub mod config;
pub mod error;
pub mod observer;
pub mod order;
pub mod state;
pub mod worker;

mod dispatch;
mod recovery;

pub use config::DispatchConfig;
pub use dispatch::DispatchEngine;
pub use error::DispatchError;
pub use observer::{EngineEvent, ObserverHub, SubscriptionId};
pub use order::{Order, OrderId, OrderStatus};
pub use recovery::RecoveryReport;
pub use state::{EngineSnapshot, StatusReport};
pub use worker::{Worker, WorkerId, WorkerStatus};
