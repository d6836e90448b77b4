//! Worker records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::order::OrderId;

/// Worker identifier of the form `worker-<n>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(String);

impl WorkerId {
    pub fn new(n: usize) -> Self {
        Self(format!("worker-{n}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl PartialEq<&str> for WorkerId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerStatus {
    Idle,
    Processing,
}

/// A bot on the floor. Holds at most one order, by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    pub status: WorkerStatus,
    pub current_order: Option<OrderId>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Worker {
    pub fn new(n: usize, created_at: DateTime<Utc>) -> Self {
        Self {
            id: WorkerId::new(n),
            status: WorkerStatus::Idle,
            current_order: None,
            processing_started_at: None,
            created_at,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.status == WorkerStatus::Idle
    }

    /// True if this worker is processing exactly `order`.
    pub fn holds(&self, order: &OrderId) -> bool {
        self.status == WorkerStatus::Processing && self.current_order.as_ref() == Some(order)
    }

    pub fn bind(&mut self, order: &OrderId, at: DateTime<Utc>) {
        self.status = WorkerStatus::Processing;
        self.current_order = Some(order.clone());
        self.processing_started_at = Some(at);
    }

    /// Go back to IDLE, returning the order that was held.
    pub fn release(&mut self) -> Option<OrderId> {
        self.status = WorkerStatus::Idle;
        self.processing_started_at = None;
        self.current_order.take()
    }
}
