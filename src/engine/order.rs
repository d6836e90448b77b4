//! Order records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::worker::WorkerId;
use crate::scheduler::PriorityClass;

/// Stable order identifier: class tag plus zero-padded sequence, e.g. `VIP-002`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(class: PriorityClass, sequence: u64) -> Self {
        Self(format!("{}-{:03}", class.tag(), sequence))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl PartialEq<&str> for OrderId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Lifecycle stage of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Processing,
    Complete,
}

/// A single order. Owned by the engine for its whole life and never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub sequence: u64,
    pub class: PriorityClass,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub assigned_worker: Option<WorkerId>,
}

impl Order {
    /// Fresh PENDING order.
    pub fn new(class: PriorityClass, sequence: u64, created_at: DateTime<Utc>) -> Self {
        Self {
            id: OrderId::new(class, sequence),
            sequence,
            class,
            status: OrderStatus::Pending,
            created_at,
            processing_started_at: None,
            completed_at: None,
            assigned_worker: None,
        }
    }

    /// Move to `status`, keeping timestamps and assignment consistent with it.
    pub fn set_status(&mut self, status: OrderStatus, at: DateTime<Utc>) {
        self.status = status;
        match status {
            OrderStatus::Pending => {
                self.processing_started_at = None;
                self.assigned_worker = None;
                self.completed_at = None;
            }
            OrderStatus::Processing => {
                self.processing_started_at = Some(at);
                self.completed_at = None;
            }
            OrderStatus::Complete => {
                self.completed_at = Some(at);
                self.assigned_worker = None;
            }
        }
    }

    /// Hand this order to `worker`.
    pub fn bind(&mut self, worker: &WorkerId, at: DateTime<Utc>) {
        self.set_status(OrderStatus::Processing, at);
        self.assigned_worker = Some(worker.clone());
    }

    /// Return this order to the pending pool.
    pub fn release(&mut self, at: DateTime<Utc>) {
        self.set_status(OrderStatus::Pending, at);
    }

    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending
    }

    pub fn is_processing(&self) -> bool {
        self.status == OrderStatus::Processing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_padded_class_tag() {
        assert_eq!(OrderId::new(PriorityClass::Vip, 2), "VIP-002");
        assert_eq!(OrderId::new(PriorityClass::Normal, 1).as_str(), "NORMAL-001");
        assert_eq!(OrderId::new(PriorityClass::Normal, 1234).to_string(), "NORMAL-1234");
    }

    #[test]
    fn bind_then_complete_keeps_invariants() {
        let now = Utc::now();
        let worker = WorkerId::new(1);
        let mut order = Order::new(PriorityClass::Normal, 1, now);
        assert!(order.is_pending());

        order.bind(&worker, now);
        assert!(order.is_processing());
        assert_eq!(order.assigned_worker.as_ref(), Some(&worker));
        assert_eq!(order.processing_started_at, Some(now));

        order.set_status(OrderStatus::Complete, now);
        assert_eq!(order.assigned_worker, None);
        assert_eq!(order.completed_at, Some(now));
    }

    #[test]
    fn release_clears_assignment() {
        let now = Utc::now();
        let mut order = Order::new(PriorityClass::Vip, 3, now);
        order.bind(&WorkerId::new(2), now);
        order.release(now);

        assert!(order.is_pending());
        assert_eq!(order.assigned_worker, None);
        assert_eq!(order.processing_started_at, None);
        assert_eq!(order.completed_at, None);
    }

    #[test]
    fn serializes_status_upper_case() {
        let order = Order::new(PriorityClass::Vip, 2, Utc::now());
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["id"], "VIP-002");
        assert_eq!(json["class"], "VIP");
        assert_eq!(json["status"], "PENDING");
    }
}
