//! Order prioritization.
//!
//! Orders are kept in a single positional list. VIP orders sit ahead of
//! NORMAL ones and each class keeps ascending sequence order. Entries are
//! never dropped on completion; listings filter on status.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::order::{Order, OrderId, OrderStatus};
use crate::engine::DispatchError;

/// Priority class of an order. Determines queue position, not service time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PriorityClass {
    Normal,
    Vip,
}

impl PriorityClass {
    /// Tag used as the order id prefix.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Vip => "VIP",
        }
    }

    /// Lower rank is served first.
    fn rank(&self) -> u8 {
        match self {
            Self::Vip => 0,
            Self::Normal => 1,
        }
    }
}

impl Default for PriorityClass {
    fn default() -> Self {
        Self::Normal
    }
}

impl fmt::Display for PriorityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.tag())
    }
}

impl FromStr for PriorityClass {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("NORMAL") {
            Ok(Self::Normal)
        } else if s.eq_ignore_ascii_case("VIP") {
            Ok(Self::Vip)
        } else {
            Err(DispatchError::InvalidArgument(format!(
                "unrecognized priority class: {s:?}"
            )))
        }
    }
}

/// Sort key: class rank first, then creation sequence.
fn queue_key(order: &Order) -> (u8, u64) {
    (order.class.rank(), order.sequence)
}

/// Positional queue of orders awaiting (or holding) assignment.
#[derive(Debug, Default, Clone)]
pub struct PriorityQueue {
    entries: Vec<Order>,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Insert an order at its class position.
    ///
    /// A fresh VIP lands right after the last VIP, a fresh NORMAL at the
    /// tail. A re-inserted order lands where its sequence belongs in its class.
    pub fn insert(&mut self, order: Order) {
        let key = queue_key(&order);
        let at = self.entries.partition_point(|e| queue_key(e) <= key);
        self.entries.insert(at, order);
    }

    /// Remove the first entry with this id, whatever its status.
    pub fn remove(&mut self, order_id: &OrderId) -> Option<Order> {
        let index = self.entries.iter().position(|o| &o.id == order_id)?;
        Some(self.entries.remove(index))
    }

    /// Highest-priority pending order, if any.
    pub fn peek_next_pending(&self) -> Option<&Order> {
        self.pending().next()
    }

    /// Pending entries in assignment order.
    pub fn pending(&self) -> impl Iterator<Item = &Order> + '_ {
        self.with_status(OrderStatus::Pending)
    }

    /// Entries currently being processed.
    pub fn processing(&self) -> impl Iterator<Item = &Order> + '_ {
        self.with_status(OrderStatus::Processing)
    }

    /// Completed entries, still in queue order.
    pub fn complete(&self) -> impl Iterator<Item = &Order> + '_ {
        self.with_status(OrderStatus::Complete)
    }

    fn with_status(&self, status: OrderStatus) -> impl Iterator<Item = &Order> + '_ {
        self.entries.iter().filter(move |o| o.status == status)
    }

    /// Set an entry's status in place, stamping the matching timestamp.
    pub fn set_status(&mut self, order_id: &OrderId, status: OrderStatus, at: DateTime<Utc>) -> bool {
        self.update(order_id, |o| o.set_status(status, at))
    }

    /// Apply an edit to the entry with this id. Returns false if absent.
    pub fn update(&mut self, order_id: &OrderId, f: impl FnOnce(&mut Order)) -> bool {
        match self.entries.iter_mut().find(|o| &o.id == order_id) {
            Some(order) => {
                f(order);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, order_id: &OrderId) -> Option<&Order> {
        self.entries.iter().find(|o| &o.id == order_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(class: PriorityClass, sequence: u64) -> Order {
        Order::new(class, sequence, Utc::now())
    }

    fn pending_ids(queue: &PriorityQueue) -> Vec<String> {
        queue.pending().map(|o| o.id.to_string()).collect()
    }

    #[test]
    fn normal_orders_append_to_tail() {
        let mut queue = PriorityQueue::new();
        queue.insert(order(PriorityClass::Normal, 1));
        queue.insert(order(PriorityClass::Normal, 2));

        assert_eq!(pending_ids(&queue), ["NORMAL-001", "NORMAL-002"]);
    }

    #[test]
    fn vip_goes_after_last_vip_and_before_normals() {
        let mut queue = PriorityQueue::new();
        queue.insert(order(PriorityClass::Normal, 1));
        queue.insert(order(PriorityClass::Vip, 2));
        queue.insert(order(PriorityClass::Vip, 3));
        queue.insert(order(PriorityClass::Normal, 4));

        assert_eq!(
            pending_ids(&queue),
            ["VIP-002", "VIP-003", "NORMAL-001", "NORMAL-004"]
        );
    }

    #[test]
    fn peek_returns_highest_priority_pending() {
        let mut queue = PriorityQueue::new();
        assert!(queue.peek_next_pending().is_none());

        queue.insert(order(PriorityClass::Normal, 1));
        queue.insert(order(PriorityClass::Vip, 2));
        assert_eq!(queue.peek_next_pending().map(|o| o.id.as_str()), Some("VIP-002"));
    }

    #[test]
    fn peek_skips_processing_entries() {
        let mut queue = PriorityQueue::new();
        queue.insert(order(PriorityClass::Vip, 1));
        queue.insert(order(PriorityClass::Normal, 2));
        let vip = OrderId::new(PriorityClass::Vip, 1);
        assert!(queue.set_status(&vip, OrderStatus::Processing, Utc::now()));

        assert_eq!(queue.peek_next_pending().map(|o| o.id.as_str()), Some("NORMAL-002"));
        assert_eq!(queue.processing().count(), 1);
    }

    #[test]
    fn remove_returns_entry_or_none() {
        let mut queue = PriorityQueue::new();
        queue.insert(order(PriorityClass::Normal, 1));
        queue.insert(order(PriorityClass::Vip, 2));

        let removed = queue.remove(&OrderId::new(PriorityClass::Normal, 1));
        assert_eq!(removed.map(|o| o.sequence), Some(1));
        assert_eq!(pending_ids(&queue), ["VIP-002"]);

        assert!(queue.remove(&OrderId::new(PriorityClass::Normal, 99)).is_none());
    }

    #[test]
    fn set_status_stamps_timestamps() {
        let mut queue = PriorityQueue::new();
        queue.insert(order(PriorityClass::Normal, 1));
        let id = OrderId::new(PriorityClass::Normal, 1);
        let at = Utc::now();

        assert!(queue.set_status(&id, OrderStatus::Processing, at));
        assert_eq!(queue.get(&id).and_then(|o| o.processing_started_at), Some(at));

        assert!(queue.set_status(&id, OrderStatus::Complete, at));
        let entry = queue.get(&id).expect("entry kept after completion");
        assert_eq!(entry.completed_at, Some(at));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pending().count(), 0);

        assert!(!queue.set_status(&OrderId::new(PriorityClass::Vip, 7), OrderStatus::Complete, at));
    }

    #[test]
    fn reinsert_restores_sequence_position_within_class() {
        let mut queue = PriorityQueue::new();
        for seq in 1..=3 {
            queue.insert(order(PriorityClass::Normal, seq));
        }
        let first = OrderId::new(PriorityClass::Normal, 1);
        let taken = queue.remove(&first).expect("present");
        queue.insert(order(PriorityClass::Vip, 4));
        queue.insert(taken);

        assert_eq!(
            pending_ids(&queue),
            ["VIP-004", "NORMAL-001", "NORMAL-002", "NORMAL-003"]
        );
    }

    #[test]
    fn parse_priority_class() {
        assert_eq!("VIP".parse::<PriorityClass>().ok(), Some(PriorityClass::Vip));
        assert_eq!("normal".parse::<PriorityClass>().ok(), Some(PriorityClass::Normal));
        assert!(matches!(
            "GOLD".parse::<PriorityClass>(),
            Err(DispatchError::InvalidArgument(_))
        ));
        assert!("".parse::<PriorityClass>().is_err());
    }
}
