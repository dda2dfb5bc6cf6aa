//! Single-flight dispatch state
//!
//! At most one order is active on the device; everything else waits in
//! strict FIFO order. No I/O happens here.

use barbot_link::CommandBatch;
use shared::models::OrderId;
use std::collections::VecDeque;

/// An order waiting for the device
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWorkItem {
    pub order_id: OrderId,
    pub batch: CommandBatch,
}

impl PendingWorkItem {
    pub fn new(order_id: OrderId, batch: CommandBatch) -> Self {
        Self { order_id, batch }
    }
}

#[derive(Debug, Default)]
pub struct DispatchQueue {
    active: Option<OrderId>,
    pending: VecDeque<PendingWorkItem>,
}

impl DispatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<OrderId> {
        self.active
    }

    pub fn is_idle(&self) -> bool {
        self.active.is_none()
    }

    /// Append an item. When idle, the head is promoted to active and
    /// returned for sending.
    ///
    /// The head is not necessarily `item`: anything queued earlier (e.g.
    /// while the device was offline) goes first.
    pub fn admit(&mut self, item: PendingWorkItem) -> Option<PendingWorkItem> {
        self.pending.push_back(item);
        self.next()
    }

    /// Promote the head to active if idle
    pub fn next(&mut self) -> Option<PendingWorkItem> {
        if self.active.is_some() {
            return None;
        }
        let item = self.pending.pop_front()?;
        self.active = Some(item.order_id);
        Some(item)
    }

    /// Undo a promotion whose send failed; the item goes back to the head
    pub fn requeue_front(&mut self, item: PendingWorkItem) {
        if self.active == Some(item.order_id) {
            self.active = None;
        }
        self.pending.push_front(item);
    }

    /// Terminal response received: clear and return the active order
    pub fn finish(&mut self) -> Option<OrderId> {
        self.active.take()
    }

    /// Drop a waiting order. The active order is never removed.
    pub fn remove(&mut self, order_id: OrderId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|item| item.order_id != order_id);
        self.pending.len() != before
    }

    /// Forget the active order and every waiting one; returns how many
    /// orders were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.pending.len() + usize::from(self.active.is_some());
        self.pending.clear();
        self.active = None;
        dropped
    }

    /// 1-based position among waiting orders
    pub fn position(&self, order_id: OrderId) -> Option<usize> {
        self.pending
            .iter()
            .position(|item| item.order_id == order_id)
            .map(|i| i + 1)
    }

    pub fn contains(&self, order_id: OrderId) -> bool {
        self.active == Some(order_id) || self.position(order_id).is_some()
    }

    pub fn queued_ids(&self) -> Vec<OrderId> {
        self.pending.iter().map(|item| item.order_id).collect()
    }

    /// Number of waiting orders
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
