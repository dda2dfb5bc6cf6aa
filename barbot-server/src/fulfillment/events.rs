//! Order lifecycle events published by the fulfillment actor

use barbot_link::LinkStatus;
use serde::Serialize;
use shared::models::OrderId;

/// What happened to a submitted order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Disposition {
    /// Batch written to the device
    Dispatched,
    /// Waiting behind the active order, or for the device to come back
    Queued { position: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FulfillmentEvent {
    Accepted {
        order_id: OrderId,
        disposition: Disposition,
    },
    Preparing {
        order_id: OrderId,
    },
    Completed {
        order_id: OrderId,
    },
    Failed {
        order_id: OrderId,
        detail: Option<String>,
    },
}

impl FulfillmentEvent {
    pub fn order_id(&self) -> OrderId {
        match self {
            Self::Accepted { order_id, .. }
            | Self::Preparing { order_id }
            | Self::Completed { order_id }
            | Self::Failed { order_id, .. } => *order_id,
        }
    }
}

/// Orchestrator snapshot
#[derive(Debug, Clone, Serialize)]
pub struct FulfillmentStatus {
    pub active_order: Option<OrderId>,
    pub queue: Vec<OrderId>,
    pub queue_length: usize,
    /// Link events dropped because the worker fell behind. Non-zero means a
    /// device response may have been missed and the active order may be stuck.
    pub missed_link_events: u64,
    pub link: LinkStatus,
}
