//! Order Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{CocktailId, EventId, GuestId, IngredientId, InventoryRecordId, OrderId};

/// Order lifecycle status
///
/// `pending → preparing → ready → delivered`, with `cancelled` reachable
/// from anything before `delivered`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Preparing,
    Ready,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Orders in these states still occupy a slot in the event queue
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Pending | Self::Preparing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: OrderId,
    pub event_id: EventId,
    pub cocktail_id: CocktailId,
    pub guest_id: Option<GuestId>,
    pub status: OrderStatus,
    /// Device command line without the trailing newline, e.g. `P1,60,P7,30`
    pub commands: String,
    pub queue_position: i64,
    pub notes: Option<String>,
    pub cancel_reason: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub preparation_start: Option<i64>,
    pub preparation_end: Option<i64>,
}

/// Create order payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub event_id: EventId,
    pub cocktail_id: CocktailId,
    #[serde(default)]
    pub guest_id: Option<GuestId>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Ingredient quantity deducted from inventory for one order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsumptionEntry {
    pub order_id: OrderId,
    pub ingredient_id: IngredientId,
    /// Inventory record the quantity came from (restock target)
    pub inventory_record_id: InventoryRecordId,
    pub quantity_used: Decimal,
    pub consumed_at: i64,
}
