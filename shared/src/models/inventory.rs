//! Inventory Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{EventId, IngredientId, InventoryRecordId};

/// Stock of one ingredient for one event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryRecord {
    pub id: InventoryRecordId,
    pub event_id: EventId,
    pub ingredient_id: IngredientId,
    pub initial_quantity: Decimal,
    pub current_quantity: Decimal,
    /// Display unit, `ml` unless the catalog says otherwise
    pub unit: String,
}
