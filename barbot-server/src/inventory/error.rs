//! Inventory errors

use rust_decimal::Decimal;
use shared::models::{EventId, IngredientId, InventoryRecordId};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum InventoryError {
    #[error(
        "Insufficient stock for ingredient {ingredient_id}: required {required}, available {available}"
    )]
    InsufficientStock {
        ingredient_id: IngredientId,
        required: Decimal,
        available: Decimal,
    },

    #[error("Ingredient {ingredient_id} is not stocked for event {event_id}")]
    NotStocked {
        event_id: EventId,
        ingredient_id: IngredientId,
    },

    #[error("Inventory record {0} not found")]
    RecordNotFound(InventoryRecordId),

    #[error("Quantity must be positive, got {0}")]
    InvalidQuantity(Decimal),
}

pub type InventoryResult<T> = Result<T, InventoryError>;
