//! Order workflow errors

use rust_decimal::Decimal;
use shared::error::{AppError, ErrorCode};
use shared::models::{CocktailId, IngredientId, OrderId, OrderStatus};
use thiserror::Error;

use super::storage::StorageError;
use crate::fulfillment::FulfillmentError;
use crate::inventory::InventoryError;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Order {0} not found")]
    OrderNotFound(OrderId),

    #[error("Cannot {action} order {order_id} in status {status}")]
    InvalidState {
        order_id: OrderId,
        status: OrderStatus,
        action: &'static str,
    },

    #[error("Cocktail {0} has no recipe")]
    RecipeNotFound(CocktailId),

    #[error("Cocktail {0} has no ingredient the device can pour")]
    NothingToDispense(CocktailId),

    #[error(
        "Insufficient stock for ingredient {ingredient_id}: required {required}, available {available}"
    )]
    InsufficientStock {
        ingredient_id: IngredientId,
        required: Decimal,
        available: Decimal,
    },

    #[error("Inventory error: {0}")]
    Inventory(InventoryError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Fulfillment unavailable: {0}")]
    FulfillmentUnavailable(#[from] FulfillmentError),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

impl From<InventoryError> for WorkflowError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::InsufficientStock {
                ingredient_id,
                required,
                available,
            } => Self::InsufficientStock {
                ingredient_id,
                required,
                available,
            },
            other => Self::Inventory(other),
        }
    }
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        let message = err.to_string();
        match err {
            WorkflowError::OrderNotFound(id) => {
                AppError::with_message(ErrorCode::OrderNotFound, message).with_detail("order_id", id)
            }
            WorkflowError::InvalidState { status, .. } => {
                let code = match status {
                    OrderStatus::Delivered => ErrorCode::OrderAlreadyDelivered,
                    OrderStatus::Cancelled => ErrorCode::OrderAlreadyCancelled,
                    _ => ErrorCode::OrderInvalidState,
                };
                AppError::with_message(code, message).with_detail("status", status.as_str())
            }
            WorkflowError::RecipeNotFound(id) => {
                AppError::with_message(ErrorCode::CocktailNotFound, message)
                    .with_detail("cocktail_id", id)
            }
            WorkflowError::NothingToDispense(_) => {
                AppError::with_message(ErrorCode::ValidationFailed, message)
            }
            WorkflowError::InsufficientStock {
                ingredient_id,
                required,
                available,
            } => AppError::with_message(ErrorCode::InsufficientStock, message)
                .with_detail("ingredient_id", ingredient_id)
                .with_detail("required", required.to_string())
                .with_detail("available", available.to_string()),
            WorkflowError::Inventory(InventoryError::NotStocked { ingredient_id, .. }) => {
                AppError::with_message(ErrorCode::IngredientNotStocked, message)
                    .with_detail("ingredient_id", ingredient_id)
            }
            WorkflowError::Inventory(InventoryError::RecordNotFound(_)) => {
                AppError::with_message(ErrorCode::InventoryRecordNotFound, message)
            }
            WorkflowError::Inventory(_) => {
                AppError::with_message(ErrorCode::ValidationFailed, message)
            }
            WorkflowError::Storage(_) => AppError::database(message),
            WorkflowError::FulfillmentUnavailable(_) => {
                AppError::with_message(ErrorCode::FulfillmentUnavailable, message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn test_inventory_shortage_maps_to_workflow_shortage() {
        let err: WorkflowError = InventoryError::InsufficientStock {
            ingredient_id: 2,
            required: Decimal::from(30),
            available: Decimal::from(10),
        }
        .into();
        assert!(matches!(err, WorkflowError::InsufficientStock { ingredient_id: 2, .. }));
    }

    #[test]
    fn test_http_mapping() {
        let not_found: AppError = WorkflowError::OrderNotFound(3).into();
        assert_eq!(not_found.http_status(), StatusCode::NOT_FOUND);

        let twice: AppError = WorkflowError::InvalidState {
            order_id: 3,
            status: OrderStatus::Cancelled,
            action: "cancel",
        }
        .into();
        assert_eq!(twice.code, ErrorCode::OrderAlreadyCancelled);
        assert_eq!(twice.http_status(), StatusCode::CONFLICT);

        let short: AppError = WorkflowError::InsufficientStock {
            ingredient_id: 1,
            required: Decimal::ONE,
            available: Decimal::ZERO,
        }
        .into();
        assert_eq!(short.http_status(), StatusCode::UNPROCESSABLE_ENTITY);

        let closed: AppError = WorkflowError::from(FulfillmentError::Closed).into();
        assert_eq!(closed.http_status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
