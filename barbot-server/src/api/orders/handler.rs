//! Order API Handlers

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
};
use serde::Deserialize;
use shared::error::{ApiResponse, AppError, AppResult};
use shared::models::{ConsumptionEntry, EventId, InventoryRecord, NewOrder, Order, OrderId};

use crate::core::ServerState;
use crate::inventory::InventoryStore;
use crate::orders::ProcessOutcome;

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// POST /api/orders
pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<NewOrder>,
) -> AppResult<ApiResponse<Order>> {
    let order = state.workflow.create_order(payload).await?;
    Ok(ApiResponse::success_with_message("Order created", order))
}

/// GET /api/orders/{id}
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<OrderId>,
) -> AppResult<ApiResponse<Order>> {
    Ok(ApiResponse::success(state.workflow.get(id).await?))
}

/// GET /api/orders/{id}/consumption
pub async fn consumption(
    State(state): State<ServerState>,
    Path(id): Path<OrderId>,
) -> AppResult<ApiResponse<Vec<ConsumptionEntry>>> {
    Ok(ApiResponse::success(state.workflow.consumption(id).await?))
}

/// POST /api/orders/{id}/process
pub async fn process(
    State(state): State<ServerState>,
    Path(id): Path<OrderId>,
) -> AppResult<ApiResponse<ProcessOutcome>> {
    let outcome = state.workflow.process(id).await?;
    Ok(ApiResponse::success_with_message("Order processing", outcome))
}

/// POST /api/orders/{id}/cancel
///
/// Optional body `{ "reason": "..." }`
pub async fn cancel(
    State(state): State<ServerState>,
    Path(id): Path<OrderId>,
    body: Bytes,
) -> AppResult<ApiResponse<Order>> {
    let request: CancelRequest = if body.is_empty() {
        CancelRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::invalid_request(format!("Invalid cancel request: {}", e)))?
    };
    let order = state.workflow.cancel(id, request.reason).await?;
    Ok(ApiResponse::success_with_message("Order cancelled", order))
}

/// POST /api/orders/{id}/complete
pub async fn complete(
    State(state): State<ServerState>,
    Path(id): Path<OrderId>,
) -> AppResult<ApiResponse<Order>> {
    let order = state.workflow.deliver(id).await?;
    Ok(ApiResponse::success_with_message("Order delivered", order))
}

/// POST /api/orders/{id}/release
pub async fn release(
    State(state): State<ServerState>,
    Path(id): Path<OrderId>,
) -> AppResult<ApiResponse<Vec<ConsumptionEntry>>> {
    Ok(ApiResponse::success(state.workflow.release_stranded(id).await?))
}

/// GET /api/events/{event_id}/queue
pub async fn event_queue(
    State(state): State<ServerState>,
    Path(event_id): Path<EventId>,
) -> AppResult<ApiResponse<Vec<Order>>> {
    Ok(ApiResponse::success(state.workflow.event_queue(event_id).await?))
}

/// GET /api/events/{event_id}/next
///
/// `data` is null when nothing is waiting to be processed
pub async fn next_pending(
    State(state): State<ServerState>,
    Path(event_id): Path<EventId>,
) -> AppResult<ApiResponse<Option<Order>>> {
    match state.workflow.next_pending(event_id).await? {
        Some(order) => Ok(ApiResponse::success(Some(order))),
        None => Ok(ApiResponse::success_with_message("No pending orders", None)),
    }
}

/// GET /api/events/{event_id}/orders
pub async fn event_orders(
    State(state): State<ServerState>,
    Path(event_id): Path<EventId>,
) -> AppResult<ApiResponse<Vec<Order>>> {
    Ok(ApiResponse::success(state.workflow.event_orders(event_id).await?))
}

/// GET /api/events/{event_id}/inventory
pub async fn event_inventory(
    State(state): State<ServerState>,
    Path(event_id): Path<EventId>,
) -> AppResult<ApiResponse<Vec<InventoryRecord>>> {
    Ok(ApiResponse::success(
        state.inventory.records_for_event(event_id).await,
    ))
}
