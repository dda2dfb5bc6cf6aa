//! Device API Handlers

use axum::{Json, extract::State};
use barbot_link::CommandBatch;
use serde::Serialize;
use serde_json::Value;
use shared::error::{ApiResponse, AppError, AppResult, ErrorCode};
use shared::models::OrderId;

use crate::core::ServerState;
use crate::fulfillment::{FulfillmentError, FulfillmentStatus};

fn unavailable(err: FulfillmentError) -> AppError {
    AppError::with_message(ErrorCode::FulfillmentUnavailable, err.to_string())
}

#[derive(Debug, Serialize)]
pub struct DeviceStatus {
    pub connected: bool,
    #[serde(flatten)]
    pub status: FulfillmentStatus,
}

#[derive(Debug, Serialize)]
pub struct QueueView {
    pub active_order: Option<OrderId>,
    pub queue: Vec<OrderId>,
    pub queue_length: usize,
}

#[derive(Debug, Serialize)]
pub struct SentResponse {
    pub sent: bool,
    pub commands: String,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub stop_sent: bool,
}

#[derive(Debug, Serialize)]
pub struct ClearedResponse {
    pub cleared: usize,
}

#[derive(Debug, Serialize)]
pub struct DrainResponse {
    pub dispatched: Option<OrderId>,
}

async fn device_status(state: &ServerState) -> AppResult<DeviceStatus> {
    let status = state.fulfillment.status().await.map_err(unavailable)?;
    Ok(DeviceStatus {
        connected: state.link.is_connected(),
        status,
    })
}

/// GET /api/device/status
pub async fn status(State(state): State<ServerState>) -> AppResult<ApiResponse<DeviceStatus>> {
    Ok(ApiResponse::success(device_status(&state).await?))
}

/// POST /api/device/connect
pub async fn connect(State(state): State<ServerState>) -> AppResult<ApiResponse<DeviceStatus>> {
    state.link.connect().await.map_err(|e| {
        AppError::with_message(ErrorCode::DeviceNotConnected, e.to_string())
            .with_detail("addr", state.link.status().addr)
    })?;
    Ok(ApiResponse::success_with_message(
        "Device connected",
        device_status(&state).await?,
    ))
}

/// POST /api/device/disconnect
pub async fn disconnect(State(state): State<ServerState>) -> AppResult<ApiResponse<DeviceStatus>> {
    state.link.disconnect().await;
    Ok(ApiResponse::success_with_message(
        "Device disconnected",
        device_status(&state).await?,
    ))
}

/// POST /api/device/command
///
/// Body `{ "commands": ["P1", 60, "P7", 30] }`; tokens are sent as-is.
pub async fn command(
    State(state): State<ServerState>,
    Json(body): Json<Value>,
) -> AppResult<ApiResponse<SentResponse>> {
    let Some(Value::Array(items)) = body.get("commands") else {
        return Err(AppError::validation("commands must be an array"));
    };

    let tokens: Vec<String> = items
        .iter()
        .map(|item| match item {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();
    let batch = CommandBatch::raw(tokens);

    let sent = state.link.send(&batch).await;
    tracing::info!(batch = %batch, sent, "Raw command from operator");
    let message = if sent { "Command sent" } else { "Device not connected" };
    Ok(ApiResponse::success_with_message(message, SentResponse {
        sent,
        commands: batch.encode(),
    }))
}

/// POST /api/device/emergency-stop
pub async fn emergency_stop(
    State(state): State<ServerState>,
) -> AppResult<ApiResponse<StopResponse>> {
    let stop_sent = state
        .fulfillment
        .emergency_stop()
        .await
        .map_err(unavailable)?;
    Ok(ApiResponse::success_with_message(
        "Emergency stop executed",
        StopResponse { stop_sent },
    ))
}

/// GET /api/device/queue
pub async fn queue(State(state): State<ServerState>) -> AppResult<ApiResponse<QueueView>> {
    let status = state.fulfillment.status().await.map_err(unavailable)?;
    Ok(ApiResponse::success(QueueView {
        active_order: status.active_order,
        queue: status.queue,
        queue_length: status.queue_length,
    }))
}

/// DELETE /api/device/queue
pub async fn clear_queue(State(state): State<ServerState>) -> AppResult<ApiResponse<ClearedResponse>> {
    let cleared = state.fulfillment.clear_queue().await.map_err(unavailable)?;
    Ok(ApiResponse::success(ClearedResponse { cleared }))
}

/// POST /api/device/queue/drain
pub async fn drain(State(state): State<ServerState>) -> AppResult<ApiResponse<DrainResponse>> {
    let dispatched = state.fulfillment.drain().await.map_err(unavailable)?;
    Ok(ApiResponse::success(DrainResponse { dispatched }))
}
