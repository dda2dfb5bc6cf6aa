//! 健康检查路由
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /health | GET | 简单健康检查 |
//! | /health/detailed | GET | 数据库与设备连接检查 |

use axum::{Json, Router, extract::State, routing::get};
use barbot_link::ConnectionState;
use serde::Serialize;
use std::time::Instant;

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/detailed", get(detailed_health))
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
pub struct DetailedHealthResponse {
    /// ok | degraded | error
    status: &'static str,
    version: &'static str,
    uptime_seconds: u64,
    checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    database: CheckResult,
    device: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl CheckResult {
    fn ok(latency_ms: Option<u64>) -> Self {
        Self {
            status: "ok",
            latency_ms,
            message: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            latency_ms: None,
            message: Some(message.into()),
        }
    }
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// 设备断开只算 degraded：订单照常排队
pub async fn detailed_health(State(state): State<ServerState>) -> Json<DetailedHealthResponse> {
    let started = Instant::now();
    let database = match state.workflow.storage().get_order(0) {
        Ok(_) => CheckResult::ok(Some(started.elapsed().as_millis() as u64)),
        Err(e) => CheckResult::error(e.to_string()),
    };

    let link = state.link.status();
    let device = match link.state {
        ConnectionState::Connected => CheckResult::ok(None),
        other => CheckResult::error(format!("{} ({})", other, link.addr)),
    };

    let status = if database.status != "ok" {
        "error"
    } else if device.status != "ok" {
        "degraded"
    } else {
        "ok"
    };

    Json(DetailedHealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_secs(),
        checks: HealthChecks { database, device },
    })
}
