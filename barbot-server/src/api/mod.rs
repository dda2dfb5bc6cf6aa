//! API 路由模块
//!
//! - [`health`] - 健康检查
//! - [`device`] - 设备与派单队列控制
//! - [`orders`] - 订单生命周期

pub mod device;
pub mod health;
pub mod orders;

use axum::Router;
use tower::ServiceBuilder;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::ServerState;

/// 同时处理的最大请求数
const MAX_CONCURRENT_REQUESTS: usize = 256;

/// Routes without middleware or state
pub fn routes() -> Router<ServerState> {
    Router::new()
        .merge(health::router())
        .merge(device::router())
        .merge(orders::router())
}

/// Fully configured application, used by the HTTP server and by tests
pub fn build_router(state: ServerState) -> Router {
    routes()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS)),
        )
        .with_state(state)
}
