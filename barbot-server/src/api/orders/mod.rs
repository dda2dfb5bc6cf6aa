//! Order API Module
//!
//! Order lifecycle: create, process, cancel, deliver, and the per-event
//! views (queue, next order, full listing, stock).

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .nest("/api/orders", routes())
        .merge(event_routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::create))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/consumption", get(handler::consumption))
        .route("/{id}/process", post(handler::process))
        .route("/{id}/cancel", post(handler::cancel))
        .route("/{id}/complete", post(handler::complete))
        .route("/{id}/release", post(handler::release))
}

fn event_routes() -> Router<ServerState> {
    Router::new()
        .route("/api/events/{event_id}/queue", get(handler::event_queue))
        .route("/api/events/{event_id}/next", get(handler::next_pending))
        .route("/api/events/{event_id}/orders", get(handler::event_orders))
        .route("/api/events/{event_id}/inventory", get(handler::event_inventory))
}
