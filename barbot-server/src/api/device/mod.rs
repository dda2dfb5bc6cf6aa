//! Device API Module
//!
//! Operator controls for the dispensing device and the dispatch queue.

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/device", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/status", get(handler::status))
        .route("/connect", post(handler::connect))
        .route("/disconnect", post(handler::disconnect))
        .route("/command", post(handler::command))
        .route("/emergency-stop", post(handler::emergency_stop))
        .route("/queue", get(handler::queue).delete(handler::clear_queue))
        .route("/queue/drain", post(handler::drain))
}
