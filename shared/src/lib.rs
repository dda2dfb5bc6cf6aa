//! Shared types for barbot
//!
//! Domain models used by the server and its operator API, the unified
//! error system and small utilities.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};
