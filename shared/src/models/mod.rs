//! Data models
//!
//! Shared between barbot-server and operator frontends (via API).
//! All IDs are `i64`; quantities are `Decimal`.

pub mod inventory;
pub mod order;
pub mod recipe;

// Re-exports
pub use inventory::*;
pub use order::*;
pub use recipe::*;

pub type OrderId = i64;
pub type EventId = i64;
pub type CocktailId = i64;
pub type IngredientId = i64;
pub type InventoryRecordId = i64;
pub type GuestId = i64;
