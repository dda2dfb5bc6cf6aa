//! Inventory
//!
//! Stock records per (event, ingredient) and the ledger that consumes and
//! restocks them on behalf of orders.

mod error;
mod ledger;
mod store;

pub use error::{InventoryError, InventoryResult};
pub use ledger::InventoryLedger;
pub use store::{InventoryStore, MemoryInventory};
