//! Orders
//!
//! Persistence, lifecycle and the listener that follows device outcomes.

mod error;
mod status_sync;
mod storage;
mod workflow;

pub use error::{WorkflowError, WorkflowResult};
pub use status_sync::OrderStatusSync;
pub use storage::{OrderStorage, StorageError, StorageResult};
pub use workflow::{OrderWorkflow, ProcessOutcome};
