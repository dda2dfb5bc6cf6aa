//! Fulfillment orchestration
//!
//! Single-flight, FIFO dispatch of order batches to the device.

mod events;
mod queue;
mod service;

pub use events::{Disposition, FulfillmentEvent, FulfillmentStatus};
pub use queue::{DispatchQueue, PendingWorkItem};
pub use service::{Fulfillment, FulfillmentError, FulfillmentResult, FulfillmentWorker};
