//! Order status listener
//!
//! Applies orchestrator events to stored orders: `Completed` moves the order
//! to `ready`, `Failed` cancels it and restocks its ingredients.

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use super::error::WorkflowError;
use super::workflow::OrderWorkflow;
use crate::fulfillment::FulfillmentEvent;

pub struct OrderStatusSync {
    workflow: Arc<OrderWorkflow>,
}

impl OrderStatusSync {
    pub fn new(workflow: Arc<OrderWorkflow>) -> Self {
        Self { workflow }
    }

    /// Run until shutdown or until the event channel closes
    pub async fn run(
        self,
        mut events: broadcast::Receiver<FulfillmentEvent>,
        shutdown: CancellationToken,
    ) {
        tracing::info!("Order status sync started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Order status sync received shutdown signal");
                    break;
                }
                event = events.recv() => match event {
                    Ok(event) => self.apply(event).await,
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Order status sync lagged, some order updates were missed");
                    }
                    Err(RecvError::Closed) => {
                        tracing::info!("Fulfillment event channel closed, status sync stopping");
                        break;
                    }
                },
            }
        }
    }

    async fn apply(&self, event: FulfillmentEvent) {
        match event {
            FulfillmentEvent::Completed { order_id } => {
                match self.workflow.mark_ready(order_id).await {
                    Ok(_) => {}
                    Err(WorkflowError::InvalidState { status, .. }) => {
                        tracing::info!(order_id, %status, "Completion for order no longer preparing, ignoring");
                    }
                    Err(e) => tracing::error!(order_id, error = %e, "Failed to mark order ready"),
                }
            }
            FulfillmentEvent::Failed { order_id, detail } => {
                tracing::warn!(order_id, ?detail, "Device failed order");
                if let Err(e) = self.workflow.fail_from_device(order_id, detail).await {
                    tracing::error!(order_id, error = %e, "Failed to cancel order after device error");
                }
            }
            FulfillmentEvent::Accepted { .. } | FulfillmentEvent::Preparing { .. } => {}
        }
    }
}
