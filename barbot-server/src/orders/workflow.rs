//! Order workflow
//!
//! Ties inventory to device dispatch:
//!
//! ```text
//! create ─▶ pending ──process──▶ preparing ──device done──▶ ready ──deliver──▶ delivered
//!              │                     │  │                              │
//!              └──────cancel─────────┴──┴── device error ──────────────┴──▶ cancelled
//! ```
//!
//! `process` consumes every required ingredient and records one
//! consumption entry per line before the batch goes to the orchestrator.
//! `cancel` restocks exactly what those entries say and deletes them.
//!
//! Mutations are serialized through one async mutex, so HTTP calls and the
//! status listener never interleave on an order.

use barbot_link::CommandBatch;
use serde::Serialize;
use shared::models::{ConsumptionEntry, EventId, NewOrder, Order, OrderId, OrderStatus, RecipeLine};
use shared::util::now_millis;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use super::error::{WorkflowError, WorkflowResult};
use super::storage::{OrderStorage, StorageError};
use crate::catalog::RecipeSource;
use crate::fulfillment::{Disposition, Fulfillment};
use crate::inventory::{InventoryError, InventoryLedger};

/// Result of a successful `process`
#[derive(Debug, Clone, Serialize)]
pub struct ProcessOutcome {
    pub order: Order,
    pub disposition: Disposition,
}

pub struct OrderWorkflow {
    storage: OrderStorage,
    recipes: Arc<dyn RecipeSource>,
    ledger: InventoryLedger,
    fulfillment: Fulfillment,
    lock: Mutex<()>,
}

impl OrderWorkflow {
    pub fn new(
        storage: OrderStorage,
        recipes: Arc<dyn RecipeSource>,
        ledger: InventoryLedger,
        fulfillment: Fulfillment,
    ) -> Self {
        Self {
            storage,
            recipes,
            ledger,
            fulfillment,
            lock: Mutex::new(()),
        }
    }

    pub fn storage(&self) -> &OrderStorage {
        &self.storage
    }

    fn load(&self, order_id: OrderId) -> WorkflowResult<Order> {
        self.storage
            .get_order(order_id)?
            .ok_or(WorkflowError::OrderNotFound(order_id))
    }

    fn invalid(order: &Order, action: &'static str) -> WorkflowError {
        WorkflowError::InvalidState {
            order_id: order.id,
            status: order.status,
            action,
        }
    }

    /// Create a pending order with its command line and queue position
    #[instrument(skip(self, new), fields(event_id = new.event_id, cocktail_id = new.cocktail_id))]
    pub async fn create_order(&self, new: NewOrder) -> WorkflowResult<Order> {
        let recipe = self
            .recipes
            .recipe(new.cocktail_id)
            .await
            .ok_or(WorkflowError::RecipeNotFound(new.cocktail_id))?;
        let required: Vec<RecipeLine> = recipe.required_lines().cloned().collect();
        self.ledger
            .check_availability(new.event_id, &required)
            .await?;

        let mut builder = CommandBatch::builder();
        for (slot, amount) in recipe.dispensable_lines() {
            builder.pour(slot, amount);
        }
        if builder.is_empty() {
            return Err(WorkflowError::NothingToDispense(new.cocktail_id));
        }
        let batch = builder.build();

        let _guard = self.lock.lock().await;
        let now = now_millis();
        let txn = self.storage.begin_write()?;
        let order = Order {
            id: self.storage.next_order_id(&txn)?,
            event_id: new.event_id,
            cocktail_id: new.cocktail_id,
            guest_id: new.guest_id,
            status: OrderStatus::Pending,
            commands: batch.encode(),
            queue_position: self.storage.next_queue_position(&txn, new.event_id)?,
            notes: new.notes,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
            preparation_start: None,
            preparation_end: None,
        };
        self.storage.put_order(&txn, &order)?;
        txn.commit().map_err(StorageError::from)?;

        info!(
            order_id = order.id,
            queue_position = order.queue_position,
            commands = %order.commands,
            "Order created"
        );
        Ok(order)
    }

    /// Consume ingredients and hand the order to the device.
    ///
    /// A failed availability pre-check leaves the order `pending`. A line
    /// that fails after the pre-check (stock taken concurrently) cancels the
    /// order and leaves earlier lines consumed; see [`Self::release_stranded`].
    #[instrument(skip(self))]
    pub async fn process(&self, order_id: OrderId) -> WorkflowResult<ProcessOutcome> {
        let _guard = self.lock.lock().await;
        let mut order = self.load(order_id)?;
        if order.status != OrderStatus::Pending {
            return Err(Self::invalid(&order, "process"));
        }

        let recipe = self
            .recipes
            .recipe(order.cocktail_id)
            .await
            .ok_or(WorkflowError::RecipeNotFound(order.cocktail_id))?;
        let required: Vec<RecipeLine> = recipe.required_lines().cloned().collect();
        self.ledger
            .check_availability(order.event_id, &required)
            .await?;

        let now = now_millis();
        order.status = OrderStatus::Preparing;
        order.preparation_start = Some(now);
        order.updated_at = now;
        self.storage.save_order(&order)?;

        for line in required {
            let entry = match self
                .ledger
                .consume(order.id, order.event_id, line.ingredient_id, line.quantity)
                .await
            {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(order_id, ingredient_id = line.ingredient_id, error = %e, "Consumption failed, cancelling order");
                    self.mark_cancelled(&mut order, e.to_string())?;
                    return Err(e.into());
                }
            };

            if let Err(e) = self.storage.record_consumption(&entry) {
                // the ledger already moved; put it back so records and stock agree
                if let Err(restock_err) = self.ledger.restock(&entry).await {
                    error!(order_id, error = %restock_err, "Failed to restock unrecorded consumption");
                }
                self.mark_cancelled(&mut order, format!("storage failure: {}", e))?;
                return Err(e.into());
            }
        }

        let batch = CommandBatch::from_line(&order.commands);
        let disposition = self.fulfillment.submit(order.id, batch).await?;
        info!(order_id, ?disposition, "Order processing started");

        Ok(ProcessOutcome { order, disposition })
    }

    fn mark_cancelled(&self, order: &mut Order, reason: String) -> WorkflowResult<()> {
        order.status = OrderStatus::Cancelled;
        order.cancel_reason = Some(reason);
        order.updated_at = now_millis();
        self.storage.save_order(order)?;
        Ok(())
    }

    /// Restock entries one by one. Entries that could not be restocked are
    /// returned so they stay on record.
    async fn restock_all(
        &self,
        entries: Vec<ConsumptionEntry>,
    ) -> (Vec<ConsumptionEntry>, Vec<ConsumptionEntry>, Option<InventoryError>) {
        let mut restocked = Vec::with_capacity(entries.len());
        let mut kept = Vec::new();
        let mut failure = None;
        for entry in entries {
            match self.ledger.restock(&entry).await {
                Ok(()) => restocked.push(entry),
                Err(e) => {
                    error!(order_id = entry.order_id, record_id = entry.inventory_record_id, error = %e, "Restock failed");
                    failure.get_or_insert(e);
                    kept.push(entry);
                }
            }
        }
        (restocked, kept, failure)
    }

    /// Restock and delete all consumption of `order`, then persist `order`
    /// as given. Nothing but the still-unrestocked entries is written when a
    /// restock fails.
    async fn release_consumption(&self, order: &Order) -> WorkflowResult<Vec<ConsumptionEntry>> {
        let entries = self.storage.consumption_for_order(order.id)?;
        let (restocked, kept, failure) = self.restock_all(entries).await;

        let txn = self.storage.begin_write()?;
        self.storage.remove_consumption(&txn, order.id)?;
        for entry in &kept {
            self.storage.add_consumption(&txn, entry)?;
        }
        if failure.is_none() {
            self.storage.put_order(&txn, order)?;
        }
        txn.commit().map_err(StorageError::from)?;

        match failure {
            Some(e) => Err(WorkflowError::Inventory(e)),
            None => Ok(restocked),
        }
    }

    async fn cancel_locked(&self, mut order: Order, reason: String) -> WorkflowResult<Order> {
        order.status = OrderStatus::Cancelled;
        order.cancel_reason = Some(reason);
        order.updated_at = now_millis();
        let released = self.release_consumption(&order).await?;
        info!(order_id = order.id, released = released.len(), "Order cancelled");
        Ok(order)
    }

    /// Cancel an order that is not delivered yet. Consumed ingredients are
    /// restocked and a queued order is pulled from the dispatch queue. An
    /// order already on the device is not stopped.
    #[instrument(skip(self, reason))]
    pub async fn cancel(&self, order_id: OrderId, reason: Option<String>) -> WorkflowResult<Order> {
        let _guard = self.lock.lock().await;
        let order = self.load(order_id)?;
        if order.status.is_terminal() {
            return Err(Self::invalid(&order, "cancel"));
        }

        if order.status == OrderStatus::Preparing {
            match self.fulfillment.withdraw(order_id).await {
                Ok(true) => info!(order_id, "Queued order withdrawn"),
                Ok(false) => {}
                Err(e) => warn!(order_id, error = %e, "Could not withdraw order from queue"),
            }
        }

        self.cancel_locked(order, reason.unwrap_or_else(|| "cancelled".to_string()))
            .await
    }

    /// Device reported an error for an order on the device. Cancels it if
    /// it is still `preparing`; anything else is left alone.
    #[instrument(skip(self))]
    pub async fn fail_from_device(
        &self,
        order_id: OrderId,
        detail: Option<String>,
    ) -> WorkflowResult<Option<Order>> {
        let _guard = self.lock.lock().await;
        let order = self.load(order_id)?;
        if order.status != OrderStatus::Preparing {
            info!(order_id, status = %order.status, "Device failure for order no longer preparing, ignoring");
            return Ok(None);
        }

        let reason = format!("device error: {}", detail.as_deref().unwrap_or("unknown"));
        self.cancel_locked(order, reason).await.map(Some)
    }

    /// `preparing` → `ready`
    pub async fn mark_ready(&self, order_id: OrderId) -> WorkflowResult<Order> {
        let _guard = self.lock.lock().await;
        let mut order = self.load(order_id)?;
        if order.status != OrderStatus::Preparing {
            return Err(Self::invalid(&order, "mark ready"));
        }

        let now = now_millis();
        order.status = OrderStatus::Ready;
        order.preparation_end = Some(now);
        order.updated_at = now;
        self.storage.save_order(&order)?;
        info!(order_id, "Order ready");
        Ok(order)
    }

    /// `preparing | ready` → `delivered`
    pub async fn deliver(&self, order_id: OrderId) -> WorkflowResult<Order> {
        let _guard = self.lock.lock().await;
        let mut order = self.load(order_id)?;
        if !matches!(order.status, OrderStatus::Preparing | OrderStatus::Ready) {
            return Err(Self::invalid(&order, "deliver"));
        }

        if order.status == OrderStatus::Preparing
            && let Ok(true) = self.fulfillment.withdraw(order_id).await
        {
            info!(order_id, "Delivered order withdrawn from queue");
        }

        let now = now_millis();
        order.status = OrderStatus::Delivered;
        order.preparation_end.get_or_insert(now);
        order.updated_at = now;
        self.storage.save_order(&order)?;
        info!(order_id, "Order delivered");
        Ok(order)
    }

    /// Give back ingredients still recorded against a cancelled order
    /// (left behind by a `process` that failed halfway)
    #[instrument(skip(self))]
    pub async fn release_stranded(&self, order_id: OrderId) -> WorkflowResult<Vec<ConsumptionEntry>> {
        let _guard = self.lock.lock().await;
        let order = self.load(order_id)?;
        if order.status != OrderStatus::Cancelled {
            return Err(Self::invalid(&order, "release"));
        }

        let released = self.release_consumption(&order).await?;
        if !released.is_empty() {
            info!(order_id, released = released.len(), "Stranded consumption released");
        }
        Ok(released)
    }

    pub async fn get(&self, order_id: OrderId) -> WorkflowResult<Order> {
        self.load(order_id)
    }

    pub async fn consumption(&self, order_id: OrderId) -> WorkflowResult<Vec<ConsumptionEntry>> {
        self.load(order_id)?;
        Ok(self.storage.consumption_for_order(order_id)?)
    }

    /// Pending and preparing orders of an event, by queue position
    pub async fn event_queue(&self, event_id: EventId) -> WorkflowResult<Vec<Order>> {
        Ok(self
            .storage
            .orders_for_event(event_id)?
            .into_iter()
            .filter(|o| o.status.is_queued())
            .collect())
    }

    /// Oldest `pending` order of an event, i.e. the next one to process
    pub async fn next_pending(&self, event_id: EventId) -> WorkflowResult<Option<Order>> {
        Ok(self
            .storage
            .orders_for_event(event_id)?
            .into_iter()
            .find(|o| o.status == OrderStatus::Pending))
    }

    /// Every order of an event in any status, newest first
    pub async fn event_orders(&self, event_id: EventId) -> WorkflowResult<Vec<Order>> {
        let mut orders = self.storage.orders_for_event(event_id)?;
        orders.reverse();
        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogRecipes;
    use crate::inventory::{InventoryStore, MemoryInventory};
    use barbot_link::{DeviceLink, LinkConfig};
    use rust_decimal::Decimal;
    use shared::models::{InventoryRecord, Recipe};
    use tokio_util::sync::CancellationToken;

    struct Harness {
        workflow: OrderWorkflow,
        inventory: Arc<MemoryInventory>,
        fulfillment: Fulfillment,
        _shutdown: tokio_util::sync::DropGuard,
    }

    fn line(ingredient_id: i64, qty: i64, slot: Option<&str>, optional: bool) -> RecipeLine {
        RecipeLine {
            ingredient_id,
            quantity: Decimal::from(qty),
            slot_label: slot.map(String::from),
            is_optional: optional,
            sequence: ingredient_id as i32,
        }
    }

    fn stock(id: i64, ingredient_id: i64, qty: i64) -> InventoryRecord {
        InventoryRecord {
            id,
            event_id: 1,
            ingredient_id,
            initial_quantity: Decimal::from(qty),
            current_quantity: Decimal::from(qty),
            unit: "ml".into(),
        }
    }

    fn harness() -> Harness {
        let recipes = CatalogRecipes::new([
            Recipe {
                cocktail_id: 1,
                name: "Gin Tonic".into(),
                lines: vec![
                    line(1, 60, Some("P1"), false),
                    line(2, 5, None, true),
                    line(3, 30, Some("P7"), false),
                ],
            },
            Recipe {
                cocktail_id: 2,
                name: "Garnish".into(),
                lines: vec![line(2, 5, None, false)],
            },
        ]);
        let inventory = Arc::new(MemoryInventory::with_records([
            stock(101, 1, 200),
            stock(102, 2, 50),
            stock(103, 3, 100),
        ]));

        // offline link: every submit is queued
        let link = DeviceLink::new(
            LinkConfig::new("127.0.0.1", 9)
                .unwrap()
                .with_auto_reconnect(false),
        );
        let (fulfillment, worker) = Fulfillment::new(link);
        let shutdown = CancellationToken::new();
        tokio::spawn(worker.run(shutdown.clone()));

        let workflow = OrderWorkflow::new(
            OrderStorage::open_in_memory().unwrap(),
            Arc::new(recipes),
            InventoryLedger::new(inventory.clone()),
            fulfillment.clone(),
        );
        Harness {
            workflow,
            inventory,
            fulfillment,
            _shutdown: shutdown.drop_guard(),
        }
    }

    fn new_order(cocktail_id: i64) -> NewOrder {
        NewOrder {
            event_id: 1,
            cocktail_id,
            guest_id: Some(9),
            notes: None,
        }
    }

    fn current(h: &Harness, record_id: i64) -> Decimal {
        h.inventory.get(record_id).unwrap().current_quantity
    }

    #[tokio::test]
    async fn test_create_builds_commands_and_positions() {
        let h = harness();
        let first = h.workflow.create_order(new_order(1)).await.unwrap();
        let second = h.workflow.create_order(new_order(1)).await.unwrap();

        assert_eq!(first.status, OrderStatus::Pending);
        assert_eq!(first.commands, "P1,60,P7,30");
        assert_eq!(first.queue_position, 1);
        assert_eq!(second.queue_position, 2);
        assert_eq!(current(&h, 101), Decimal::from(200));
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_and_undispensable() {
        let h = harness();
        assert!(matches!(
            h.workflow.create_order(new_order(7)).await,
            Err(WorkflowError::RecipeNotFound(7))
        ));
        assert!(matches!(
            h.workflow.create_order(new_order(2)).await,
            Err(WorkflowError::NothingToDispense(2))
        ));
    }

    #[tokio::test]
    async fn test_process_consumes_required_lines_only() {
        let h = harness();
        let order = h.workflow.create_order(new_order(1)).await.unwrap();
        let outcome = h.workflow.process(order.id).await.unwrap();

        assert_eq!(outcome.order.status, OrderStatus::Preparing);
        assert!(outcome.order.preparation_start.is_some());
        assert_eq!(outcome.disposition, Disposition::Queued { position: 1 });
        assert_eq!(current(&h, 101), Decimal::from(140));
        assert_eq!(current(&h, 102), Decimal::from(50));
        assert_eq!(current(&h, 103), Decimal::from(70));

        let entries = h.workflow.consumption(order.id).await.unwrap();
        assert_eq!(entries.len(), 2);

        let err = h.workflow.process(order.id).await.unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidState { action: "process", .. }));
    }

    // axum handlers and background tasks need these futures to be Send
    #[tokio::test]
    async fn test_workflow_runs_on_spawned_tasks() {
        let Harness {
            workflow,
            _shutdown,
            ..
        } = harness();
        let workflow = Arc::new(workflow);

        let wf = workflow.clone();
        let order = tokio::spawn(async move { wf.create_order(new_order(1)).await })
            .await
            .unwrap()
            .unwrap();
        let wf = workflow.clone();
        let outcome = tokio::spawn(async move { wf.process(order.id).await })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.order.status, OrderStatus::Preparing);

        let wf = workflow.clone();
        let cancelled = tokio::spawn(async move { wf.cancel(order.id, None).await })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_precheck_failure_leaves_order_pending() {
        let h = harness();
        let order = h.workflow.create_order(new_order(1)).await.unwrap();
        h.inventory.consume(1, 3, Decimal::from(90)).await.unwrap();

        let err = h.workflow.process(order.id).await.unwrap_err();
        assert!(matches!(err, WorkflowError::InsufficientStock { ingredient_id: 3, .. }));
        assert_eq!(h.workflow.get(order.id).await.unwrap().status, OrderStatus::Pending);
        assert_eq!(current(&h, 101), Decimal::from(200));
        assert!(h.workflow.consumption(order.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_after_process_restores_stock_and_queue() {
        let h = harness();
        let order = h.workflow.create_order(new_order(1)).await.unwrap();
        h.workflow.process(order.id).await.unwrap();

        let cancelled = h.workflow.cancel(order.id, None).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(current(&h, 101), Decimal::from(200));
        assert_eq!(current(&h, 103), Decimal::from(100));
        assert!(h.workflow.consumption(order.id).await.unwrap().is_empty());
        assert!(h.fulfillment.status().await.unwrap().queue.is_empty());

        let err = h.workflow.cancel(order.id, None).await.unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidState { status: OrderStatus::Cancelled, .. }));
        assert_eq!(current(&h, 101), Decimal::from(200));
    }

    #[tokio::test]
    async fn test_lifecycle_to_delivered() {
        let h = harness();
        let order = h.workflow.create_order(new_order(1)).await.unwrap();
        assert!(matches!(
            h.workflow.deliver(order.id).await,
            Err(WorkflowError::InvalidState { action: "deliver", .. })
        ));

        h.workflow.process(order.id).await.unwrap();
        let ready = h.workflow.mark_ready(order.id).await.unwrap();
        assert_eq!(ready.status, OrderStatus::Ready);
        assert!(ready.preparation_end.is_some());

        let delivered = h.workflow.deliver(order.id).await.unwrap();
        assert_eq!(delivered.status, OrderStatus::Delivered);
        assert!(matches!(
            h.workflow.cancel(order.id, None).await,
            Err(WorkflowError::InvalidState { status: OrderStatus::Delivered, .. })
        ));
        // consumption stays with a delivered order
        assert_eq!(h.workflow.consumption(order.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_device_failure_cancels_preparing_order() {
        let h = harness();
        let order = h.workflow.create_order(new_order(1)).await.unwrap();
        h.workflow.process(order.id).await.unwrap();

        let failed = h
            .workflow
            .fail_from_device(order.id, Some("low_ice".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(failed.status, OrderStatus::Cancelled);
        assert_eq!(failed.cancel_reason.as_deref(), Some("device error: low_ice"));
        assert_eq!(current(&h, 101), Decimal::from(200));

        assert!(h.workflow.fail_from_device(order.id, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_event_queue_lists_open_orders() {
        let h = harness();
        let a = h.workflow.create_order(new_order(1)).await.unwrap();
        let b = h.workflow.create_order(new_order(1)).await.unwrap();
        let c = h.workflow.create_order(new_order(1)).await.unwrap();
        h.workflow.process(b.id).await.unwrap();
        h.workflow.cancel(a.id, None).await.unwrap();

        let ids: Vec<_> = h
            .workflow
            .event_queue(1)
            .await
            .unwrap()
            .iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, vec![b.id, c.id]);

        // positions are never handed out again
        let d = h.workflow.create_order(new_order(1)).await.unwrap();
        assert_eq!(d.queue_position, 4);
    }

    #[tokio::test]
    async fn test_next_pending_skips_processed_and_cancelled() {
        let h = harness();
        assert!(h.workflow.next_pending(1).await.unwrap().is_none());

        let a = h.workflow.create_order(new_order(1)).await.unwrap();
        let b = h.workflow.create_order(new_order(1)).await.unwrap();
        let c = h.workflow.create_order(new_order(1)).await.unwrap();
        assert_eq!(h.workflow.next_pending(1).await.unwrap().map(|o| o.id), Some(a.id));

        h.workflow.process(a.id).await.unwrap();
        h.workflow.cancel(b.id, None).await.unwrap();
        assert_eq!(h.workflow.next_pending(1).await.unwrap().map(|o| o.id), Some(c.id));

        // the full listing keeps every status, newest first
        let ids: Vec<_> = h
            .workflow
            .event_orders(1)
            .await
            .unwrap()
            .iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, vec![c.id, b.id, a.id]);
        assert!(h.workflow.event_orders(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_release_requires_cancelled() {
        let h = harness();
        let order = h.workflow.create_order(new_order(1)).await.unwrap();
        assert!(matches!(
            h.workflow.release_stranded(order.id).await,
            Err(WorkflowError::InvalidState { action: "release", .. })
        ));
        h.workflow.cancel(order.id, Some("guest left".into())).await.unwrap();
        assert!(h.workflow.release_stranded(order.id).await.unwrap().is_empty());
        assert!(matches!(
            h.workflow.get(99).await,
            Err(WorkflowError::OrderNotFound(99))
        ));
    }
}
