//! Inventory ledger
//!
//! Applies and reverses ingredient consumption for orders. Every mutation is
//! written to the audit log.

use rust_decimal::Decimal;
use shared::models::{ConsumptionEntry, EventId, IngredientId, OrderId, RecipeLine};
use shared::util::now_millis;
use std::sync::Arc;
use tracing::instrument;

use super::error::{InventoryError, InventoryResult};
use super::store::InventoryStore;
use crate::audit_log;

#[derive(Clone)]
pub struct InventoryLedger {
    store: Arc<dyn InventoryStore>,
}

impl InventoryLedger {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    /// Check every line against current stock without mutating anything.
    ///
    /// Fails on the first line that cannot be served; an ingredient with no
    /// stock record counts as zero available.
    pub async fn check_availability(
        &self,
        event_id: EventId,
        lines: &[RecipeLine],
    ) -> InventoryResult<()> {
        for line in lines {
            let available = self
                .store
                .find(event_id, line.ingredient_id)
                .await
                .map(|r| r.current_quantity)
                .unwrap_or(Decimal::ZERO);
            if available < line.quantity {
                return Err(InventoryError::InsufficientStock {
                    ingredient_id: line.ingredient_id,
                    required: line.quantity,
                    available,
                });
            }
        }
        Ok(())
    }

    /// Deduct one ingredient for an order and describe what was taken
    #[instrument(skip(self), fields(quantity = %quantity))]
    pub async fn consume(
        &self,
        order_id: OrderId,
        event_id: EventId,
        ingredient_id: IngredientId,
        quantity: Decimal,
    ) -> InventoryResult<ConsumptionEntry> {
        let record = self.store.consume(event_id, ingredient_id, quantity).await?;
        audit_log!(
            "consume",
            "inventory",
            order_id = order_id,
            record_id = record.id,
            ingredient_id = ingredient_id,
            quantity = %quantity,
            remaining = %record.current_quantity,
            "Ingredient consumed"
        );

        Ok(ConsumptionEntry {
            order_id,
            ingredient_id,
            inventory_record_id: record.id,
            quantity_used: quantity,
            consumed_at: now_millis(),
        })
    }

    /// Put a consumed quantity back on the record it came from
    #[instrument(skip(self, entry), fields(order_id = entry.order_id, record_id = entry.inventory_record_id))]
    pub async fn restock(&self, entry: &ConsumptionEntry) -> InventoryResult<()> {
        let record = self
            .store
            .restock(entry.inventory_record_id, entry.quantity_used)
            .await?;
        audit_log!(
            "restock",
            "inventory",
            order_id = entry.order_id,
            record_id = record.id,
            ingredient_id = entry.ingredient_id,
            quantity = %entry.quantity_used,
            remaining = %record.current_quantity,
            "Ingredient restocked"
        );
        Ok(())
    }
}
