//! Inventory store
//!
//! [`InventoryStore`] is the seam to whatever owns raw inventory records.
//! [`MemoryInventory`] keeps them in a `DashMap`; every check-and-deduct or
//! restock on one record runs under that record's entry lock.

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use shared::models::{EventId, IngredientId, InventoryRecord, InventoryRecordId};

use super::error::{InventoryError, InventoryResult};

#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Stock record for an ingredient at an event
    async fn find(&self, event_id: EventId, ingredient_id: IngredientId)
    -> Option<InventoryRecord>;

    /// Deduct `quantity` if enough is left; returns the updated record
    async fn consume(
        &self,
        event_id: EventId,
        ingredient_id: IngredientId,
        quantity: Decimal,
    ) -> InventoryResult<InventoryRecord>;

    /// Add `quantity` back to a record; returns the updated record
    async fn restock(
        &self,
        record_id: InventoryRecordId,
        quantity: Decimal,
    ) -> InventoryResult<InventoryRecord>;

    async fn records_for_event(&self, event_id: EventId) -> Vec<InventoryRecord>;
}

fn ensure_non_negative(quantity: Decimal) -> InventoryResult<()> {
    if quantity.is_sign_negative() {
        return Err(InventoryError::InvalidQuantity(quantity));
    }
    Ok(())
}

/// In-process inventory
#[derive(Debug, Default)]
pub struct MemoryInventory {
    records: DashMap<InventoryRecordId, InventoryRecord>,
    index: DashMap<(EventId, IngredientId), InventoryRecordId>,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = InventoryRecord>) -> Self {
        let inventory = Self::new();
        for record in records {
            inventory.insert(record);
        }
        inventory
    }

    /// Insert or replace a record
    pub fn insert(&self, record: InventoryRecord) {
        self.index
            .insert((record.event_id, record.ingredient_id), record.id);
        self.records.insert(record.id, record);
    }

    pub fn get(&self, record_id: InventoryRecordId) -> Option<InventoryRecord> {
        self.records.get(&record_id).map(|r| r.value().clone())
    }

    fn record_id(&self, event_id: EventId, ingredient_id: IngredientId) -> Option<InventoryRecordId> {
        self.index
            .get(&(event_id, ingredient_id))
            .map(|id| *id.value())
    }
}

#[async_trait]
impl InventoryStore for MemoryInventory {
    async fn find(
        &self,
        event_id: EventId,
        ingredient_id: IngredientId,
    ) -> Option<InventoryRecord> {
        self.record_id(event_id, ingredient_id)
            .and_then(|id| self.get(id))
    }

    async fn consume(
        &self,
        event_id: EventId,
        ingredient_id: IngredientId,
        quantity: Decimal,
    ) -> InventoryResult<InventoryRecord> {
        ensure_non_negative(quantity)?;
        let not_stocked = InventoryError::NotStocked {
            event_id,
            ingredient_id,
        };
        let id = self.record_id(event_id, ingredient_id).ok_or(not_stocked.clone())?;
        let mut record = self.records.get_mut(&id).ok_or(not_stocked)?;

        if record.current_quantity < quantity {
            return Err(InventoryError::InsufficientStock {
                ingredient_id,
                required: quantity,
                available: record.current_quantity,
            });
        }
        record.current_quantity -= quantity;
        Ok(record.clone())
    }

    async fn restock(
        &self,
        record_id: InventoryRecordId,
        quantity: Decimal,
    ) -> InventoryResult<InventoryRecord> {
        ensure_non_negative(quantity)?;
        let mut record = self
            .records
            .get_mut(&record_id)
            .ok_or(InventoryError::RecordNotFound(record_id))?;
        record.current_quantity += quantity;
        record.initial_quantity += quantity;
        Ok(record.clone())
    }

    async fn records_for_event(&self, event_id: EventId) -> Vec<InventoryRecord> {
        let mut records: Vec<InventoryRecord> = self
            .records
            .iter()
            .filter(|r| r.event_id == event_id)
            .map(|r| r.value().clone())
            .collect();
        records.sort_by_key(|r| r.id);
        records
    }
}
