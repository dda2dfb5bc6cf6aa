//! redb-based order storage
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders` | `order_id` | `Order` (JSON) | Order records |
//! | `event_orders` | `(event_id, order_id)` | `()` | Orders per event |
//! | `consumption` | `(order_id, index)` | `ConsumptionEntry` (JSON) | Ingredients taken for an order |
//! | `queue_position` | `event_id` | `i64` | Highest queue position handed out |
//! | `sequence_counter` | `"order_id"` | `u64` | Order id allocator |
//!
//! Queue positions come from the per-event high-water mark, so a position is
//! never handed out twice, even after every order of the event finished.

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};
use shared::models::{ConsumptionEntry, EventId, Order, OrderId};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

const ORDERS_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("orders");

const EVENT_ORDERS_TABLE: TableDefinition<(i64, i64), ()> = TableDefinition::new("event_orders");

const CONSUMPTION_TABLE: TableDefinition<(i64, u32), &[u8]> = TableDefinition::new("consumption");

const QUEUE_POSITION_TABLE: TableDefinition<i64, i64> = TableDefinition::new("queue_position");

const SEQUENCE_TABLE: TableDefinition<&str, u64> = TableDefinition::new("sequence_counter");

const ORDER_ID_KEY: &str = "order_id";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Clone)]
pub struct OrderStorage {
    db: Arc<Database>,
}

impl OrderStorage {
    /// Open or create the database file
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::init(Database::create(path)?)
    }

    /// Volatile database, nothing touches disk
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::init(Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let txn = db.begin_write()?;
        {
            let _ = txn.open_table(ORDERS_TABLE)?;
            let _ = txn.open_table(EVENT_ORDERS_TABLE)?;
            let _ = txn.open_table(CONSUMPTION_TABLE)?;
            let _ = txn.open_table(QUEUE_POSITION_TABLE)?;
            let _ = txn.open_table(SEQUENCE_TABLE)?;
        }
        txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    // ========== Counters ==========

    pub fn next_order_id(&self, txn: &WriteTransaction) -> StorageResult<OrderId> {
        let mut table = txn.open_table(SEQUENCE_TABLE)?;
        let next = table.get(ORDER_ID_KEY)?.map(|g| g.value()).unwrap_or(0) + 1;
        table.insert(ORDER_ID_KEY, next)?;
        Ok(next as OrderId)
    }

    /// Allocate the next queue position for an event
    pub fn next_queue_position(
        &self,
        txn: &WriteTransaction,
        event_id: EventId,
    ) -> StorageResult<i64> {
        let mut table = txn.open_table(QUEUE_POSITION_TABLE)?;
        let next = table.get(event_id)?.map(|g| g.value()).unwrap_or(0) + 1;
        table.insert(event_id, next)?;
        Ok(next)
    }

    // ========== Orders ==========

    pub fn put_order(&self, txn: &WriteTransaction, order: &Order) -> StorageResult<()> {
        let value = serde_json::to_vec(order)?;
        txn.open_table(ORDERS_TABLE)?
            .insert(order.id, value.as_slice())?;
        txn.open_table(EVENT_ORDERS_TABLE)?
            .insert((order.event_id, order.id), ())?;
        Ok(())
    }

    /// Persist one order in its own transaction
    pub fn save_order(&self, order: &Order) -> StorageResult<()> {
        let txn = self.begin_write()?;
        self.put_order(&txn, order)?;
        txn.commit()?;
        Ok(())
    }

    pub fn get_order(&self, order_id: OrderId) -> StorageResult<Option<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        match table.get(order_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Every order of an event, by queue position
    pub fn orders_for_event(&self, event_id: EventId) -> StorageResult<Vec<Order>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(EVENT_ORDERS_TABLE)?;
        let orders = read_txn.open_table(ORDERS_TABLE)?;

        let mut result = Vec::new();
        for entry in index.range((event_id, i64::MIN)..=(event_id, i64::MAX))? {
            let (key, _) = entry?;
            let (_, order_id) = key.value();
            if let Some(value) = orders.get(order_id)? {
                result.push(serde_json::from_slice::<Order>(value.value())?);
            }
        }
        result.sort_by_key(|o| o.queue_position);
        Ok(result)
    }

    // ========== Consumption ==========

    pub fn add_consumption(
        &self,
        txn: &WriteTransaction,
        entry: &ConsumptionEntry,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(CONSUMPTION_TABLE)?;
        let order_id = entry.order_id;
        let next_index = match table.range((order_id, 0u32)..=(order_id, u32::MAX))?.next_back() {
            Some(last) => last?.0.value().1 + 1,
            None => 0,
        };
        let value = serde_json::to_vec(entry)?;
        table.insert((order_id, next_index), value.as_slice())?;
        Ok(())
    }

    /// Record one consumption entry in its own transaction
    pub fn record_consumption(&self, entry: &ConsumptionEntry) -> StorageResult<()> {
        let txn = self.begin_write()?;
        self.add_consumption(&txn, entry)?;
        txn.commit()?;
        Ok(())
    }

    /// Entries in the order they were recorded
    pub fn consumption_for_order(&self, order_id: OrderId) -> StorageResult<Vec<ConsumptionEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CONSUMPTION_TABLE)?;

        let mut entries = Vec::new();
        for entry in table.range((order_id, 0u32)..=(order_id, u32::MAX))? {
            let (_, value) = entry?;
            entries.push(serde_json::from_slice(value.value())?);
        }
        Ok(entries)
    }

    /// Delete and return every entry of an order
    pub fn remove_consumption(
        &self,
        txn: &WriteTransaction,
        order_id: OrderId,
    ) -> StorageResult<Vec<ConsumptionEntry>> {
        let mut table = txn.open_table(CONSUMPTION_TABLE)?;

        let mut entries = Vec::new();
        let mut keys = Vec::new();
        for entry in table.range((order_id, 0u32)..=(order_id, u32::MAX))? {
            let (key, value) = entry?;
            entries.push(serde_json::from_slice(value.value())?);
            keys.push(key.value());
        }
        for key in keys {
            table.remove(key)?;
        }
        Ok(entries)
    }
}
