//! Persistence contracts consumed by the engine, plus in-memory
//! implementations used by tests and demos.
//!
//! The engine writes every trade once and every order state transition as it
//! happens. A failed write is surfaced to the caller; it never silently
//! succeeds.

use crate::engine::{Order, OrderId, Trade, TradeId};
use dashmap::DashMap;
use thiserror::Error;

/// Failure of a repository backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend refused or lost the write.
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Order persistence operations consumed by the engine.
pub trait OrderRepository: Send + Sync {
    /// Persist a newly admitted order.
    fn create(&self, order: &Order) -> Result<(), StorageError>;

    /// Persist an order state transition.
    fn update(&self, order: &Order) -> Result<(), StorageError>;

    /// Fetch an order by id.
    fn get(&self, id: OrderId) -> Result<Option<Order>, StorageError>;

    /// All orders whose status is not terminal.
    fn get_active(&self) -> Result<Vec<Order>, StorageError>;

    /// All orders for one symbol.
    fn get_by_symbol(&self, symbol: &str) -> Result<Vec<Order>, StorageError>;
}

/// Trade persistence operations consumed by the engine. Trades are
/// write-once; there is no update.
pub trait TradeRepository: Send + Sync {
    /// Persist an executed trade.
    fn create(&self, trade: &Trade) -> Result<(), StorageError>;

    /// Fetch a trade by id.
    fn get(&self, id: TradeId) -> Result<Option<Trade>, StorageError>;

    /// All trades for one symbol, in insertion order.
    fn get_by_symbol(&self, symbol: &str) -> Result<Vec<Trade>, StorageError>;
}

/// Map-backed order repository.
#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: DashMap<OrderId, Order>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored orders.
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

impl OrderRepository for InMemoryOrderRepository {
    fn create(&self, order: &Order) -> Result<(), StorageError> {
        self.orders.insert(order.id, order.clone());
        Ok(())
    }

    fn update(&self, order: &Order) -> Result<(), StorageError> {
        self.orders.insert(order.id, order.clone());
        Ok(())
    }

    fn get(&self, id: OrderId) -> Result<Option<Order>, StorageError> {
        Ok(self.orders.get(&id).map(|entry| entry.value().clone()))
    }

    fn get_active(&self) -> Result<Vec<Order>, StorageError> {
        Ok(self
            .orders
            .iter()
            .filter(|entry| entry.value().is_active())
            .map(|entry| entry.value().clone())
            .collect())
    }

    fn get_by_symbol(&self, symbol: &str) -> Result<Vec<Order>, StorageError> {
        Ok(self
            .orders
            .iter()
            .filter(|entry| entry.value().symbol == symbol)
            .map(|entry| entry.value().clone())
            .collect())
    }
}

/// Vec-backed trade repository preserving insertion order per symbol.
#[derive(Default)]
pub struct InMemoryTradeRepository {
    trades: DashMap<TradeId, Trade>,
    by_symbol: DashMap<String, Vec<TradeId>>,
}

impl InMemoryTradeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored trades.
    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }
}

impl TradeRepository for InMemoryTradeRepository {
    fn create(&self, trade: &Trade) -> Result<(), StorageError> {
        self.trades.insert(trade.id, trade.clone());
        self.by_symbol
            .entry(trade.symbol.clone())
            .or_default()
            .push(trade.id);
        Ok(())
    }

    fn get(&self, id: TradeId) -> Result<Option<Trade>, StorageError> {
        Ok(self.trades.get(&id).map(|entry| entry.value().clone()))
    }

    fn get_by_symbol(&self, symbol: &str) -> Result<Vec<Trade>, StorageError> {
        let Some(ids) = self.by_symbol.get(symbol) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| self.trades.get(id).map(|entry| entry.value().clone()))
            .collect())
    }
}
