//! Point-in-time order book snapshots with per-price aggregation.

use crate::engine::book::OrderBook;
use crate::utils::current_time_millis;
use serde::{Deserialize, Serialize};

/// One aggregated price level in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotLevel {
    /// Price in minor units.
    pub price: u128,
    /// Total resting quantity at this price.
    pub quantity: u64,
    /// Number of resting orders at this price.
    pub order_count: usize,
}

/// A consistent-enough view of one book: both sides aggregated by price,
/// best price first. Readers tolerate being one write behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    /// The symbol this snapshot belongs to.
    pub symbol: String,
    /// Capture time, epoch milliseconds.
    pub timestamp: u64,
    /// Bid levels, highest price first.
    pub bids: Vec<SnapshotLevel>,
    /// Ask levels, lowest price first.
    pub asks: Vec<SnapshotLevel>,
}

impl OrderBookSnapshot {
    /// An empty snapshot for a symbol with no book yet.
    #[must_use]
    pub fn empty(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            timestamp: current_time_millis(),
            bids: Vec::new(),
            asks: Vec::new(),
        }
    }
}

impl OrderBook {
    /// Capture both sides of the book, aggregated per price, best first.
    #[must_use]
    pub fn snapshot(&self) -> OrderBookSnapshot {
        let bids = self
            .bids
            .iter()
            .rev()
            .map(|entry| SnapshotLevel {
                price: *entry.key(),
                quantity: entry.value().total_quantity(),
                order_count: entry.value().order_count(),
            })
            .filter(|level| level.quantity > 0)
            .collect();

        let asks = self
            .asks
            .iter()
            .map(|entry| SnapshotLevel {
                price: *entry.key(),
                quantity: entry.value().total_quantity(),
                order_count: entry.value().order_count(),
            })
            .filter(|level| level.quantity > 0)
            .collect();

        OrderBookSnapshot {
            symbol: self.symbol().to_string(),
            timestamp: current_time_millis(),
            bids,
            asks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::order::Side;
    use uuid::Uuid;

    #[test]
    fn snapshot_aggregates_per_price() {
        let book = OrderBook::new("ACME");
        book.rest(Uuid::new_v4(), Side::Buy, 100, 0, 10);
        book.rest(Uuid::new_v4(), Side::Buy, 100, 1, 5);
        book.rest(Uuid::new_v4(), Side::Buy, 99, 2, 7);
        book.rest(Uuid::new_v4(), Side::Sell, 101, 3, 3);

        let snap = book.snapshot();
        assert_eq!(snap.symbol, "ACME");
        assert_eq!(snap.bids.len(), 2);
        // Best bid first.
        assert_eq!(snap.bids[0].price, 100);
        assert_eq!(snap.bids[0].quantity, 15);
        assert_eq!(snap.bids[0].order_count, 2);
        assert_eq!(snap.bids[1].price, 99);
        assert_eq!(snap.asks.len(), 1);
        assert_eq!(snap.asks[0].price, 101);
    }

    #[test]
    fn snapshot_serializes() {
        let book = OrderBook::new("ACME");
        book.rest(Uuid::new_v4(), Side::Sell, 101, 0, 3);
        let json = serde_json::to_string(&book.snapshot()).unwrap();
        let back: OrderBookSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.asks[0].quantity, 3);
    }
}
