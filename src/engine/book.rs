//! Per-symbol order book: two price-ordered sides of resting limit orders.

use crate::engine::level::PriceLevel;
use crate::engine::order::{OrderId, Side};
use crossbeam::atomic::AtomicCell;
use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::trace;

/// The order book for one symbol.
///
/// Sides are `SkipMap`s keyed by price, so price priority falls out of the
/// map's ordering: best bid is the last bid key, best ask the first ask key.
/// Snapshot readers walk the sides lock-free; every mutation (matching,
/// resting, cancellation) happens under the per-symbol [`write gate`],
/// which is what makes a `place_order` cycle observable as a single step.
///
/// [`write gate`]: OrderBook::write_gate
pub struct OrderBook {
    symbol: String,

    /// Bid-side price levels, ascending by price (best bid is last).
    pub(super) bids: SkipMap<u128, Arc<PriceLevel>>,

    /// Ask-side price levels, ascending by price (best ask is first).
    pub(super) asks: SkipMap<u128, Arc<PriceLevel>>,

    /// Order id to `(price, side)` for O(1) cancellation lookups.
    pub(super) order_locations: DashMap<OrderId, (u128, Side)>,

    /// The price of the most recent trade on this book.
    last_trade_price: AtomicCell<u128>,

    /// Whether any trade has printed yet.
    has_traded: AtomicBool,

    /// Per-symbol admission counter; assigns the time-priority tiebreak.
    admission_seq: AtomicU64,

    /// Serializes matching, resting and cancellation for this symbol.
    write_gate: Mutex<()>,
}

impl OrderBook {
    /// Create an empty book for the given symbol.
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            bids: SkipMap::new(),
            asks: SkipMap::new(),
            order_locations: DashMap::new(),
            last_trade_price: AtomicCell::new(0),
            has_traded: AtomicBool::new(false),
            admission_seq: AtomicU64::new(0),
            write_gate: Mutex::new(()),
        }
    }

    /// The symbol this book belongs to.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Acquire the per-symbol write gate.
    ///
    /// Held for the whole of one matching cycle or cancellation, never
    /// across two symbols.
    pub(super) fn gate(&self) -> MutexGuard<'_, ()> {
        self.write_gate.lock().expect("book gate poisoned")
    }

    /// Next admission sequence number for this symbol.
    pub(super) fn next_seq(&self) -> u64 {
        self.admission_seq.fetch_add(1, Ordering::AcqRel)
    }

    /// Best (highest) bid price, if any.
    #[must_use]
    pub fn best_bid(&self) -> Option<u128> {
        self.bids.iter().next_back().map(|entry| *entry.key())
    }

    /// Best (lowest) ask price, if any.
    #[must_use]
    pub fn best_ask(&self) -> Option<u128> {
        self.asks.iter().next().map(|entry| *entry.key())
    }

    /// Mid price (average of best bid and best ask), if both sides exist.
    #[must_use]
    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid as f64 + ask as f64) / 2.0),
            _ => None,
        }
    }

    /// Spread (best ask minus best bid), if both sides exist.
    #[must_use]
    pub fn spread(&self) -> Option<u128> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.saturating_sub(bid)),
            _ => None,
        }
    }

    /// The price of the most recent trade, if any trade has printed.
    #[must_use]
    pub fn last_trade_price(&self) -> Option<u128> {
        if self.has_traded.load(Ordering::Acquire) {
            Some(self.last_trade_price.load())
        } else {
            None
        }
    }

    pub(super) fn record_trade_price(&self, price: u128) {
        self.last_trade_price.store(price);
        self.has_traded.store(true, Ordering::Release);
    }

    /// Whether the given order currently rests on this book.
    pub fn contains(&self, id: OrderId) -> bool {
        self.order_locations.contains_key(&id)
    }

    /// Rest a limit order on its side. Caller holds the write gate.
    pub(super) fn rest(&self, id: OrderId, side: Side, price: u128, seq: u64, quantity: u64) {
        let levels = match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        };
        let entry = levels.get_or_insert_with(price, || Arc::new(PriceLevel::new(price)));
        entry.value().push_back(id, seq, quantity);
        self.order_locations.insert(id, (price, side));
        trace!(
            symbol = %self.symbol,
            order_id = %id,
            %side,
            price,
            quantity,
            "order resting on book"
        );
    }

    /// Remove a resting order, returning its remaining quantity.
    /// Caller holds the write gate. `None` if the order is not on the book.
    pub(super) fn remove(&self, id: OrderId) -> Option<u64> {
        let (price, side) = *self.order_locations.get(&id)?.value();
        let levels = match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        };
        let level = levels.get(&price)?;
        let remaining = level.value().remove(id)?;
        if level.value().is_empty() {
            level.remove();
        }
        self.order_locations.remove(&id);
        trace!(symbol = %self.symbol, order_id = %id, remaining, "order removed from book");
        Some(remaining)
    }

    /// Total resting quantity on one side, across all levels.
    #[must_use]
    pub fn depth(&self, side: Side) -> u64 {
        let levels = match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        };
        levels
            .iter()
            .map(|entry| entry.value().total_quantity())
            .sum()
    }
}
