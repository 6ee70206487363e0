//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use exchange_rs::prelude::*;
use std::sync::Arc;

/// An engine over in-memory stores and a fresh bus.
pub fn engine() -> (Arc<MatchingEngine>, Arc<EventBus>) {
    let bus = Arc::new(EventBus::new());
    let engine = Arc::new(MatchingEngine::new(
        Arc::new(InMemoryOrderRepository::new()),
        Arc::new(InMemoryTradeRepository::new()),
        Arc::clone(&bus),
    ));
    (engine, bus)
}

/// Place a limit order and return its placement.
pub fn limit(
    engine: &MatchingEngine,
    user: &str,
    symbol: &str,
    side: Side,
    quantity: u64,
    price: u128,
) -> Placement {
    engine
        .place_order(OrderRequest::limit(user, symbol, side, quantity, price))
        .expect("limit admission failed")
}

/// Place a market order and return its placement.
pub fn market(
    engine: &MatchingEngine,
    user: &str,
    symbol: &str,
    side: Side,
    quantity: u64,
) -> Placement {
    engine
        .place_order(OrderRequest::market(user, symbol, side, quantity))
        .expect("market admission failed")
}
