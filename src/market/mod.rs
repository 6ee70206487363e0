//! Synthetic market data: per-symbol price state, the price/volume model,
//! the side cache contract, and the service that publishes ticks to the bus.

mod cache;
mod error;
mod generator;
mod service;
mod state;
mod volume;

pub use cache::{InMemoryMarketCache, MarketDataCache};
pub use error::MarketDataError;
pub use generator::{MarketDataGenerator, MarketModelConfig, PriceUpdate, VolatilityPattern};
pub use service::MarketDataService;
pub use state::PricePoint;

use serde::{Deserialize, Serialize};

/// Per-symbol market data snapshot, as published on the bus and stored in
/// the side cache.
///
/// Within one trading day `daily_high >= current_price >= daily_low`; the
/// day rollover resets the aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    /// The symbol this record describes.
    pub symbol: String,
    /// Latest price in minor units.
    pub current_price: u128,
    /// Price before the latest tick.
    pub previous_price: u128,
    /// Highest price seen this trading day.
    pub daily_high: u128,
    /// Lowest price seen this trading day.
    pub daily_low: u128,
    /// Cumulative traded volume this trading day.
    pub daily_volume: u64,
    /// `current_price - previous_price`, minor units.
    pub price_change: i128,
    /// `(current - previous) / previous * 100`.
    pub price_change_pct: f64,
    /// Record time, epoch milliseconds.
    pub timestamp: u64,
}
