//! Side cache contract for market data, plus an in-memory TTL
//! implementation.
//!
//! Writes are last-writer-wins; readers tolerate entries up to one tick
//! stale, so expiry is checked lazily on read.

use crate::market::MarketData;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Key/value store with per-key TTL, as consumed by the core.
pub trait MarketDataCache: Send + Sync {
    /// Store the market data record for a symbol with the given TTL.
    fn set_market_data(&self, symbol: &str, data: MarketData, ttl: Duration);

    /// Fetch the market data record for a symbol, if present and live.
    fn get_market_data(&self, symbol: &str) -> Option<MarketData>;

    /// Store the bare current price for a symbol (no TTL).
    fn set_price(&self, symbol: &str, price: u128);

    /// Fetch the bare current price for a symbol.
    fn get_price(&self, symbol: &str) -> Option<u128>;
}

struct CachedRecord {
    data: MarketData,
    expires_at: Instant,
}

/// Process-local cache used by tests and single-process deployments.
#[derive(Default)]
pub struct InMemoryMarketCache {
    records: DashMap<String, CachedRecord>,
    prices: DashMap<String, u128>,
}

impl InMemoryMarketCache {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            prices: DashMap::new(),
        }
    }
}

impl MarketDataCache for InMemoryMarketCache {
    fn set_market_data(&self, symbol: &str, data: MarketData, ttl: Duration) {
        self.records.insert(
            symbol.to_string(),
            CachedRecord {
                data,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    fn get_market_data(&self, symbol: &str) -> Option<MarketData> {
        let entry = self.records.get(symbol)?;
        if entry.expires_at <= Instant::now() {
            drop(entry);
            self.records.remove(symbol);
            return None;
        }
        Some(entry.data.clone())
    }

    fn set_price(&self, symbol: &str, price: u128) {
        self.prices.insert(symbol.to_string(), price);
    }

    fn get_price(&self, symbol: &str) -> Option<u128> {
        self.prices.get(symbol).map(|entry| *entry.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(symbol: &str, price: u128) -> MarketData {
        MarketData {
            symbol: symbol.to_string(),
            current_price: price,
            previous_price: price,
            daily_high: price,
            daily_low: price,
            daily_volume: 0,
            price_change: 0,
            price_change_pct: 0.0,
            timestamp: 0,
        }
    }

    #[test]
    fn live_entries_are_returned() {
        let cache = InMemoryMarketCache::new();
        cache.set_market_data("ACME", record("ACME", 100), Duration::from_secs(60));
        assert_eq!(cache.get_market_data("ACME").unwrap().current_price, 100);
    }

    #[test]
    fn expired_entries_vanish() {
        let cache = InMemoryMarketCache::new();
        cache.set_market_data("ACME", record("ACME", 100), Duration::from_millis(0));
        assert!(cache.get_market_data("ACME").is_none());
    }

    #[test]
    fn last_writer_wins() {
        let cache = InMemoryMarketCache::new();
        cache.set_market_data("ACME", record("ACME", 100), Duration::from_secs(60));
        cache.set_market_data("ACME", record("ACME", 105), Duration::from_secs(60));
        assert_eq!(cache.get_market_data("ACME").unwrap().current_price, 105);

        cache.set_price("ACME", 105);
        assert_eq!(cache.get_price("ACME"), Some(105));
        assert_eq!(cache.get_price("NONE"), None);
    }
}
