//! The market data service: turns generator ticks into cached
//! [`MarketData`] records and bus events.

use crate::bus::{Event, EventBus, EventPayload};
use crate::market::MarketData;
use crate::market::cache::MarketDataCache;
use crate::market::error::MarketDataError;
use crate::market::generator::{MarketDataGenerator, VolatilityPattern};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Component name stamped as the `source` of published events.
const SOURCE: &str = "market-data";

/// Publishes price and market data for every symbol the generator knows.
pub struct MarketDataService {
    generator: Arc<MarketDataGenerator>,
    cache: Arc<dyn MarketDataCache>,
    bus: Arc<EventBus>,
    cache_ttl: Duration,
}

impl MarketDataService {
    pub fn new(
        generator: Arc<MarketDataGenerator>,
        cache: Arc<dyn MarketDataCache>,
        bus: Arc<EventBus>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            generator,
            cache,
            bus,
            cache_ttl,
        }
    }

    /// The generator driving this service.
    pub fn generator(&self) -> &Arc<MarketDataGenerator> {
        &self.generator
    }

    /// Tick one symbol: generate a price, derive the change fields against
    /// the cached previous record, write the cache, publish
    /// `price.updated` and `market.data`.
    pub fn publish_tick(&self, symbol: &str) -> Result<MarketData, MarketDataError> {
        let update = self.generator.generate_price(symbol)?;

        // The cached record may lag by one tick; fall back to the
        // generator's own previous price when the cache is cold.
        let previous_price = self
            .cache
            .get_market_data(symbol)
            .map(|record| record.current_price)
            .unwrap_or(update.previous_price);

        let price_change = update.price as i128 - previous_price as i128;
        let price_change_pct = if previous_price > 0 {
            price_change as f64 / previous_price as f64 * 100.0
        } else {
            0.0
        };

        let data = MarketData {
            symbol: symbol.to_string(),
            current_price: update.price,
            previous_price,
            daily_high: update.daily_high,
            daily_low: update.daily_low,
            daily_volume: update.daily_volume,
            price_change,
            price_change_pct,
            timestamp: update.timestamp,
        };

        self.cache
            .set_market_data(symbol, data.clone(), self.cache_ttl);
        self.cache.set_price(symbol, update.price);

        self.bus.publish(Event::new(
            SOURCE,
            EventPayload::PriceUpdated {
                symbol: symbol.to_string(),
                price: update.price,
                previous_price,
            },
        ));
        self.bus.publish(Event::new(
            SOURCE,
            EventPayload::MarketData { data: data.clone() },
        ));

        Ok(data)
    }

    /// Inject volatility and publish `volatility.injected`.
    pub fn inject_volatility(
        &self,
        symbol: &str,
        pattern: VolatilityPattern,
        intensity: f64,
    ) -> Result<f64, MarketDataError> {
        let volatility = self
            .generator
            .simulate_volatility(symbol, pattern, intensity)?;
        self.bus.publish(Event::new(
            SOURCE,
            EventPayload::VolatilityInjected {
                symbol: symbol.to_string(),
                pattern: pattern.to_string(),
                intensity,
                volatility,
            },
        ));
        Ok(volatility)
    }

    /// Tick every known symbol once. A failing symbol is logged and does
    /// not stop the others.
    pub fn tick_all(&self) {
        for symbol in self.generator.symbols() {
            if let Err(err) = self.publish_tick(&symbol) {
                warn!(%symbol, %err, "tick failed; continuing");
            }
        }
    }

    /// Tick loop: one pass over all symbols every `interval`, until
    /// cancelled.
    pub async fn run(&self, interval: Duration, cancel: CancellationToken) {
        info!(?interval, "market data service started");
        self.bus.publish(Event::new(
            SOURCE,
            EventPayload::SystemStatus {
                component: SOURCE.to_string(),
                status: "started".to_string(),
            },
        ));

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.tick_all(),
            }
        }

        debug!("market data service draining");
        self.bus.publish(Event::new(
            SOURCE,
            EventPayload::SystemStatus {
                component: SOURCE.to_string(),
                status: "stopped".to_string(),
            },
        ));
        info!("market data service stopped");
    }
}
