//! The order-flow simulator: drives simulated users, buffers their orders
//! and batch-submits to the engine under the adaptive throttle.

use crate::bus::{Event, EventBus, EventPayload, EventType, handler};
use crate::engine::{MatchingEngine, OrderRequest};
use crate::market::MarketDataCache;
use crate::sim::orders::OrderGenerator;
use crate::sim::throttle::AdaptiveThrottle;
use crate::sim::users::{UserPool, UserSession};
use dashmap::DashMap;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Component name stamped as the `source` of published events.
const SOURCE: &str = "flow-simulator";

/// Simulator tuning knobs.
#[derive(Debug, Clone)]
pub struct FlowSimulatorConfig {
    /// Symbols to generate flow for.
    pub symbols: Vec<String>,
    /// Flush the buffer when it reaches this size.
    pub batch_size: usize,
    /// Flush a non-empty buffer after this long regardless of size.
    pub batch_interval: Duration,
    /// Bound on the order buffer; overflow drops the order.
    pub buffer_capacity: usize,
    /// Cadence of the generation loop.
    pub generation_interval: Duration,
    /// Baseline submission rate feeding the adaptive throttle, per second.
    pub base_rate: f64,
    /// Hard cap on generated orders per minute.
    pub max_orders_per_minute: u64,
    /// Upper bound accepted by [`FlowSimulator::set_order_rate`].
    pub max_orders_per_second: f64,
    /// Bound on concurrent simulated users.
    pub max_users: usize,
    /// Default per-symbol generation rate, orders per second.
    pub default_order_rate: f64,
    /// Trades at or above this quantity count as large for momentum
    /// reactions.
    pub large_trade_quantity: u64,
    /// Price quantization used for generated limit and stop prices.
    pub price_step: u128,
}

impl Default for FlowSimulatorConfig {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            batch_size: 10,
            batch_interval: Duration::from_secs(1),
            buffer_capacity: 100,
            generation_interval: Duration::from_millis(200),
            base_rate: 10.0,
            max_orders_per_minute: 600,
            max_orders_per_second: 50.0,
            max_users: 25,
            default_order_rate: 2.0,
            large_trade_quantity: 100,
            price_step: 1,
        }
    }
}

/// Errors surfaced by the simulator's control surface.
#[derive(Debug, Error)]
pub enum SimulatorError {
    /// The requested per-symbol rate is outside `[0, max]`.
    #[error("order rate {rate} outside [0, {max}]")]
    RateOutOfRange {
        /// The rejected rate.
        rate: f64,
        /// The configured upper bound.
        max: f64,
    },
}

struct MinuteWindow {
    start: Instant,
    count: u64,
}

/// Generates, buffers and submits simulated order flow.
pub struct FlowSimulator {
    cfg: FlowSimulatorConfig,
    engine: Arc<MatchingEngine>,
    bus: Arc<EventBus>,
    cache: Arc<dyn MarketDataCache>,
    throttle: Arc<AdaptiveThrottle>,
    users: UserPool,
    order_gen: OrderGenerator,
    buffer: Mutex<Vec<OrderRequest>>,
    last_flush: Mutex<Instant>,
    target_rates: DashMap<String, f64>,
    quotas: DashMap<String, f64>,
    minute: Mutex<MinuteWindow>,
    rng: Mutex<StdRng>,
    submitted: AtomicU64,
    dropped: AtomicU64,
}

impl FlowSimulator {
    pub fn new(
        cfg: FlowSimulatorConfig,
        engine: Arc<MatchingEngine>,
        bus: Arc<EventBus>,
        cache: Arc<dyn MarketDataCache>,
    ) -> Self {
        let throttle = Arc::new(AdaptiveThrottle::new(cfg.base_rate));
        let order_gen = OrderGenerator::new(cfg.price_step);
        let users = UserPool::new(cfg.max_users);
        Self {
            throttle,
            users,
            order_gen,
            buffer: Mutex::new(Vec::new()),
            last_flush: Mutex::new(Instant::now()),
            target_rates: DashMap::new(),
            quotas: DashMap::new(),
            minute: Mutex::new(MinuteWindow {
                start: Instant::now(),
                count: 0,
            }),
            rng: Mutex::new(StdRng::from_os_rng()),
            submitted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            engine,
            bus,
            cache,
            cfg,
        }
    }

    /// Seeded variant for reproducible tests.
    pub fn with_seed(
        cfg: FlowSimulatorConfig,
        engine: Arc<MatchingEngine>,
        bus: Arc<EventBus>,
        cache: Arc<dyn MarketDataCache>,
        seed: u64,
    ) -> Self {
        let mut simulator = Self::new(cfg, engine, bus, cache);
        simulator.rng = Mutex::new(StdRng::seed_from_u64(seed));
        simulator
    }

    /// The throttle governing this simulator's submissions.
    pub fn throttle(&self) -> &Arc<AdaptiveThrottle> {
        &self.throttle
    }

    /// Update the target generation rate for one symbol.
    ///
    /// Rejected when `rate` falls outside `[0, max_orders_per_second]`.
    pub fn set_order_rate(&self, symbol: &str, rate: f64) -> Result<(), SimulatorError> {
        if !(0.0..=self.cfg.max_orders_per_second).contains(&rate) || !rate.is_finite() {
            return Err(SimulatorError::RateOutOfRange {
                rate,
                max: self.cfg.max_orders_per_second,
            });
        }
        self.target_rates.insert(symbol.to_string(), rate);
        info!(symbol, rate, "order rate updated");
        Ok(())
    }

    /// Orders handed to the engine so far.
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Orders dropped on buffer overflow or the minute cap so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Orders currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.lock().expect("buffer lock poisoned").len()
    }

    /// Live simulated sessions.
    pub fn active_users(&self) -> usize {
        self.users.len()
    }

    /// One pass of the generation loop: age the user pool, then, if the
    /// downstream looks healthy, emit each symbol's accrued order quota.
    pub fn generation_pass(&self) {
        {
            let mut rng = self.rng.lock().expect("simulator rng poisoned");
            self.users.tick(&mut *rng);
        }

        if !self.throttle.is_healthy() {
            trace!("downstream unhealthy; generation skipped");
            return;
        }

        let dt = self.cfg.generation_interval.as_secs_f64();
        for symbol in self.cfg.symbols.clone() {
            let rate = self
                .target_rates
                .get(&symbol)
                .map(|entry| *entry.value())
                .unwrap_or(self.cfg.default_order_rate);
            let mut quota = self.quotas.entry(symbol.clone()).or_insert(0.0);
            *quota += rate * dt;

            while *quota >= 1.0 {
                *quota -= 1.0;
                if !self.reserve_minute_slot() {
                    // Cap reached; quota beyond the cap is forfeited until
                    // the minute resets.
                    *quota = 0.0;
                    break;
                }
                self.generate_one(&symbol);
            }
        }
    }

    fn generate_one(&self, symbol: &str) {
        let Some(price) = self.cache.get_price(symbol) else {
            trace!(symbol, "no cached price; nothing generated");
            return;
        };
        let mut rng = self.rng.lock().expect("simulator rng poisoned");
        let Some(session) = self.users.sample(&mut *rng) else {
            return;
        };
        let request =
            self.order_gen
                .generate(&mut *rng, &session.user_id, session.behavior, symbol, price);
        drop(rng);
        self.enqueue(request);
    }

    /// Append to the bounded buffer. Overflow drops the order and counts
    /// a throttle error so backpressure feeds the rate controller.
    fn enqueue(&self, request: OrderRequest) {
        let mut buffer = self.buffer.lock().expect("buffer lock poisoned");
        if buffer.len() >= self.cfg.buffer_capacity {
            drop(buffer);
            self.dropped.fetch_add(1, Ordering::Relaxed);
            self.throttle.observe_error();
            warn!(
                symbol = %request.symbol,
                capacity = self.cfg.buffer_capacity,
                "buffer full; order dropped"
            );
            return;
        }
        buffer.push(request);
    }

    /// Whether the buffer is due for a flush.
    fn flush_due(&self) -> bool {
        let buffered = self.buffered();
        if buffered == 0 {
            return false;
        }
        if buffered >= self.cfg.batch_size {
            return true;
        }
        self.last_flush
            .lock()
            .expect("flush clock poisoned")
            .elapsed()
            >= self.cfg.batch_interval
    }

    /// Drain the buffer and submit sequentially, spacing submissions by
    /// the throttle's current delay. Outcomes feed the throttle.
    pub async fn flush(&self) {
        let batch: Vec<OrderRequest> = {
            let mut buffer = self.buffer.lock().expect("buffer lock poisoned");
            std::mem::take(&mut *buffer)
        };
        if batch.is_empty() {
            return;
        }
        debug!(orders = batch.len(), "flushing order batch");

        for request in batch {
            tokio::time::sleep(self.throttle.submit_delay()).await;
            match self.engine.place_order(request) {
                Ok(placement) => {
                    self.submitted.fetch_add(1, Ordering::Relaxed);
                    self.throttle.observe_success();
                    trace!(
                        order_id = %placement.order.id,
                        status = %placement.order.status,
                        trades = placement.trades.len(),
                        "order submitted"
                    );
                }
                Err(err) => {
                    self.throttle.observe_error();
                    debug!(%err, "order submission failed");
                }
            }
        }

        *self.last_flush.lock().expect("flush clock poisoned") = Instant::now();
    }

    /// Subscribe the simulator's market reactions on the bus: price moves
    /// beyond one percent provoke reactive orders, and large trades pull
    /// momentum traders in.
    pub fn attach_listeners(self: &Arc<Self>) {
        let simulator = Arc::clone(self);
        self.bus.subscribe(
            EventType::PriceUpdated,
            handler(move |event| {
                let simulator = Arc::clone(&simulator);
                async move {
                    if let EventPayload::PriceUpdated {
                        symbol,
                        price,
                        previous_price,
                    } = event.payload
                    {
                        simulator.on_price_update(&symbol, price, previous_price);
                    }
                }
            }),
        );

        let simulator = Arc::clone(self);
        self.bus.subscribe(
            EventType::TradeExecuted,
            handler(move |event| {
                let simulator = Arc::clone(&simulator);
                async move {
                    if let EventPayload::TradeExecuted { trade } = event.payload {
                        simulator.on_trade(&trade.symbol, trade.quantity, trade.price);
                    }
                }
            }),
        );
    }

    fn on_price_update(&self, symbol: &str, price: u128, previous_price: u128) {
        if previous_price == 0 {
            return;
        }
        let change_pct =
            (price as f64 - previous_price as f64) / previous_price as f64 * 100.0;
        let reactors = {
            let mut rng = self.rng.lock().expect("simulator rng poisoned");
            self.users.price_move_reactors(&mut *rng, change_pct)
        };
        if reactors.is_empty() {
            return;
        }
        trace!(symbol, change_pct, reactors = reactors.len(), "price move reactions");
        self.react(symbol, price, reactors);
    }

    fn on_trade(&self, symbol: &str, quantity: u64, price: u128) {
        if quantity < self.cfg.large_trade_quantity {
            return;
        }
        let reactors = {
            let mut rng = self.rng.lock().expect("simulator rng poisoned");
            self.users.large_trade_reactors(&mut *rng)
        };
        if reactors.is_empty() {
            return;
        }
        trace!(symbol, quantity, reactors = reactors.len(), "large trade reactions");
        self.react(symbol, price, reactors);
    }

    fn react(&self, symbol: &str, price: u128, reactors: Vec<UserSession>) {
        for session in reactors {
            if !self.reserve_minute_slot() {
                return;
            }
            let request = {
                let mut rng = self.rng.lock().expect("simulator rng poisoned");
                self.order_gen
                    .generate(&mut *rng, &session.user_id, session.behavior, symbol, price)
            };
            self.enqueue(request);
        }
    }

    /// Claim one slot under the per-minute hard cap. The window resets on
    /// the minute boundary.
    fn reserve_minute_slot(&self) -> bool {
        let mut window = self.minute.lock().expect("minute window poisoned");
        if window.start.elapsed() >= Duration::from_secs(60) {
            window.start = Instant::now();
            window.count = 0;
        }
        if window.count >= self.cfg.max_orders_per_minute {
            trace!(cap = self.cfg.max_orders_per_minute, "minute cap reached");
            return false;
        }
        window.count += 1;
        true
    }

    /// Generation and flush loop, until cancelled. A final flush drains
    /// buffered orders on the way out.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            symbols = self.cfg.symbols.len(),
            max_users = self.cfg.max_users,
            "flow simulator started"
        );
        self.bus.publish(Event::new(
            SOURCE,
            EventPayload::SystemStatus {
                component: SOURCE.to_string(),
                status: "started".to_string(),
            },
        ));

        let mut ticker = tokio::time::interval(self.cfg.generation_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.generation_pass();
                    if self.flush_due() {
                        self.flush().await;
                    }
                }
            }
        }

        // Drain in-flight work before stopping.
        self.flush().await;
        self.bus.publish(Event::new(
            SOURCE,
            EventPayload::SystemStatus {
                component: SOURCE.to_string(),
                status: "stopped".to_string(),
            },
        ));
        info!(
            submitted = self.submitted(),
            dropped = self.dropped(),
            "flow simulator stopped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::InMemoryMarketCache;
    use crate::storage::{InMemoryOrderRepository, InMemoryTradeRepository};

    fn fixture(cfg: FlowSimulatorConfig) -> (Arc<FlowSimulator>, Arc<dyn MarketDataCache>) {
        let bus = Arc::new(EventBus::new());
        let engine = Arc::new(MatchingEngine::new(
            Arc::new(InMemoryOrderRepository::new()),
            Arc::new(InMemoryTradeRepository::new()),
            Arc::clone(&bus),
        ));
        let cache: Arc<dyn MarketDataCache> = Arc::new(InMemoryMarketCache::new());
        let simulator = Arc::new(FlowSimulator::with_seed(
            cfg,
            engine,
            bus,
            Arc::clone(&cache),
            42,
        ));
        (simulator, cache)
    }

    #[test]
    fn rate_updates_validate_their_bounds() {
        let (simulator, _) = fixture(FlowSimulatorConfig::default());
        simulator.set_order_rate("ACME", 5.0).unwrap();
        simulator.set_order_rate("ACME", 0.0).unwrap();
        assert!(matches!(
            simulator.set_order_rate("ACME", -1.0),
            Err(SimulatorError::RateOutOfRange { .. })
        ));
        assert!(matches!(
            simulator.set_order_rate("ACME", 1_000.0),
            Err(SimulatorError::RateOutOfRange { .. })
        ));
    }

    #[test]
    fn generation_requires_a_price_and_users() {
        let cfg = FlowSimulatorConfig {
            symbols: vec!["ACME".to_string()],
            default_order_rate: 100.0,
            ..FlowSimulatorConfig::default()
        };
        let (simulator, cache) = fixture(cfg);

        // No cached price yet: nothing can be generated.
        simulator.generation_pass();
        assert_eq!(simulator.buffered(), 0);

        cache.set_price("ACME", 10_000);
        for _ in 0..50 {
            simulator.generation_pass();
        }
        assert!(simulator.buffered() > 0);
        assert!(simulator.active_users() > 0);
    }

    #[test]
    fn buffer_overflow_drops_and_counts_errors() {
        let cfg = FlowSimulatorConfig {
            symbols: vec!["ACME".to_string()],
            buffer_capacity: 5,
            default_order_rate: 1_000.0,
            max_orders_per_minute: 10_000,
            ..FlowSimulatorConfig::default()
        };
        let (simulator, cache) = fixture(cfg);
        cache.set_price("ACME", 10_000);

        for _ in 0..100 {
            simulator.generation_pass();
        }
        assert_eq!(simulator.buffered(), 5);
        assert!(simulator.dropped() > 0);
    }

    #[test]
    fn minute_cap_limits_generation() {
        let cfg = FlowSimulatorConfig {
            symbols: vec!["ACME".to_string()],
            buffer_capacity: 10_000,
            default_order_rate: 10_000.0,
            max_orders_per_minute: 7,
            ..FlowSimulatorConfig::default()
        };
        let (simulator, cache) = fixture(cfg);
        cache.set_price("ACME", 10_000);

        for _ in 0..50 {
            simulator.generation_pass();
        }
        assert!(simulator.buffered() <= 7);
    }

    #[tokio::test]
    async fn flush_submits_to_the_engine() {
        let cfg = FlowSimulatorConfig {
            symbols: vec!["ACME".to_string()],
            default_order_rate: 50.0,
            base_rate: 1_000.0,
            ..FlowSimulatorConfig::default()
        };
        let (simulator, cache) = fixture(cfg);
        cache.set_price("ACME", 10_000);

        for _ in 0..40 {
            simulator.generation_pass();
        }
        let buffered = simulator.buffered();
        assert!(buffered > 0);

        simulator.flush().await;
        assert_eq!(simulator.buffered(), 0);
        assert_eq!(simulator.submitted() as usize, buffered);
    }
}
