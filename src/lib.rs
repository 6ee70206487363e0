//! # Simulated Exchange Core
//!
//! The core of a simulated securities exchange: a continuous limit order
//! book matching engine, a synthetic market data generator and an adaptive
//! order-flow simulator, wired together by a typed in-process event bus.
//!
//! ## Components
//!
//! - **Matching engine** ([`engine`]): per-symbol order books under
//!   price-time priority with maker-price execution. Limit residuals rest,
//!   market residuals are rejected for lack of liquidity, and stop-loss
//!   orders wait off-book until the last trade price crosses their
//!   trigger. Matching, resting and cancellation for one symbol are
//!   serialized by that symbol's gate; snapshot readers stay lock-free.
//!
//! - **Market data** ([`market`]): a per-symbol price series built from
//!   three components per tick (trend persistence, normally-distributed
//!   noise scaled by a decaying volatility, and mean reversion toward the
//!   base price), a log-normal intraday volume model, daily
//!   high/low/volume aggregates with day rollover, and a service that
//!   writes records to a TTL side cache and publishes `price.updated` and
//!   `market.data` events.
//!
//! - **Flow simulator** ([`sim`]): a bounded pool of simulated user
//!   sessions with heterogeneous behaviors generating order flow, a
//!   bounded submission buffer flushed by size or age, a hard per-minute
//!   cap, and an adaptive throttle that halves its rate when downstream
//!   errors exceed 20% in a window and recovers 10% per healthy window.
//!
//! - **Event bus** ([`bus`]): typed topics with per-subscriber in-order
//!   delivery, a 30-second handler deadline, and (behind the `nats`
//!   feature) a JSON transport over NATS subjects.
//!
//! ## Example
//!
//! ```
//! use exchange_rs::prelude::*;
//! use std::sync::Arc;
//!
//! let bus = Arc::new(EventBus::new());
//! let engine = MatchingEngine::new(
//!     Arc::new(InMemoryOrderRepository::new()),
//!     Arc::new(InMemoryTradeRepository::new()),
//!     Arc::clone(&bus),
//! );
//!
//! let resting = engine
//!     .place_order(OrderRequest::limit("alice", "ACME", Side::Buy, 10, 100))
//!     .unwrap();
//! let taker = engine
//!     .place_order(OrderRequest::limit("bob", "ACME", Side::Sell, 6, 99))
//!     .unwrap();
//!
//! // Maker-price execution: the resting bid at 100 sets the print.
//! assert_eq!(taker.trades.len(), 1);
//! assert_eq!(taker.trades[0].price, 100);
//! assert_eq!(engine.get_order(resting.order.id).unwrap().quantity, 4);
//! ```

pub mod bus;
pub mod config;
pub mod engine;
pub mod market;
pub mod sim;
pub mod storage;

pub mod prelude;
mod utils;

pub use bus::{Event, EventBus, EventPayload, EventType};
pub use config::{Config, SymbolConfig};
pub use engine::{
    EngineError, MatchingEngine, Order, OrderBookSnapshot, OrderId, OrderKind, OrderRequest,
    OrderStatus, Placement, RejectReason, Side, Trade,
};
pub use market::{
    InMemoryMarketCache, MarketData, MarketDataCache, MarketDataError, MarketDataGenerator,
    MarketDataService, MarketModelConfig, VolatilityPattern,
};
pub use sim::{AdaptiveThrottle, Behavior, FlowSimulator, FlowSimulatorConfig, SimulatorError};
pub use storage::{
    InMemoryOrderRepository, InMemoryTradeRepository, OrderRepository, StorageError,
    TradeRepository,
};
pub use utils::current_time_millis;
