//! Prelude module that re-exports commonly used types.
//!
//! ```rust
//! use exchange_rs::prelude::*;
//! ```

pub use crate::bus::{Event, EventBus, EventPayload, EventType, handler};
pub use crate::config::{Config, SymbolConfig};
pub use crate::engine::{
    EngineError, MatchingEngine, Order, OrderBookSnapshot, OrderId, OrderKind, OrderRequest,
    OrderStatus, Placement, RejectReason, Side, SnapshotLevel, Trade, TradeId,
};
pub use crate::market::{
    InMemoryMarketCache, MarketData, MarketDataCache, MarketDataError, MarketDataGenerator,
    MarketDataService, MarketModelConfig, PriceUpdate, VolatilityPattern,
};
pub use crate::sim::{
    AdaptiveThrottle, Behavior, FlowSimulator, FlowSimulatorConfig, OrderGenerator, SimulatorError,
    UserPool, UserSession,
};
pub use crate::storage::{
    InMemoryOrderRepository, InMemoryTradeRepository, OrderRepository, StorageError,
    TradeRepository,
};
pub use crate::utils::current_time_millis;
