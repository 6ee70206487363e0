//! Typed events carried by the bus.
//!
//! Every event type has a fixed payload schema, expressed as a tagged serde
//! variant so the schema is statically checked end to end.

use crate::engine::{Order, OrderId, Trade};
use crate::market::MarketData;
use crate::utils::current_time_millis;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The closed set of event types. The wire name doubles as the topic and,
/// with the external transport enabled, as the subject suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// An order was admitted by the engine.
    #[serde(rename = "order.placed")]
    OrderPlaced,
    /// An order was cancelled by its owner.
    #[serde(rename = "order.cancelled")]
    OrderCancelled,
    /// A trade printed.
    #[serde(rename = "trade.executed")]
    TradeExecuted,
    /// The generator produced a new price.
    #[serde(rename = "price.updated")]
    PriceUpdated,
    /// A full market data record was refreshed.
    #[serde(rename = "market.data")]
    MarketData,
    /// A volatility pattern was injected.
    #[serde(rename = "volatility.injected")]
    VolatilityInjected,
    /// Component lifecycle and health notices.
    #[serde(rename = "system.status")]
    SystemStatus,
}

impl EventType {
    /// Every event type, for exhaustive subscription.
    pub const ALL: [EventType; 7] = [
        EventType::OrderPlaced,
        EventType::OrderCancelled,
        EventType::TradeExecuted,
        EventType::PriceUpdated,
        EventType::MarketData,
        EventType::VolatilityInjected,
        EventType::SystemStatus,
    ];

    /// The dotted wire name of this event type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::OrderPlaced => "order.placed",
            EventType::OrderCancelled => "order.cancelled",
            EventType::TradeExecuted => "trade.executed",
            EventType::PriceUpdated => "price.updated",
            EventType::MarketData => "market.data",
            EventType::VolatilityInjected => "volatility.injected",
            EventType::SystemStatus => "system.status",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown event type {s:?}"))
    }
}

/// Statically-typed event payloads, one variant per event type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    /// Payload of [`EventType::OrderPlaced`].
    OrderPlaced {
        /// The order as admitted.
        order: Order,
    },
    /// Payload of [`EventType::OrderCancelled`].
    OrderCancelled {
        /// The cancelled order's id.
        order_id: OrderId,
        /// The book it was cancelled on.
        symbol: String,
        /// Quantity left unfilled at cancellation.
        remaining_quantity: u64,
    },
    /// Payload of [`EventType::TradeExecuted`].
    TradeExecuted {
        /// The printed trade.
        trade: Trade,
    },
    /// Payload of [`EventType::PriceUpdated`].
    PriceUpdated {
        /// The symbol that ticked.
        symbol: String,
        /// New price, minor units.
        price: u128,
        /// Price before the tick.
        previous_price: u128,
    },
    /// Payload of [`EventType::MarketData`].
    MarketData {
        /// The refreshed record.
        data: MarketData,
    },
    /// Payload of [`EventType::VolatilityInjected`].
    VolatilityInjected {
        /// The affected symbol.
        symbol: String,
        /// Pattern name (`spike`, `decay`, `oscillate`, `random`).
        pattern: String,
        /// Injection intensity in `[0.1, 1.0]`.
        intensity: f64,
        /// Volatility in force after the injection.
        volatility: f64,
    },
    /// Payload of [`EventType::SystemStatus`].
    SystemStatus {
        /// Component reporting.
        component: String,
        /// Status word (`started`, `stopped`, `degraded`, ...).
        status: String,
    },
}

impl EventPayload {
    /// The event type this payload belongs to.
    #[must_use]
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::OrderPlaced { .. } => EventType::OrderPlaced,
            EventPayload::OrderCancelled { .. } => EventType::OrderCancelled,
            EventPayload::TradeExecuted { .. } => EventType::TradeExecuted,
            EventPayload::PriceUpdated { .. } => EventType::PriceUpdated,
            EventPayload::MarketData { .. } => EventType::MarketData,
            EventPayload::VolatilityInjected { .. } => EventType::VolatilityInjected,
            EventPayload::SystemStatus { .. } => EventType::SystemStatus,
        }
    }
}

/// One event as delivered to subscribers and, optionally, the external
/// transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identity.
    pub id: Uuid,
    /// Topic of the event; always matches `payload.event_type()`.
    pub event_type: EventType,
    /// Name of the publishing component.
    pub source: String,
    /// Publish time, epoch milliseconds.
    pub timestamp: u64,
    /// The typed payload.
    pub payload: EventPayload,
}

impl Event {
    /// Build an event; the type is derived from the payload.
    #[must_use]
    pub fn new(source: &str, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: payload.event_type(),
            source: source.to_string(),
            timestamp: current_time_millis(),
            payload,
        }
    }
}
