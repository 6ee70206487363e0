//! Order and trade domain types shared by the matching engine and its callers.
//!
//! Prices are integer minor units (the venue's smallest price increment) and
//! quantities are integer units. The floating-point market model rounds back
//! to minor units before anything re-enters this module's types.

use crate::utils::current_time_millis;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique order identity, assigned by the engine on admission.
pub type OrderId = Uuid;

/// Unique trade identity.
pub type TradeId = Uuid;

/// The side of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy (bid) side.
    Buy,
    /// Sell (ask) side.
    Sell,
}

impl Side {
    /// The opposite side of the book.
    #[must_use]
    #[inline]
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Supported order kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    /// Execute immediately against resting liquidity; never rests.
    Market,
    /// Execute up to the limit price; the residual rests on the book.
    Limit,
    /// Held off-book until the last trade price crosses the trigger,
    /// then converted to a market order.
    StopLoss,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKind::Market => write!(f, "MARKET"),
            OrderKind::Limit => write!(f, "LIMIT"),
            OrderKind::StopLoss => write!(f, "STOP_LOSS"),
        }
    }
}

/// Lifecycle state of an order.
///
/// `Pending -> (Partial)* -> Filled | Cancelled | Rejected`; the three
/// right-hand states are terminal and never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// Admitted, no fills yet.
    Pending,
    /// At least one fill, residual quantity remains.
    Partial,
    /// Fully executed.
    Filled,
    /// Removed by the owner before completion.
    Cancelled,
    /// Refused by the engine (validation or no liquidity).
    Rejected,
}

impl OrderStatus {
    /// Whether the status is terminal (can never change again).
    #[must_use]
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Partial => "PARTIAL",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Rejected => "REJECTED",
        };
        write!(f, "{s}")
    }
}

/// An order as submitted by a caller, before admission.
///
/// The engine assigns identity, timestamps and status during admission; a
/// request carries only what the submitter decides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Owner of the order. Must be non-empty.
    pub user_id: String,
    /// Book the order targets. Must be non-empty.
    pub symbol: String,
    /// Buy or sell.
    pub side: Side,
    /// Market, limit or stop-loss.
    pub kind: OrderKind,
    /// Quantity to trade. Must be positive.
    pub quantity: u64,
    /// Limit price in minor units. Zero for market orders; the trigger
    /// price for stop-loss orders.
    pub price: u128,
}

impl OrderRequest {
    /// A limit order request.
    #[must_use]
    pub fn limit(user_id: &str, symbol: &str, side: Side, quantity: u64, price: u128) -> Self {
        Self {
            user_id: user_id.to_string(),
            symbol: symbol.to_string(),
            side,
            kind: OrderKind::Limit,
            quantity,
            price,
        }
    }

    /// A market order request. Price is fixed at zero.
    #[must_use]
    pub fn market(user_id: &str, symbol: &str, side: Side, quantity: u64) -> Self {
        Self {
            user_id: user_id.to_string(),
            symbol: symbol.to_string(),
            side,
            kind: OrderKind::Market,
            quantity,
            price: 0,
        }
    }

    /// A stop-loss order request with the given trigger price.
    #[must_use]
    pub fn stop_loss(
        user_id: &str,
        symbol: &str,
        side: Side,
        quantity: u64,
        trigger_price: u128,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            symbol: symbol.to_string(),
            side,
            kind: OrderKind::StopLoss,
            quantity,
            price: trigger_price,
        }
    }
}

/// An admitted order: immutable identity plus mutable lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Globally unique identity, assigned on admission.
    pub id: OrderId,
    /// Owner of the order.
    pub user_id: String,
    /// Book the order belongs to.
    pub symbol: String,
    /// Buy or sell.
    pub side: Side,
    /// Market, limit or stop-loss.
    pub kind: OrderKind,
    /// Limit price in minor units (zero for market orders, trigger price
    /// for stop-loss orders). Never changes after admission.
    pub price: u128,
    /// Remaining (unfilled) quantity. Monotonically decreasing.
    pub quantity: u64,
    /// Lifecycle state.
    pub status: OrderStatus,
    /// Why the order was rejected, when `status == Rejected`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<crate::engine::error::RejectReason>,
    /// Admission timestamp in epoch milliseconds. Never changes.
    pub created_at: u64,
    /// Wall-clock of the last state change, epoch milliseconds.
    pub updated_at: u64,
    /// Per-symbol admission sequence; breaks ties between orders admitted
    /// within the same millisecond.
    pub seq: u64,
}

impl Order {
    /// Build an admitted order from a request.
    pub(crate) fn admit(id: OrderId, req: OrderRequest, seq: u64) -> Self {
        let now = current_time_millis();
        Self {
            id,
            user_id: req.user_id,
            symbol: req.symbol,
            side: req.side,
            kind: req.kind,
            price: req.price,
            quantity: req.quantity,
            status: OrderStatus::Pending,
            reject_reason: None,
            created_at: now,
            updated_at: now,
            seq,
        }
    }

    /// Whether the order may rest on (or already rests on) a book.
    #[must_use]
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// A write-once record of one execution between a buy and a sell order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Unique trade identity.
    pub id: TradeId,
    /// The buy-side order.
    pub buy_order_id: OrderId,
    /// The sell-side order.
    pub sell_order_id: OrderId,
    /// Book the trade printed on.
    pub symbol: String,
    /// Execution price in minor units (the maker's price).
    pub price: u128,
    /// Executed quantity. Always positive.
    pub quantity: u64,
    /// Execution timestamp, epoch milliseconds.
    pub created_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Partial.is_terminal());
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
    }

    #[test]
    fn side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn market_request_has_zero_price() {
        let req = OrderRequest::market("u1", "ACME", Side::Buy, 10);
        assert_eq!(req.price, 0);
        assert_eq!(req.kind, OrderKind::Market);
    }

    #[test]
    fn admit_stamps_identity_and_state() {
        let req = OrderRequest::limit("u1", "ACME", Side::Sell, 5, 101);
        let id = Uuid::new_v4();
        let order = Order::admit(id, req, 7);
        assert_eq!(order.id, id);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.seq, 7);
        assert_eq!(order.created_at, order.updated_at);
    }

    #[test]
    fn serde_round_trip_uses_wire_names() {
        let req = OrderRequest::stop_loss("u1", "ACME", Side::Sell, 5, 90);
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"STOP_LOSS\""));
        assert!(json.contains("\"SELL\""));
        let back: OrderRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, req);
    }
}
