//! The matching engine: admission, per-symbol matching cycles,
//! cancellation, stop triggering, persistence write-through and event
//! publication.

use crate::bus::{Event, EventBus, EventPayload};
use crate::engine::book::OrderBook;
use crate::engine::error::{EngineError, RejectReason};
use crate::engine::order::{
    Order, OrderId, OrderKind, OrderRequest, OrderStatus, Side, Trade,
};
use crate::engine::snapshot::OrderBookSnapshot;
use crate::engine::stops::StopRail;
use crate::storage::{OrderRepository, TradeRepository};
use crate::utils::current_time_millis;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Component name stamped as the `source` of published events.
const SOURCE: &str = "matching-engine";

/// The outcome of one admission: the order's state after the match cycle
/// and the trades it produced, in execution order.
#[derive(Debug, Clone)]
pub struct Placement {
    /// The admitted order, including its post-match status and residual
    /// quantity.
    pub order: Order,
    /// Trades executed by this admission, contiguous and ordered.
    pub trades: Vec<Trade>,
}

/// Price-time priority matching engine over per-symbol books.
///
/// Matching, resting and cancellation for one symbol are serialized by
/// that symbol's book gate; no operation ever holds two symbol gates, so
/// symbols make progress independently.
pub struct MatchingEngine {
    books: DashMap<String, Arc<OrderBook>>,
    stops: DashMap<String, Arc<StopRail>>,
    /// Current state of every order ever admitted, terminal states
    /// included. The books hold only resting (active) orders.
    orders: DashMap<OrderId, Order>,
    order_store: Arc<dyn OrderRepository>,
    trade_store: Arc<dyn TradeRepository>,
    bus: Arc<EventBus>,
    orders_processed: AtomicU64,
    trades_executed: AtomicU64,
}

impl MatchingEngine {
    pub fn new(
        order_store: Arc<dyn OrderRepository>,
        trade_store: Arc<dyn TradeRepository>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            books: DashMap::new(),
            stops: DashMap::new(),
            orders: DashMap::new(),
            order_store,
            trade_store,
            bus,
            orders_processed: AtomicU64::new(0),
            trades_executed: AtomicU64::new(0),
        }
    }

    /// Admit a new order, match it, and return its placement.
    ///
    /// Validation failures mutate nothing. A market order that cannot fill
    /// completely is returned with status `REJECTED` and reason
    /// `NO_LIQUIDITY`; that is an order outcome, not an error.
    pub fn place_order(&self, request: OrderRequest) -> Result<Placement, EngineError> {
        validate(&request)?;
        self.admit(Uuid::new_v4(), request)
    }

    /// Admission path for idempotent retries carrying a client-chosen id.
    ///
    /// Resubmitting an id that was already admitted fails with
    /// [`EngineError::AlreadyAdmitted`] and duplicates nothing.
    pub fn place_order_with_id(
        &self,
        id: OrderId,
        request: OrderRequest,
    ) -> Result<Placement, EngineError> {
        validate(&request)?;
        if self.orders.contains_key(&id) {
            return Err(EngineError::AlreadyAdmitted(id));
        }
        self.admit(id, request)
    }

    fn admit(&self, id: OrderId, request: OrderRequest) -> Result<Placement, EngineError> {
        let book = self.book(&request.symbol);
        let seq = book.next_seq();
        let order = Order::admit(id, request, seq);

        // Persist before anything becomes observable; a failed write must
        // fail the admission.
        self.order_store.create(&order)?;
        self.orders.insert(order.id, order.clone());
        self.orders_processed.fetch_add(1, Ordering::Relaxed);

        let placement = match order.kind {
            OrderKind::StopLoss => {
                self.rail(&order.symbol)
                    .park(order.id, order.side, order.price, order.seq);
                debug!(
                    order_id = %order.id,
                    symbol = %order.symbol,
                    trigger = order.price,
                    "stop order parked"
                );
                Placement {
                    order,
                    trades: Vec::new(),
                }
            }
            OrderKind::Limit | OrderKind::Market => self.run_cycle(&book, order)?,
        };

        self.bus.publish(Event::new(
            SOURCE,
            EventPayload::OrderPlaced {
                order: placement.order.clone(),
            },
        ));
        for trade in &placement.trades {
            self.bus.publish(Event::new(
                SOURCE,
                EventPayload::TradeExecuted {
                    trade: trade.clone(),
                },
            ));
        }

        if !placement.trades.is_empty() {
            self.fire_triggered_stops(&placement.order.symbol);
        }

        Ok(placement)
    }

    /// One matching cycle under the symbol gate: match, transition makers,
    /// finalize the taker, then persist the whole batch.
    fn run_cycle(&self, book: &OrderBook, mut order: Order) -> Result<Placement, EngineError> {
        let limit_price = match order.kind {
            OrderKind::Limit => Some(order.price),
            _ => None,
        };

        let mut trades = Vec::new();
        let mut touched_makers = Vec::new();

        {
            let _gate = book.gate();
            let (executions, remaining) = book.match_incoming(order.side, order.quantity, limit_price);
            let now = current_time_millis();

            for execution in &executions {
                let fill = execution.fill;
                let (buy_order_id, sell_order_id) = match order.side {
                    Side::Buy => (order.id, fill.maker_id),
                    Side::Sell => (fill.maker_id, order.id),
                };
                trades.push(Trade {
                    id: Uuid::new_v4(),
                    buy_order_id,
                    sell_order_id,
                    symbol: order.symbol.clone(),
                    price: execution.price,
                    quantity: fill.quantity,
                    created_at: now,
                });

                let mut maker = self
                    .orders
                    .get_mut(&fill.maker_id)
                    .unwrap_or_else(|| {
                        panic!(
                            "invariant violation: book entry {} has no order record",
                            fill.maker_id
                        )
                    });
                assert!(
                    !maker.status.is_terminal(),
                    "invariant violation: resting order {} already terminal",
                    maker.id
                );
                maker.quantity = fill.maker_remaining;
                maker.status = if fill.maker_remaining == 0 {
                    OrderStatus::Filled
                } else {
                    OrderStatus::Partial
                };
                maker.updated_at = now;
                touched_makers.push(maker.clone());
            }

            order.quantity = remaining;
            order.updated_at = now;
            if remaining == 0 {
                order.status = OrderStatus::Filled;
            } else {
                match order.kind {
                    OrderKind::Limit => {
                        order.status = if trades.is_empty() {
                            OrderStatus::Pending
                        } else {
                            OrderStatus::Partial
                        };
                        book.rest(order.id, order.side, order.price, order.seq, remaining);
                    }
                    _ => {
                        order.status = OrderStatus::Rejected;
                        order.reject_reason = Some(RejectReason::NoLiquidity);
                        debug!(
                            order_id = %order.id,
                            symbol = %order.symbol,
                            remaining,
                            "market order rejected for lack of liquidity"
                        );
                    }
                }
            }

            if let Some(last) = trades.last() {
                book.record_trade_price(last.price);
            }
            self.orders.insert(order.id, order.clone());
        }

        for maker in &touched_makers {
            self.order_store.update(maker)?;
        }
        self.order_store.update(&order)?;
        for trade in &trades {
            self.trade_store.create(trade)?;
        }
        self.trades_executed
            .fetch_add(trades.len() as u64, Ordering::Relaxed);

        Ok(Placement { order, trades })
    }

    /// Cancel an order atomically: it leaves the book (or the stop rail)
    /// and turns `CANCELLED` in one step under the symbol gate.
    pub fn cancel_order(&self, id: OrderId) -> Result<(), EngineError> {
        let symbol = {
            let order = self.orders.get(&id).ok_or(EngineError::OrderNotFound(id))?;
            match order.status {
                OrderStatus::Filled => return Err(EngineError::AlreadyFilled(id)),
                OrderStatus::Cancelled | OrderStatus::Rejected => {
                    return Err(EngineError::AlreadyCancelled(id));
                }
                OrderStatus::Pending | OrderStatus::Partial => order.symbol.clone(),
            }
        };

        let book = self.book(&symbol);
        let cancelled = {
            let _gate = book.gate();
            // Re-check under the gate: a concurrent fill may have won.
            let Some(mut order) = self.orders.get_mut(&id) else {
                return Err(EngineError::OrderNotFound(id));
            };
            match order.status {
                OrderStatus::Filled => return Err(EngineError::AlreadyFilled(id)),
                OrderStatus::Cancelled | OrderStatus::Rejected => {
                    return Err(EngineError::AlreadyCancelled(id));
                }
                OrderStatus::Pending | OrderStatus::Partial => {}
            }

            if order.kind == OrderKind::StopLoss {
                self.rail(&symbol).cancel(id);
            } else {
                book.remove(id);
            }
            order.status = OrderStatus::Cancelled;
            order.updated_at = current_time_millis();
            order.clone()
        };

        self.order_store.update(&cancelled)?;
        self.bus.publish(Event::new(
            SOURCE,
            EventPayload::OrderCancelled {
                order_id: id,
                symbol: symbol.clone(),
                remaining_quantity: cancelled.quantity,
            },
        ));
        debug!(order_id = %id, %symbol, "order cancelled");
        Ok(())
    }

    /// Current state of an order, terminal states included.
    pub fn get_order(&self, id: OrderId) -> Result<Order, EngineError> {
        self.orders
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(EngineError::OrderNotFound(id))
    }

    /// Aggregated snapshot of one symbol's book. Unknown symbols yield an
    /// empty snapshot.
    pub fn order_book(&self, symbol: &str) -> OrderBookSnapshot {
        self.books
            .get(symbol)
            .map(|book| book.snapshot())
            .unwrap_or_else(|| OrderBookSnapshot::empty(symbol))
    }

    /// The last trade price for a symbol, if any trade has printed.
    pub fn last_trade_price(&self, symbol: &str) -> Option<u128> {
        self.books.get(symbol).and_then(|book| book.last_trade_price())
    }

    /// Orders admitted since start.
    pub fn orders_processed(&self) -> u64 {
        self.orders_processed.load(Ordering::Relaxed)
    }

    /// Trades executed since start.
    pub fn trades_executed(&self) -> u64 {
        self.trades_executed.load(Ordering::Relaxed)
    }

    /// Log a one-line health summary.
    pub fn report(&self) {
        info!(
            orders = self.orders_processed(),
            trades = self.trades_executed(),
            books = self.books.len(),
            "engine status"
        );
    }

    fn book(&self, symbol: &str) -> Arc<OrderBook> {
        self.books
            .entry(symbol.to_string())
            .or_insert_with(|| Arc::new(OrderBook::new(symbol)))
            .clone()
    }

    fn rail(&self, symbol: &str) -> Arc<StopRail> {
        self.stops
            .entry(symbol.to_string())
            .or_insert_with(|| Arc::new(StopRail::new()))
            .clone()
    }

    /// Convert and run every stop whose trigger the last trade price
    /// crossed. Conversions can trade, which can trigger further stops;
    /// loop until the rail quiesces.
    fn fire_triggered_stops(&self, symbol: &str) {
        loop {
            let Some(last) = self.last_trade_price(symbol) else {
                return;
            };
            let fired = self.rail(symbol).take_triggered(last);
            if fired.is_empty() {
                return;
            }
            for stop_id in fired {
                if let Err(err) = self.convert_stop(stop_id) {
                    warn!(order_id = %stop_id, %err, "stop conversion failed");
                }
            }
        }
    }

    /// Run a triggered stop through the market-order path.
    fn convert_stop(&self, id: OrderId) -> Result<(), EngineError> {
        let converted = {
            let Some(mut order) = self.orders.get_mut(&id) else {
                return Err(EngineError::OrderNotFound(id));
            };
            if order.status.is_terminal() {
                return Ok(());
            }
            order.kind = OrderKind::Market;
            order.price = 0;
            order.updated_at = current_time_millis();
            order.clone()
        };
        debug!(order_id = %id, symbol = %converted.symbol, "stop triggered; converting to market");

        let book = self.book(&converted.symbol);
        let placement = self.run_cycle(&book, converted)?;
        for trade in &placement.trades {
            self.bus.publish(Event::new(
                SOURCE,
                EventPayload::TradeExecuted {
                    trade: trade.clone(),
                },
            ));
        }
        Ok(())
    }
}

fn validate(request: &OrderRequest) -> Result<(), EngineError> {
    if request.user_id.is_empty() {
        return Err(EngineError::Validation("user_id must not be empty".into()));
    }
    if request.symbol.is_empty() {
        return Err(EngineError::Validation("symbol must not be empty".into()));
    }
    if request.quantity == 0 {
        return Err(EngineError::Validation("quantity must be positive".into()));
    }
    match request.kind {
        OrderKind::Limit if request.price == 0 => Err(EngineError::Validation(
            "limit orders require a positive price".into(),
        )),
        OrderKind::Market if request.price != 0 => Err(EngineError::Validation(
            "market orders must not carry a price".into(),
        )),
        OrderKind::StopLoss if request.price == 0 => Err(EngineError::Validation(
            "stop-loss orders require a positive trigger price".into(),
        )),
        _ => Ok(()),
    }
}
