//! The matching loop: walks the opposite side in price-time priority and
//! consumes resting quantity until the incoming order is done or stops
//! crossing.

use crate::engine::book::OrderBook;
use crate::engine::level::LevelFill;
use crate::engine::order::Side;
use tracing::trace;

/// One execution produced by the matching loop, tagged with the level price
/// it printed at. The execution price is always the maker's price.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Execution {
    pub fill: LevelFill,
    pub price: u128,
}

impl OrderBook {
    /// Match an incoming order against this book's opposite side.
    ///
    /// Walks price levels in priority order (ascending asks for a buy,
    /// descending bids for a sell), stopping at `limit_price` when given
    /// (`None` means a market order crosses everything). Consumed makers are
    /// removed from their levels; emptied levels leave the side.
    ///
    /// Returns the executions in the order they were produced plus the
    /// incoming order's unfilled remainder. Caller holds the write gate.
    pub(crate) fn match_incoming(
        &self,
        side: Side,
        quantity: u64,
        limit_price: Option<u128>,
    ) -> (Vec<Execution>, u64) {
        let opposite = match side {
            Side::Buy => &self.asks,
            Side::Sell => &self.bids,
        };

        let mut executions = Vec::new();
        let mut remaining = quantity;

        if opposite.is_empty() {
            return (executions, remaining);
        }

        // SkipMap keeps prices sorted; iterate best-first for the taker.
        let price_iter: Box<dyn Iterator<Item = _> + '_> = match side {
            Side::Buy => Box::new(opposite.iter()),
            Side::Sell => Box::new(opposite.iter().rev()),
        };

        let mut drained_levels = Vec::new();

        for entry in price_iter {
            if remaining == 0 {
                break;
            }
            let price = *entry.key();
            if let Some(limit) = limit_price {
                let crosses = match side {
                    Side::Buy => price <= limit,
                    Side::Sell => price >= limit,
                };
                if !crosses {
                    break;
                }
            }

            let level = entry.value();
            for fill in level.take_from_front(remaining) {
                remaining -= fill.quantity;
                if fill.maker_remaining == 0 {
                    self.order_locations.remove(&fill.maker_id);
                }
                executions.push(Execution { fill, price });
            }
            if level.is_empty() {
                drained_levels.push(price);
            }
        }

        for price in drained_levels {
            if let Some(entry) = opposite.get(&price) {
                if entry.value().is_empty() {
                    entry.remove();
                }
            }
        }

        trace!(
            symbol = %self.symbol(),
            %side,
            quantity,
            executed = quantity - remaining,
            fills = executions.len(),
            "matching cycle complete"
        );

        (executions, remaining)
    }
}
