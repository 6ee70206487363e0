//! Turns `(behavior, symbol, current price)` into one order request.

use crate::engine::{OrderKind, OrderRequest, Side};
use crate::sim::behavior::Behavior;
use rand::Rng;
use tracing::trace;

/// Target notional (in minor units x quantity) used to scale sizes so
/// expensive symbols trade fewer units.
const NOTIONAL_TARGET: f64 = 1_000.0;

/// Stateless order generator.
#[derive(Debug, Clone)]
pub struct OrderGenerator {
    /// Price rounding increment in minor units; limit and stop prices are
    /// quantized to it.
    price_step: u128,
}

impl OrderGenerator {
    pub fn new(price_step: u128) -> Self {
        Self {
            price_step: price_step.max(1),
        }
    }

    /// Produce one order request for a user at the current market price.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        user_id: &str,
        behavior: Behavior,
        symbol: &str,
        current_price: u128,
    ) -> OrderRequest {
        let side = if rng.random_bool(0.5) {
            Side::Buy
        } else {
            Side::Sell
        };
        let kind = behavior.draw_order_kind(rng);
        let quantity = self.draw_quantity(rng, behavior, current_price);

        let request = match kind {
            OrderKind::Market => OrderRequest::market(user_id, symbol, side, quantity),
            OrderKind::Limit => {
                let offset = behavior.draw_limit_offset(rng);
                // Buyers bid below the market, sellers offer above it.
                let factor = match side {
                    Side::Buy => 1.0 - offset,
                    Side::Sell => 1.0 + offset,
                };
                let price = self.quantize(current_price as f64 * factor);
                OrderRequest::limit(user_id, symbol, side, quantity, price)
            }
            OrderKind::StopLoss => {
                let offset = behavior.draw_stop_offset(rng);
                // A stop sits through the market in the loss direction:
                // buy stops above, sell stops below.
                let factor = match side {
                    Side::Buy => 1.0 + offset,
                    Side::Sell => 1.0 - offset,
                };
                let trigger = self.quantize(current_price as f64 * factor);
                OrderRequest::stop_loss(user_id, symbol, side, quantity, trigger)
            }
        };

        trace!(
            user_id,
            %behavior,
            symbol,
            side = %request.side,
            kind = %request.kind,
            quantity = request.quantity,
            price = request.price,
            "order generated"
        );
        request
    }

    fn draw_quantity<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        behavior: Behavior,
        current_price: u128,
    ) -> u64 {
        let (low, high) = behavior.quantity_range();
        let base = rng.random_range(low..=high) as f64;
        // Keep notional bounded as prices move.
        let scale = (NOTIONAL_TARGET / (current_price as f64).max(1.0)).min(10.0);
        ((base * scale).round() as u64).max(1)
    }

    fn quantize(&self, raw_price: f64) -> u128 {
        let step = self.price_step as f64;
        let stepped = (raw_price / step).round() as u128 * self.price_step;
        stepped.max(self.price_step)
    }
}
