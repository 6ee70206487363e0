//! Off-book holding area for stop-loss orders.
//!
//! Stop orders never rest on a book side. They wait here until the last
//! trade price crosses their trigger, then convert to market orders and
//! re-enter the admission path. The trigger reference is the last-trade
//! price of the owning symbol.

use crate::engine::order::{OrderId, Side};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy)]
struct StopEntry {
    id: OrderId,
    side: Side,
    trigger: u128,
    seq: u64,
}

/// Pending stop orders for one symbol.
#[derive(Debug, Default)]
pub(crate) struct StopRail {
    pending: Mutex<Vec<StopEntry>>,
}

impl StopRail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a stop order until its trigger crosses.
    pub fn park(&self, id: OrderId, side: Side, trigger: u128, seq: u64) {
        self.pending
            .lock()
            .expect("stop rail lock poisoned")
            .push(StopEntry {
                id,
                side,
                trigger,
                seq,
            });
    }

    /// Remove a parked stop order; `true` if it was present.
    pub fn cancel(&self, id: OrderId) -> bool {
        let mut pending = self.pending.lock().expect("stop rail lock poisoned");
        let before = pending.len();
        pending.retain(|entry| entry.id != id);
        pending.len() != before
    }

    /// Whether the given order is parked here.
    pub fn contains(&self, id: OrderId) -> bool {
        self.pending
            .lock()
            .expect("stop rail lock poisoned")
            .iter()
            .any(|entry| entry.id == id)
    }

    /// Drain every stop whose trigger is crossed by `last_trade_price`:
    /// a buy stop fires at `market >= trigger`, a sell stop at
    /// `market <= trigger`. Fired stops are returned in admission order.
    pub fn take_triggered(&self, last_trade_price: u128) -> Vec<OrderId> {
        let mut pending = self.pending.lock().expect("stop rail lock poisoned");
        let mut fired: Vec<StopEntry> = Vec::new();
        pending.retain(|entry| {
            let crossed = match entry.side {
                Side::Buy => last_trade_price >= entry.trigger,
                Side::Sell => last_trade_price <= entry.trigger,
            };
            if crossed {
                fired.push(*entry);
                false
            } else {
                true
            }
        });
        fired.sort_by_key(|entry| entry.seq);
        fired.into_iter().map(|entry| entry.id).collect()
    }

    /// Number of parked stops.
    pub fn len(&self) -> usize {
        self.pending.lock().expect("stop rail lock poisoned").len()
    }
}
