//! A single price level: a FIFO queue of resting orders at one price.
//!
//! Mutation happens under the owning book's per-symbol write gate; the
//! interior lock only shields concurrent snapshot readers from writers.

use crate::engine::order::OrderId;
use std::collections::VecDeque;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// One resting order's footprint on a price level.
///
/// The full order state lives in the engine's registry; the level keeps only
/// what matching needs: identity, time priority and live remaining quantity.
#[derive(Debug)]
pub(crate) struct LevelEntry {
    /// The resting order's id.
    pub id: OrderId,
    /// Per-symbol admission sequence (time-priority tiebreak).
    pub seq: u64,
    /// Live remaining quantity, decremented by fills.
    pub remaining: AtomicU64,
}

/// A price level holding resting orders in admission order.
#[derive(Debug)]
pub(crate) struct PriceLevel {
    price: u128,
    queue: RwLock<VecDeque<LevelEntry>>,
    total: AtomicU64,
}

/// One fill taken from the front of a level during matching.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LevelFill {
    /// The maker (resting) order consumed by this fill.
    pub maker_id: OrderId,
    /// Quantity taken from the maker.
    pub quantity: u64,
    /// The maker's remaining quantity after this fill.
    pub maker_remaining: u64,
}

impl PriceLevel {
    pub fn new(price: u128) -> Self {
        Self {
            price,
            queue: RwLock::new(VecDeque::new()),
            total: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn price(&self) -> u128 {
        self.price
    }

    /// Aggregate remaining quantity across all resting orders at this price.
    #[inline]
    pub fn total_quantity(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    /// Number of resting orders at this price.
    pub fn order_count(&self) -> usize {
        self.queue.read().expect("level lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.read().expect("level lock poisoned").is_empty()
    }

    /// Append a resting order at the back of the FIFO.
    pub fn push_back(&self, id: OrderId, seq: u64, quantity: u64) {
        let mut queue = self.queue.write().expect("level lock poisoned");
        queue.push_back(LevelEntry {
            id,
            seq,
            remaining: AtomicU64::new(quantity),
        });
        self.total.fetch_add(quantity, Ordering::AcqRel);
    }

    /// Consume up to `quantity` from the front of the FIFO, producing one
    /// fill per maker touched. Fully consumed makers leave the queue.
    ///
    /// Returns the fills in time-priority order.
    pub fn take_from_front(&self, mut quantity: u64) -> Vec<LevelFill> {
        let mut queue = self.queue.write().expect("level lock poisoned");
        let mut fills = Vec::new();

        while quantity > 0 {
            let Some(front) = queue.front() else { break };
            let available = front.remaining.load(Ordering::Acquire);
            if available == 0 {
                // Stale entry (cancelled under the same gate); drop it.
                queue.pop_front();
                continue;
            }

            let take = quantity.min(available);
            let maker_remaining = available - take;
            front.remaining.store(maker_remaining, Ordering::Release);
            fills.push(LevelFill {
                maker_id: front.id,
                quantity: take,
                maker_remaining,
            });
            self.total.fetch_sub(take, Ordering::AcqRel);
            quantity -= take;

            if maker_remaining == 0 {
                queue.pop_front();
            }
        }

        fills
    }

    /// Remove a resting order by id, returning its remaining quantity.
    pub fn remove(&self, id: OrderId) -> Option<u64> {
        let mut queue = self.queue.write().expect("level lock poisoned");
        let pos = queue.iter().position(|entry| entry.id == id)?;
        let entry = queue.remove(pos)?;
        let remaining = entry.remaining.load(Ordering::Acquire);
        self.total.fetch_sub(remaining, Ordering::AcqRel);
        Some(remaining)
    }

    /// Snapshot of `(id, seq, remaining)` for every resting order, in
    /// time-priority order.
    pub fn entries(&self) -> Vec<(OrderId, u64, u64)> {
        self.queue
            .read()
            .expect("level lock poisoned")
            .iter()
            .map(|e| (e.id, e.seq, e.remaining.load(Ordering::Acquire)))
            .collect()
    }
}
