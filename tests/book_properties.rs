//! Property tests over random order streams: the book never crosses,
//! quantity is conserved, and terminal states never regress.

use exchange_rs::prelude::*;
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Action {
    Limit {
        side: Side,
        quantity: u64,
        price: u128,
    },
    Market {
        side: Side,
        quantity: u64,
    },
    CancelNth(usize),
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        4 => (any::<bool>(), 1u64..50, 90u128..110).prop_map(|(buy, quantity, price)| {
            Action::Limit {
                side: if buy { Side::Buy } else { Side::Sell },
                quantity,
                price,
            }
        }),
        2 => (any::<bool>(), 1u64..50).prop_map(|(buy, quantity)| Action::Market {
            side: if buy { Side::Buy } else { Side::Sell },
            quantity,
        }),
        1 => (0usize..20).prop_map(Action::CancelNth),
    ]
}

fn new_engine() -> Arc<MatchingEngine> {
    Arc::new(MatchingEngine::new(
        Arc::new(InMemoryOrderRepository::new()),
        Arc::new(InMemoryTradeRepository::new()),
        Arc::new(EventBus::new()),
    ))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn random_streams_preserve_book_invariants(actions in prop::collection::vec(action_strategy(), 1..80)) {
        let engine = new_engine();
        let mut admitted: Vec<OrderId> = Vec::new();
        let mut submitted_quantity: HashMap<OrderId, u64> = HashMap::new();
        let mut filled_quantity: HashMap<OrderId, u64> = HashMap::new();
        let mut statuses: HashMap<OrderId, OrderStatus> = HashMap::new();

        for action in actions {
            let placement = match action {
                Action::Limit { side, quantity, price } => Some(
                    engine
                        .place_order(OrderRequest::limit("prop", "X", side, quantity, price))
                        .unwrap(),
                ),
                Action::Market { side, quantity } => Some(
                    engine
                        .place_order(OrderRequest::market("prop", "X", side, quantity))
                        .unwrap(),
                ),
                Action::CancelNth(n) => {
                    if let Some(id) = admitted.get(n % admitted.len().max(1)).copied() {
                        let _ = engine.cancel_order(id);
                    }
                    None
                }
            };

            if let Some(placement) = placement {
                admitted.push(placement.order.id);
                submitted_quantity.insert(placement.order.id, placement.order.quantity + placement.trades.iter().map(|t| t.quantity).sum::<u64>());
                for trade in &placement.trades {
                    prop_assert!(trade.quantity > 0);
                    *filled_quantity.entry(trade.buy_order_id).or_default() += trade.quantity;
                    *filled_quantity.entry(trade.sell_order_id).or_default() += trade.quantity;
                }
            }

            // Terminal states never regress.
            for id in &admitted {
                let state = engine.get_order(*id).unwrap();
                if let Some(previous) = statuses.get(id) {
                    if previous.is_terminal() {
                        prop_assert_eq!(*previous, state.status);
                    }
                }
                statuses.insert(*id, state.status);
            }

            // The book never crosses at quiescence.
            let snapshot = engine.order_book("X");
            if let (Some(bid), Some(ask)) = (snapshot.bids.first(), snapshot.asks.first()) {
                prop_assert!(bid.price < ask.price);
            }
        }

        // Conservation: residual plus cumulative fills always equals the
        // submitted quantity; cancellation freezes the residual but never
        // invents or loses quantity.
        for id in &admitted {
            let state = engine.get_order(*id).unwrap();
            let filled = filled_quantity.get(id).copied().unwrap_or(0);
            let submitted = submitted_quantity[id];
            prop_assert_eq!(state.quantity + filled, submitted);
            if state.status == OrderStatus::Filled {
                prop_assert_eq!(state.quantity, 0u64);
            }
        }
    }
}
