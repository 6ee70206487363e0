//! Stop-loss trigger semantics: parked off-book, converted to market
//! orders when the last trade price crosses the trigger.

mod common;

use common::{engine, limit};
use exchange_rs::prelude::*;

#[test]
fn parked_stop_never_shows_on_the_book() {
    let (engine, _bus) = engine();

    let stop = engine
        .place_order(OrderRequest::stop_loss("alice", "X", Side::Sell, 5, 90))
        .unwrap();
    assert_eq!(stop.order.status, OrderStatus::Pending);
    assert!(stop.trades.is_empty());

    let snapshot = engine.order_book("X");
    assert!(snapshot.bids.is_empty());
    assert!(snapshot.asks.is_empty());
}

#[test]
fn sell_stop_fires_when_the_market_trades_down_through_it() {
    let (engine, _bus) = engine();

    let stop = engine
        .place_order(OrderRequest::stop_loss("alice", "X", Side::Sell, 5, 90))
        .unwrap();

    // Liquidity for the stop to hit once it converts.
    limit(&engine, "bidder", "X", Side::Buy, 10, 85);

    // A print at 95 does not reach the 90 trigger.
    limit(&engine, "maker", "X", Side::Sell, 2, 95);
    limit(&engine, "taker", "X", Side::Buy, 2, 95);
    assert_eq!(
        engine.get_order(stop.order.id).unwrap().status,
        OrderStatus::Pending
    );

    // A print at 88 crosses the trigger; the stop converts to a market
    // sell and hits the resting bid at 85.
    limit(&engine, "maker", "X", Side::Sell, 2, 88);
    limit(&engine, "taker", "X", Side::Buy, 2, 88);

    let fired = engine.get_order(stop.order.id).unwrap();
    assert_eq!(fired.status, OrderStatus::Filled);
    assert_eq!(fired.quantity, 0);
    assert_eq!(fired.kind, OrderKind::Market);

    // Only the converted stop consumed the resting bid.
    let bids = engine.order_book("X").bids;
    assert_eq!(bids[0].quantity, 5);
}

#[test]
fn buy_stop_fires_when_the_market_trades_up_through_it() {
    let (engine, _bus) = engine();

    let stop = engine
        .place_order(OrderRequest::stop_loss("alice", "X", Side::Buy, 3, 110))
        .unwrap();
    limit(&engine, "offer", "X", Side::Sell, 10, 112);

    // Print exactly at the trigger.
    limit(&engine, "maker", "X", Side::Buy, 1, 110);
    limit(&engine, "taker", "X", Side::Sell, 1, 110);

    let fired = engine.get_order(stop.order.id).unwrap();
    assert_eq!(fired.status, OrderStatus::Filled);

    let asks = engine.order_book("X").asks;
    assert_eq!(asks[0].quantity, 7);
}

#[test]
fn triggered_stop_without_liquidity_is_rejected() {
    let (engine, _bus) = engine();

    let stop = engine
        .place_order(OrderRequest::stop_loss("alice", "X", Side::Sell, 5, 90))
        .unwrap();

    // Trade down through the trigger, leaving no bids behind.
    limit(&engine, "maker", "X", Side::Sell, 2, 88);
    limit(&engine, "taker", "X", Side::Buy, 2, 88);

    let fired = engine.get_order(stop.order.id).unwrap();
    assert_eq!(fired.status, OrderStatus::Rejected);
    assert_eq!(fired.reject_reason, Some(RejectReason::NoLiquidity));
}

#[test]
fn cancelled_stop_does_not_fire() {
    let (engine, _bus) = engine();

    let stop = engine
        .place_order(OrderRequest::stop_loss("alice", "X", Side::Sell, 5, 90))
        .unwrap();
    engine.cancel_order(stop.order.id).unwrap();

    limit(&engine, "bidder", "X", Side::Buy, 10, 85);
    limit(&engine, "maker", "X", Side::Sell, 2, 88);
    limit(&engine, "taker", "X", Side::Buy, 2, 88);

    let state = engine.get_order(stop.order.id).unwrap();
    assert_eq!(state.status, OrderStatus::Cancelled);
    assert_eq!(state.quantity, 5);
    // The resting bid lost only the printing taker's counterparty volume.
    assert_eq!(engine.order_book("X").bids[0].quantity, 10);
}

#[test]
fn one_print_can_cascade_multiple_stops() {
    let (engine, _bus) = engine();

    // Two sell stops: the second's trigger sits below the first fill's
    // expected print, so the first conversion fires the second.
    let first = engine
        .place_order(OrderRequest::stop_loss("alice", "X", Side::Sell, 2, 95))
        .unwrap();
    let second = engine
        .place_order(OrderRequest::stop_loss("bob", "X", Side::Sell, 2, 92))
        .unwrap();

    limit(&engine, "bidder-1", "X", Side::Buy, 2, 92);
    limit(&engine, "bidder-2", "X", Side::Buy, 2, 90);

    // Print at 94: fires the first stop only; its market sell hits the 92
    // bid, printing 92, which fires the second stop into the 90 bid.
    limit(&engine, "maker", "X", Side::Sell, 1, 94);
    limit(&engine, "taker", "X", Side::Buy, 1, 94);

    assert_eq!(
        engine.get_order(first.order.id).unwrap().status,
        OrderStatus::Filled
    );
    assert_eq!(
        engine.get_order(second.order.id).unwrap().status,
        OrderStatus::Filled
    );
    assert_eq!(engine.last_trade_price("X"), Some(90));
}
