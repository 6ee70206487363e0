//! End-to-end wiring: generator ticks feed the cache and bus, the flow
//! simulator turns prices into orders, the engine matches and publishes.

use exchange_rs::prelude::*;
use std::sync::{Arc, Mutex};
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;

fn fixture() -> (
    Arc<EventBus>,
    Arc<MatchingEngine>,
    Arc<MarketDataService>,
    Arc<FlowSimulator>,
) {
    let bus = Arc::new(EventBus::new());
    let engine = Arc::new(MatchingEngine::new(
        Arc::new(InMemoryOrderRepository::new()),
        Arc::new(InMemoryTradeRepository::new()),
        Arc::clone(&bus),
    ));
    let cache: Arc<dyn MarketDataCache> = Arc::new(InMemoryMarketCache::new());
    let generator = Arc::new(MarketDataGenerator::with_seed(
        MarketModelConfig::default(),
        7,
    ));
    let service = Arc::new(MarketDataService::new(
        Arc::clone(&generator),
        Arc::clone(&cache),
        Arc::clone(&bus),
        Duration::from_secs(60),
    ));
    let sim_config = FlowSimulatorConfig {
        symbols: vec!["ACME".to_string()],
        generation_interval: Duration::from_millis(10),
        batch_size: 5,
        batch_interval: Duration::from_millis(50),
        default_order_rate: 40.0,
        base_rate: 500.0,
        max_orders_per_minute: 10_000,
        buffer_capacity: 1_000,
        ..FlowSimulatorConfig::default()
    };
    let simulator = Arc::new(FlowSimulator::with_seed(
        sim_config,
        Arc::clone(&engine),
        Arc::clone(&bus),
        cache,
        1234,
    ));
    (bus, engine, service, simulator)
}

#[tokio::test(flavor = "multi_thread")]
async fn ticks_flow_into_orders_and_events() {
    let (bus, engine, service, simulator) = fixture();
    service.generator().set_base_price("ACME", 10_000).unwrap();
    simulator.attach_listeners();

    let market_events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&market_events);
    bus.subscribe(
        EventType::MarketData,
        handler(move |event| {
            let sink = Arc::clone(&sink);
            async move {
                if let EventPayload::MarketData { data } = event.payload {
                    sink.lock().unwrap().push(data);
                }
            }
        }),
    );

    let cancel = CancellationToken::new();
    let market_task = {
        let service = Arc::clone(&service);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            service.run(Duration::from_millis(20), cancel).await;
        })
    };
    let sim_task = {
        let simulator = Arc::clone(&simulator);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            simulator.run(cancel).await;
        })
    };

    sleep(Duration::from_secs(2)).await;
    cancel.cancel();
    market_task.await.unwrap();
    sim_task.await.unwrap();

    // Prices ticked and were published.
    let records = market_events.lock().unwrap();
    assert!(records.len() >= 10, "only {} market records", records.len());
    for record in records.iter() {
        assert!(record.daily_high >= record.current_price);
        assert!(record.daily_low <= record.current_price);
        let expected_pct = if record.previous_price > 0 {
            (record.current_price as f64 - record.previous_price as f64)
                / record.previous_price as f64
                * 100.0
        } else {
            0.0
        };
        assert!((record.price_change_pct - expected_pct).abs() < 1e-9);
    }

    // The simulator produced flow and the engine admitted it.
    assert!(simulator.submitted() > 0, "no orders submitted");
    assert!(engine.orders_processed() > 0);

    // Whatever rests on the book is never crossed.
    let snapshot = engine.order_book("ACME");
    if let (Some(bid), Some(ask)) = (snapshot.bids.first(), snapshot.asks.first()) {
        assert!(bid.price < ask.price);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn volatility_injection_reaches_the_bus() {
    let (bus, _engine, service, _simulator) = fixture();
    service.generator().set_base_price("ACME", 10_000).unwrap();

    let injections = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&injections);
    bus.subscribe(
        EventType::VolatilityInjected,
        handler(move |event| {
            let sink = Arc::clone(&sink);
            async move {
                if let EventPayload::VolatilityInjected {
                    pattern, intensity, ..
                } = event.payload
                {
                    sink.lock().unwrap().push((pattern, intensity));
                }
            }
        }),
    );

    service
        .inject_volatility("ACME", VolatilityPattern::Spike, 0.8)
        .unwrap();
    sleep(Duration::from_millis(100)).await;

    let seen = injections.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "spike");
    assert!((seen[0].1 - 0.8).abs() < 1e-12);
}

#[tokio::test(flavor = "multi_thread")]
async fn simulator_control_surface_validates_rates() {
    let (_bus, _engine, _service, simulator) = fixture();
    simulator.set_order_rate("ACME", 10.0).unwrap();
    assert!(simulator.set_order_rate("ACME", -0.5).is_err());
    assert!(simulator.set_order_rate("ACME", 1e9).is_err());
}
