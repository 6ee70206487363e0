//! Configuration from a key/value map (usually the process environment).
//!
//! Every knob has a default; unknown keys are ignored and malformed values
//! fall back to the default with a warning, so a partial environment never
//! prevents startup.

use crate::market::MarketModelConfig;
use crate::sim::FlowSimulatorConfig;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Prefix of every recognized environment key.
const ENV_PREFIX: &str = "EXCHANGE_";

/// One simulated symbol with its anchor price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolConfig {
    /// Symbol name.
    pub name: String,
    /// Base price in minor units.
    pub base_price: u128,
}

/// Complete runtime configuration of the core.
#[derive(Debug, Clone)]
pub struct Config {
    /// Symbols to simulate, with base prices.
    pub symbols: Vec<SymbolConfig>,
    /// Cadence of the market data tick loop.
    pub tick_interval: Duration,
    /// Market data cache entry TTL.
    pub cache_ttl: Duration,
    /// Price model parameters.
    pub market: MarketModelConfig,
    /// Flow simulator parameters.
    pub sim: FlowSimulatorConfig,
    /// Bound on one bus handler invocation.
    pub handler_deadline: Duration,
    /// NATS server url for the optional external transport.
    pub nats_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let symbols = vec![
            SymbolConfig {
                name: "ACME".to_string(),
                base_price: 10_000,
            },
            SymbolConfig {
                name: "GLOBEX".to_string(),
                base_price: 25_000,
            },
        ];
        let sim = FlowSimulatorConfig {
            symbols: symbols.iter().map(|s| s.name.clone()).collect(),
            ..FlowSimulatorConfig::default()
        };
        Self {
            symbols,
            tick_interval: Duration::from_millis(1_000),
            cache_ttl: Duration::from_secs(60),
            market: MarketModelConfig::default(),
            sim,
            handler_deadline: Duration::from_secs(30),
            nats_url: None,
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_map(&std::env::vars().collect())
    }

    /// Load configuration from an explicit key/value map.
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        let mut config = Config::default();

        if let Some(raw) = get(map, "SYMBOLS") {
            match parse_symbols(raw) {
                Some(symbols) if !symbols.is_empty() => {
                    config.sim.symbols = symbols.iter().map(|s| s.name.clone()).collect();
                    config.symbols = symbols;
                }
                _ => warn!(raw, "unparseable SYMBOLS; keeping defaults"),
            }
        }

        set(map, "TICK_INTERVAL_MS", &mut config.tick_interval, millis);
        set(map, "CACHE_TTL_SECS", &mut config.cache_ttl, seconds);
        set(
            map,
            "HANDLER_DEADLINE_SECS",
            &mut config.handler_deadline,
            seconds,
        );

        set_parsed(map, "BASE_VOLATILITY", &mut config.market.base_volatility);
        set_parsed(
            map,
            "TREND_PERSISTENCE",
            &mut config.market.trend_persistence,
        );
        set_parsed(map, "MEAN_REVERSION", &mut config.market.mean_reversion);
        set_parsed(map, "VOLATILITY_DECAY", &mut config.market.volatility_decay);
        set_parsed(map, "PRICE_STEP", &mut config.market.price_step_size);
        set_parsed(
            map,
            "HISTORY_CAPACITY",
            &mut config.market.history_capacity,
        );
        set_parsed(map, "BASE_VOLUME", &mut config.market.base_volume);

        set_parsed(map, "BATCH_SIZE", &mut config.sim.batch_size);
        set(map, "BATCH_INTERVAL_MS", &mut config.sim.batch_interval, millis);
        set_parsed(map, "BUFFER_CAPACITY", &mut config.sim.buffer_capacity);
        set(
            map,
            "GENERATION_INTERVAL_MS",
            &mut config.sim.generation_interval,
            millis,
        );
        set_parsed(map, "BASE_RATE", &mut config.sim.base_rate);
        set_parsed(
            map,
            "MAX_ORDERS_PER_MINUTE",
            &mut config.sim.max_orders_per_minute,
        );
        set_parsed(
            map,
            "MAX_ORDERS_PER_SECOND",
            &mut config.sim.max_orders_per_second,
        );
        set_parsed(map, "MAX_USERS", &mut config.sim.max_users);
        set_parsed(map, "DEFAULT_ORDER_RATE", &mut config.sim.default_order_rate);
        set_parsed(
            map,
            "LARGE_TRADE_QUANTITY",
            &mut config.sim.large_trade_quantity,
        );
        config.sim.price_step = config.market.price_step_size;

        config.nats_url = get(map, "NATS_URL").map(str::to_string);

        config
    }
}

fn get<'a>(map: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    map.get(&format!("{ENV_PREFIX}{key}")).map(String::as_str)
}

fn millis(raw: &str) -> Option<Duration> {
    raw.parse::<u64>().ok().map(Duration::from_millis)
}

fn seconds(raw: &str) -> Option<Duration> {
    raw.parse::<u64>().ok().map(Duration::from_secs)
}

fn set(
    map: &HashMap<String, String>,
    key: &str,
    target: &mut Duration,
    parse: fn(&str) -> Option<Duration>,
) {
    if let Some(raw) = get(map, key) {
        match parse(raw) {
            Some(value) => *target = value,
            None => warn!(key, raw, "unparseable duration; keeping default"),
        }
    }
}

fn set_parsed<T: FromStr>(map: &HashMap<String, String>, key: &str, target: &mut T) {
    if let Some(raw) = get(map, key) {
        match raw.parse::<T>() {
            Ok(value) => *target = value,
            Err(_) => warn!(key, raw, "unparseable value; keeping default"),
        }
    }
}

/// Parse `"ACME=10000,GLOBEX=25000"` into symbol configs.
fn parse_symbols(raw: &str) -> Option<Vec<SymbolConfig>> {
    raw.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| {
            let (name, price) = part.split_once('=')?;
            let base_price = price.trim().parse::<u128>().ok().filter(|p| *p > 0)?;
            Some(SymbolConfig {
                name: name.trim().to_string(),
                base_price,
            })
        })
        .collect()
}
