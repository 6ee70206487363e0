//! The synthetic price generator: one tick combines a trend term, a random
//! term and a mean-reversion term, scaled by the square root of elapsed
//! time, then rounds back to the venue's price step.

use crate::market::error::MarketDataError;
use crate::market::state::{PricePoint, PriceState};
use crate::market::volume::VolumeModel;
use crate::utils::{current_time_millis, utc_hour};
use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, trace};

/// Tunable parameters of the price model.
#[derive(Debug, Clone)]
pub struct MarketModelConfig {
    /// Baseline per-tick relative volatility.
    pub base_volatility: f64,
    /// Weight of the recent moving-average slope in the next step.
    pub trend_persistence: f64,
    /// Pull strength back toward the base price.
    pub mean_reversion: f64,
    /// Geometric decay factor of excess volatility per tick, in `(0, 1)`.
    pub volatility_decay: f64,
    /// Price rounding increment in minor units.
    pub price_step_size: u128,
    /// Bound on retained history points per symbol.
    pub history_capacity: usize,
    /// Median tick volume for the volume model.
    pub base_volume: f64,
}

impl Default for MarketModelConfig {
    fn default() -> Self {
        Self {
            base_volatility: 0.02,
            trend_persistence: 0.3,
            mean_reversion: 0.1,
            volatility_decay: 0.9,
            price_step_size: 1,
            history_capacity: 100,
            base_volume: 1_000.0,
        }
    }
}

/// Volatility injection patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatilityPattern {
    /// Multiply volatility by `1 + 3 * intensity`.
    Spike,
    /// Multiply volatility by `1 - 0.1 * intensity`.
    Decay,
    /// Set volatility to `base * (1 + sin(t) * intensity)`.
    Oscillate,
    /// Multiply volatility by `1 + 2 * U * intensity`, `U ~ Uniform(0, 1)`.
    Random,
}

impl fmt::Display for VolatilityPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VolatilityPattern::Spike => "spike",
            VolatilityPattern::Decay => "decay",
            VolatilityPattern::Oscillate => "oscillate",
            VolatilityPattern::Random => "random",
        };
        write!(f, "{s}")
    }
}

impl FromStr for VolatilityPattern {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spike" => Ok(VolatilityPattern::Spike),
            "decay" => Ok(VolatilityPattern::Decay),
            "oscillate" => Ok(VolatilityPattern::Oscillate),
            "random" => Ok(VolatilityPattern::Random),
            other => Err(MarketDataError::UnknownPattern(other.to_string())),
        }
    }
}

/// The result of one generator tick for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUpdate {
    /// The symbol that ticked.
    pub symbol: String,
    /// New price in minor units.
    pub price: u128,
    /// Price before this tick.
    pub previous_price: u128,
    /// Day open after this tick.
    pub daily_open: u128,
    /// Day high after this tick.
    pub daily_high: u128,
    /// Day low after this tick.
    pub daily_low: u128,
    /// Cumulative day volume after this tick.
    pub daily_volume: u64,
    /// Volume attributed to this tick alone.
    pub tick_volume: u64,
    /// Tick time, epoch milliseconds.
    pub timestamp: u64,
}

/// Per-symbol synthetic price series generator.
///
/// Each symbol's state is locked exclusively for the whole of its tick;
/// ticks for different symbols do not contend.
pub struct MarketDataGenerator {
    cfg: MarketModelConfig,
    states: DashMap<String, Mutex<PriceState>>,
    volume: VolumeModel,
    rng: Mutex<StdRng>,
    normal: Normal<f64>,
    epoch: Instant,
}

impl MarketDataGenerator {
    /// Build a generator with entropy from the OS.
    pub fn new(cfg: MarketModelConfig) -> Self {
        Self::with_rng(cfg, StdRng::from_os_rng())
    }

    /// Build a generator with a fixed seed, for reproducible runs.
    pub fn with_seed(cfg: MarketModelConfig, seed: u64) -> Self {
        Self::with_rng(cfg, StdRng::seed_from_u64(seed))
    }

    fn with_rng(cfg: MarketModelConfig, rng: StdRng) -> Self {
        let volume = VolumeModel::new(cfg.base_volume);
        Self {
            cfg,
            states: DashMap::new(),
            volume,
            rng: Mutex::new(rng),
            normal: Normal::new(0.0, 1.0).expect("unit normal is valid"),
            epoch: Instant::now(),
        }
    }

    /// Initialize or re-anchor a symbol at the given base price.
    pub fn set_base_price(&self, symbol: &str, price: u128) -> Result<(), MarketDataError> {
        if price == 0 {
            return Err(MarketDataError::InvalidPrice {
                symbol: symbol.to_string(),
                price,
            });
        }
        match self.states.get(symbol) {
            Some(state) => {
                state.lock().expect("price state lock poisoned").reanchor(price);
                debug!(symbol, price, "base price re-anchored");
            }
            None => {
                self.states.insert(
                    symbol.to_string(),
                    Mutex::new(PriceState::new(
                        symbol,
                        price,
                        self.cfg.base_volatility,
                        self.cfg.history_capacity,
                        current_time_millis(),
                    )),
                );
                debug!(symbol, price, "price state created");
            }
        }
        Ok(())
    }

    /// All symbols with price state.
    pub fn symbols(&self) -> Vec<String> {
        self.states.iter().map(|e| e.key().clone()).collect()
    }

    /// The latest price for a symbol, if it has state.
    pub fn current_price(&self, symbol: &str) -> Option<u128> {
        self.states
            .get(symbol)
            .map(|s| s.lock().expect("price state lock poisoned").current_price)
    }

    /// The most recent `limit` history points, oldest first.
    pub fn price_history(
        &self,
        symbol: &str,
        limit: usize,
    ) -> Result<Vec<PricePoint>, MarketDataError> {
        let state = self
            .states
            .get(symbol)
            .ok_or_else(|| MarketDataError::InsufficientData {
                symbol: symbol.to_string(),
                reason: "no price state".to_string(),
            })?;
        let state = state.lock().expect("price state lock poisoned");
        let len = state.history.len();
        let skip = len.saturating_sub(limit);
        Ok(state.history.iter().skip(skip).copied().collect())
    }

    /// Advance one tick for a symbol and return the resulting update.
    pub fn generate_price(&self, symbol: &str) -> Result<PriceUpdate, MarketDataError> {
        let entry = self
            .states
            .get(symbol)
            .ok_or_else(|| MarketDataError::UnknownSymbol(symbol.to_string()))?;
        let mut state = entry.value().lock().expect("price state lock poisoned");

        let now = current_time_millis();
        // Sub-millisecond ticks still move; floor the elapsed time.
        let dt_seconds = ((now.saturating_sub(state.last_update_ms)) as f64 / 1_000.0).max(0.001);
        let time_factor = dt_seconds.sqrt();

        let (noise, tick_volume) = {
            let mut rng = self.rng.lock().expect("generator rng poisoned");
            (
                self.normal.sample(&mut *rng),
                self.volume.sample(utc_hour(now), &mut *rng),
            )
        };

        let current = state.current_price as f64;
        let base = state.base_price as f64;

        let trend = state.ma_slope() * self.cfg.trend_persistence;
        let random = noise * state.current_volatility;
        let reversion = -((current - base) / base) * self.cfg.mean_reversion;
        let total_change = (trend + random + reversion) * time_factor;

        let step = self.cfg.price_step_size;
        let raw = current * (1.0 + total_change);
        let stepped = (raw / step as f64).round() as u128 * step;
        let new_price = stepped.max(step);

        state.apply_tick(new_price, tick_volume, now);
        state.decay_volatility(self.cfg.volatility_decay);
        state.clamp_volatility();

        trace!(
            symbol,
            price = new_price,
            previous = state.previous_price,
            trend,
            random,
            reversion,
            volume = tick_volume,
            "tick generated"
        );

        Ok(PriceUpdate {
            symbol: symbol.to_string(),
            price: state.current_price,
            previous_price: state.previous_price,
            daily_open: state.daily_open,
            daily_high: state.daily_high,
            daily_low: state.daily_low,
            daily_volume: state.daily_volume,
            tick_volume,
            timestamp: now,
        })
    }

    /// Inject a volatility pattern for a symbol.
    ///
    /// `intensity` must lie in `[0.1, 1.0]`. The resulting volatility is
    /// always clamped to `[0.1 * base, 10 * base]`. Returns the volatility
    /// in force after the injection.
    pub fn simulate_volatility(
        &self,
        symbol: &str,
        pattern: VolatilityPattern,
        intensity: f64,
    ) -> Result<f64, MarketDataError> {
        if !(0.1..=1.0).contains(&intensity) {
            return Err(MarketDataError::InvalidIntensity(intensity));
        }
        let entry = self
            .states
            .get(symbol)
            .ok_or_else(|| MarketDataError::UnknownSymbol(symbol.to_string()))?;
        let mut state = entry.value().lock().expect("price state lock poisoned");

        match pattern {
            VolatilityPattern::Spike => {
                state.current_volatility *= 1.0 + 3.0 * intensity;
            }
            VolatilityPattern::Decay => {
                state.current_volatility *= 1.0 - 0.1 * intensity;
            }
            VolatilityPattern::Oscillate => {
                let t = self.epoch.elapsed().as_secs_f64();
                state.current_volatility = state.base_volatility * (1.0 + t.sin() * intensity);
            }
            VolatilityPattern::Random => {
                let u: f64 = self.rng.lock().expect("generator rng poisoned").random();
                state.current_volatility *= 1.0 + 2.0 * u * intensity;
            }
        }
        state.clamp_volatility();

        debug!(
            symbol,
            %pattern,
            intensity,
            volatility = state.current_volatility,
            "volatility injected"
        );
        Ok(state.current_volatility)
    }

    /// The volatility currently in force for a symbol.
    pub fn current_volatility(&self, symbol: &str) -> Option<f64> {
        self.states
            .get(symbol)
            .map(|s| s.lock().expect("price state lock poisoned").current_volatility)
    }
}
