//! Mutable per-symbol price state: current/previous prices, daily
//! aggregates, bounded history and the volatility/trend trackers.

use crate::utils::utc_day;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One historical price observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Price in minor units.
    pub price: u128,
    /// Observation time, epoch milliseconds.
    pub timestamp: u64,
}

/// The trend window used for the moving-average slope.
const TREND_WINDOW: usize = 5;

/// Live state for one symbol. Locked exclusively for the whole of a tick.
#[derive(Debug)]
pub(crate) struct PriceState {
    pub symbol: String,
    pub base_price: u128,
    pub current_price: u128,
    pub previous_price: u128,
    pub daily_open: u128,
    pub daily_high: u128,
    pub daily_low: u128,
    pub daily_volume: u64,
    pub history: VecDeque<PricePoint>,
    history_capacity: usize,
    pub base_volatility: f64,
    pub current_volatility: f64,
    /// Ratio of current to baseline volatility.
    pub volatility_index: f64,
    /// Sign of the recent moving-average slope: -1, 0 or 1.
    pub trend_direction: i8,
    /// Magnitude of the recent moving-average slope (relative per tick).
    pub trend_strength: f64,
    pub last_update_ms: u64,
}

impl PriceState {
    pub fn new(
        symbol: &str,
        base_price: u128,
        base_volatility: f64,
        history_capacity: usize,
        now_ms: u64,
    ) -> Self {
        let mut history = VecDeque::with_capacity(history_capacity);
        history.push_back(PricePoint {
            price: base_price,
            timestamp: now_ms,
        });
        Self {
            symbol: symbol.to_string(),
            base_price,
            current_price: base_price,
            previous_price: base_price,
            daily_open: base_price,
            daily_high: base_price,
            daily_low: base_price,
            daily_volume: 0,
            history,
            history_capacity,
            base_volatility,
            current_volatility: base_volatility,
            volatility_index: 1.0,
            trend_direction: 0,
            trend_strength: 0.0,
            last_update_ms: now_ms,
        }
    }

    /// Re-anchor the base price without discarding accumulated state.
    pub fn reanchor(&mut self, base_price: u128) {
        self.base_price = base_price;
    }

    /// Mean relative change per step over the last [`TREND_WINDOW`] history
    /// points. Zero until at least two points exist.
    pub fn ma_slope(&self) -> f64 {
        let len = self.history.len();
        if len < 2 {
            return 0.0;
        }
        let window = len.min(TREND_WINDOW);
        let points: Vec<u128> = self
            .history
            .iter()
            .skip(len - window)
            .map(|p| p.price)
            .collect();
        let mut sum = 0.0;
        let mut steps = 0usize;
        for pair in points.windows(2) {
            let (prev, next) = (pair[0] as f64, pair[1] as f64);
            if prev > 0.0 {
                sum += (next - prev) / prev;
                steps += 1;
            }
        }
        if steps == 0 { 0.0 } else { sum / steps as f64 }
    }

    /// Apply one tick: roll the day if the wall-day changed, shift
    /// current/previous, fold the price into the daily aggregates, append
    /// history and refresh the trend trackers.
    pub fn apply_tick(&mut self, price: u128, volume: u64, timestamp_ms: u64) {
        if utc_day(self.last_update_ms) != utc_day(timestamp_ms) {
            self.daily_open = price;
            self.daily_high = price;
            self.daily_low = price;
            self.daily_volume = 0;
        } else {
            self.daily_high = self.daily_high.max(price);
            self.daily_low = self.daily_low.min(price);
        }

        self.previous_price = self.current_price;
        self.current_price = price;
        self.daily_volume = self.daily_volume.saturating_add(volume);

        if self.history.len() == self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(PricePoint {
            price,
            timestamp: timestamp_ms,
        });

        let slope = self.ma_slope();
        self.trend_strength = slope.abs();
        self.trend_direction = if slope > f64::EPSILON {
            1
        } else if slope < -f64::EPSILON {
            -1
        } else {
            0
        };
        self.last_update_ms = timestamp_ms;
    }

    /// Decay volatility geometrically toward the baseline.
    pub fn decay_volatility(&mut self, decay: f64) {
        self.current_volatility =
            self.base_volatility + (self.current_volatility - self.base_volatility) * decay;
        self.refresh_volatility_index();
    }

    /// Clamp volatility to `[0.1 * base, 10 * base]`.
    pub fn clamp_volatility(&mut self) {
        let floor = 0.1 * self.base_volatility;
        let ceiling = 10.0 * self.base_volatility;
        self.current_volatility = self.current_volatility.clamp(floor, ceiling);
        self.refresh_volatility_index();
    }

    fn refresh_volatility_index(&mut self) {
        self.volatility_index = if self.base_volatility > 0.0 {
            self.current_volatility / self.base_volatility
        } else {
            1.0
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-03-01 12:00:00 UTC
    const NOON: u64 = 1_709_294_400_000;
    // 2024-03-01 23:59:00 UTC
    const LATE: u64 = 1_709_337_540_000;

    fn state() -> PriceState {
        PriceState::new("ACME", 10_000, 0.02, 100, NOON)
    }

    #[test]
    fn tick_updates_aggregates_within_day() {
        let mut s = state();
        s.apply_tick(10_100, 5, NOON + 1_000);
        s.apply_tick(9_900, 3, NOON + 2_000);

        assert_eq!(s.current_price, 9_900);
        assert_eq!(s.previous_price, 10_100);
        assert_eq!(s.daily_high, 10_100);
        assert_eq!(s.daily_low, 9_900);
        assert_eq!(s.daily_volume, 8);
    }

    #[test]
    fn day_rollover_resets_aggregates() {
        let mut s = state();
        s.apply_tick(10_000, 5, LATE);
        // One minute later it is the next UTC day.
        s.apply_tick(10_100, 3, LATE + 60_000);

        assert_eq!(s.daily_open, 10_100);
        assert_eq!(s.daily_high, 10_100);
        assert_eq!(s.daily_low, 10_100);
        assert_eq!(s.daily_volume, 3);
    }

    #[test]
    fn history_is_bounded() {
        let mut s = PriceState::new("ACME", 100, 0.02, 3, NOON);
        for i in 0..10u64 {
            s.apply_tick(100 + i as u128, 1, NOON + i * 1_000);
        }
        assert_eq!(s.history.len(), 3);
        assert_eq!(s.history.back().unwrap().price, 109);
    }

    #[test]
    fn slope_tracks_direction() {
        let mut s = state();
        for (i, price) in [10_100u128, 10_200, 10_300, 10_400].iter().enumerate() {
            s.apply_tick(*price, 1, NOON + (i as u64 + 1) * 1_000);
        }
        assert!(s.ma_slope() > 0.0);
        assert_eq!(s.trend_direction, 1);
        assert!(s.trend_strength > 0.0);
    }

    #[test]
    fn volatility_clamp_bounds() {
        let mut s = state();
        s.current_volatility = 1.0;
        s.clamp_volatility();
        assert!((s.current_volatility - 0.2).abs() < 1e-12);

        s.current_volatility = 1e-6;
        s.clamp_volatility();
        assert!((s.current_volatility - 0.002).abs() < 1e-12);
        assert!((s.volatility_index - 0.1).abs() < 1e-9);
    }

    #[test]
    fn volatility_decays_toward_base() {
        let mut s = state();
        s.current_volatility = 0.08;
        s.decay_volatility(0.5);
        assert!((s.current_volatility - 0.05).abs() < 1e-12);
    }
}
