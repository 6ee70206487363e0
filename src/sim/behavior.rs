//! Trader behavior profiles: how each population picks order types,
//! prices, sizes and reaction tendencies.

use crate::engine::OrderKind;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Heterogeneous trader populations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Behavior {
    /// Prefers resting limit orders, wide offsets, small sizes.
    Conservative,
    /// Prefers immediate execution, tight offsets, large sizes.
    Aggressive,
    /// Mixes limit, market and stop orders; chases moves.
    Momentum,
    /// Middle-of-the-road mix.
    Balanced,
}

impl Behavior {
    const ALL: [Behavior; 4] = [
        Behavior::Conservative,
        Behavior::Aggressive,
        Behavior::Momentum,
        Behavior::Balanced,
    ];

    /// Draw a behavior uniformly.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Behavior {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }

    /// Draw an order kind from this behavior's distribution.
    pub fn draw_order_kind<R: Rng + ?Sized>(self, rng: &mut R) -> OrderKind {
        let roll: f64 = rng.random();
        match self {
            Behavior::Conservative => {
                if roll < 0.7 {
                    OrderKind::Limit
                } else if roll < 0.95 {
                    OrderKind::Market
                } else {
                    OrderKind::StopLoss
                }
            }
            Behavior::Aggressive => {
                if roll < 0.6 {
                    OrderKind::Market
                } else if roll < 0.95 {
                    OrderKind::Limit
                } else {
                    OrderKind::StopLoss
                }
            }
            Behavior::Momentum => {
                if roll < 0.4 {
                    OrderKind::Limit
                } else if roll < 0.7 {
                    OrderKind::Market
                } else {
                    OrderKind::StopLoss
                }
            }
            Behavior::Balanced => {
                if roll < 0.5 {
                    OrderKind::Limit
                } else if roll < 0.9 {
                    OrderKind::Market
                } else {
                    OrderKind::StopLoss
                }
            }
        }
    }

    /// Limit price offset from the current price, as a fraction.
    pub fn draw_limit_offset<R: Rng + ?Sized>(self, rng: &mut R) -> f64 {
        let (low, high) = match self {
            Behavior::Conservative => (0.02, 0.05),
            Behavior::Aggressive => (0.005, 0.02),
            // Everyone else works 1-3% from the touch.
            Behavior::Momentum | Behavior::Balanced => (0.01, 0.03),
        };
        rng.random_range(low..high)
    }

    /// Stop trigger distance through the market, as a fraction (5-15%).
    pub fn draw_stop_offset<R: Rng + ?Sized>(self, rng: &mut R) -> f64 {
        rng.random_range(0.05..0.15)
    }

    /// Base quantity range before notional scaling.
    pub fn quantity_range(self) -> (u64, u64) {
        match self {
            Behavior::Conservative => (10, 50),
            Behavior::Aggressive => (50, 200),
            Behavior::Momentum => (20, 150),
            Behavior::Balanced => (10, 100),
        }
    }

    /// Probability of reacting to a price move larger than one percent.
    pub fn price_reactivity(self) -> f64 {
        match self {
            Behavior::Conservative => 0.2,
            Behavior::Aggressive => 0.7,
            Behavior::Momentum => 0.9,
            Behavior::Balanced => 0.4,
        }
    }

    /// Draw a session duration from the 5 min / 30 min / 2 h menu.
    pub fn draw_session_duration<R: Rng + ?Sized>(rng: &mut R) -> Duration {
        const MENU: [Duration; 3] = [
            Duration::from_secs(5 * 60),
            Duration::from_secs(30 * 60),
            Duration::from_secs(2 * 60 * 60),
        ];
        MENU[rng.random_range(0..MENU.len())]
    }
}

impl fmt::Display for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Behavior::Conservative => "conservative",
            Behavior::Aggressive => "aggressive",
            Behavior::Momentum => "momentum",
            Behavior::Balanced => "balanced",
        };
        write!(f, "{s}")
    }
}
