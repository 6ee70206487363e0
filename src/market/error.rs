//! Market data error types.

use thiserror::Error;

/// Errors surfaced by the market data generator and service.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MarketDataError {
    /// No price state exists for the symbol; call `set_base_price` first.
    #[error("unknown symbol {0}")]
    UnknownSymbol(String),

    /// A base price must be positive.
    #[error("invalid base price {price} for {symbol}")]
    InvalidPrice {
        /// The symbol being anchored.
        symbol: String,
        /// The rejected price.
        price: u128,
    },

    /// Volatility intensity must lie in `[0.1, 1.0]`.
    #[error("volatility intensity {0} outside [0.1, 1.0]")]
    InvalidIntensity(f64),

    /// Unrecognized volatility pattern name.
    #[error("unknown volatility pattern {0:?}")]
    UnknownPattern(String),

    /// Not enough observations to answer; carries the reason instead of a
    /// partially wrong result.
    #[error("insufficient data for {symbol}: {reason}")]
    InsufficientData {
        /// The symbol queried.
        symbol: String,
        /// What was missing.
        reason: String,
    },
}
