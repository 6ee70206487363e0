//! Matching engine error types.

use crate::engine::order::OrderId;
use thiserror::Error;

/// Stable error kinds surfaced at the engine's edges.
///
/// Admission and cancellation errors are returned to the caller; rejection
/// reasons (`NoLiquidity`, `NoReferencePrice`) mark the order `REJECTED`
/// instead of failing the call.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// The request failed admission validation; no state was mutated.
    #[error("validation failed: {0}")]
    Validation(String),

    /// No order with the given id is known to the engine.
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    /// The order reached `FILLED` before the operation ran.
    #[error("order {0} already filled")]
    AlreadyFilled(OrderId),

    /// The order reached `CANCELLED` before the operation ran.
    #[error("order {0} already cancelled")]
    AlreadyCancelled(OrderId),

    /// An order with this id was already admitted; the retry is a duplicate.
    #[error("order {0} already admitted")]
    AlreadyAdmitted(OrderId),

    /// A persistence write failed. Never swallowed: the caller must know
    /// the transition did not durably commit.
    #[error("storage failure: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

/// Why a matched order was marked `REJECTED` rather than resting or filling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    /// A market order found no opposite liquidity for its residual.
    NoLiquidity,
    /// Two market orders would have crossed; no price reference exists.
    NoReferencePrice,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::NoLiquidity => write!(f, "NO_LIQUIDITY"),
            RejectReason::NoReferencePrice => write!(f, "NO_REFERENCE_PRICE"),
        }
    }
}
