//! Pooled-stake accounting engine.
//!
//! - `math`: checked floor-division arithmetic at 256-bit intermediate width
//! - `accounting`: read-only entitlement formulas
//! - `claim`: the one-time auction claim trigger
//! - `settlement`: `PoolEngine`, the state transitions plus external transfers
//! - `admin`: owner-gated switches

use crate::collaborators::CollaboratorError;
use crate::domain::Amount;
use thiserror::Error;

pub mod accounting;
pub mod admin;
pub mod claim;
pub mod math;
pub mod settlement;

pub use accounting::{Entitlements, LiveBalances};
pub use settlement::{PoolEngine, PoolSummary};

/// Why an operation was rejected. The engine state is unchanged in every case.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
    #[error("nothing available: no {0} to withdraw")]
    NothingAvailable(&'static str),
    #[error("insufficient liquidity: requested {requested}, pool holds {available}")]
    InsufficientLiquidity { requested: Amount, available: Amount },
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}
