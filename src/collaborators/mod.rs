//! External collaborators the pool depends on but does not own.
//!
//! The engine only sees these traits. Production deployments back them with a
//! chain client; tests and the bundled server use [`Simulator`].

use crate::domain::{Address, Amount};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub mod sim;

pub use sim::{SimCall, Simulator};

/// Token balances and transfers.
///
/// `transfer` always moves tokens out of the pool's own account.
#[async_trait]
pub trait TokenLedger: Send + Sync + fmt::Debug {
    async fn transfer_from(
        &self,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), CollaboratorError>;

    async fn transfer(&self, to: &Address, amount: Amount) -> Result<(), CollaboratorError>;

    async fn balance_of(&self, account: &Address) -> Result<Amount, CollaboratorError>;
}

/// The staking engine holding the pool's locked and unlocked stake.
#[async_trait]
pub trait StakeEscrow: Send + Sync + fmt::Debug {
    async fn total_held_by(&self, account: &Address) -> Result<Amount, CollaboratorError>;
}

/// The token auction the pool bids in collectively.
#[async_trait]
pub trait Auction: Send + Sync + fmt::Debug {
    /// Place a bid on behalf of the pool, paid by `payer`'s attached native value.
    async fn bid(&self, payer: &Address, amount: Amount) -> Result<(), CollaboratorError>;

    /// Collective one-time claim. Returns the number of tokens allocated to the pool.
    async fn claim(&self) -> Result<Amount, CollaboratorError>;

    /// Pull refundable native currency into the pool's vault.
    async fn refund(&self) -> Result<(), CollaboratorError>;

    async fn compensation(&self, account: &Address) -> Result<Amount, CollaboratorError>;

    async fn withdraw_compensation(&self) -> Result<(), CollaboratorError>;
}

/// The pool's own native-currency balance.
#[async_trait]
pub trait NativeVault: Send + Sync + fmt::Debug {
    async fn balance(&self) -> Result<Amount, CollaboratorError>;

    async fn send(&self, to: &Address, amount: Amount) -> Result<(), CollaboratorError>;
}

/// Handles to every collaborator a pool needs.
#[derive(Debug, Clone)]
pub struct Collaborators {
    pub ledger: Arc<dyn TokenLedger>,
    pub escrow: Arc<dyn StakeEscrow>,
    pub auction: Arc<dyn Auction>,
    pub vault: Arc<dyn NativeVault>,
}

impl Collaborators {
    /// Back all four collaborators with one simulated world.
    pub fn simulated(sim: Arc<Simulator>) -> Self {
        Self {
            ledger: sim.clone(),
            escrow: sim.clone(),
            auction: sim.clone(),
            vault: sim,
        }
    }
}

/// Error type for collaborator calls. Any of these aborts the calling operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("call rejected: {0}")]
    Rejected(String),
    #[error("insufficient funds: needed {needed}, had {available}")]
    InsufficientFunds { needed: Amount, available: Amount },
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_error_display() {
        let err = CollaboratorError::Rejected("allowance".to_string());
        assert_eq!(err.to_string(), "call rejected: allowance");

        let err = CollaboratorError::InsufficientFunds {
            needed: 10,
            available: 3,
        };
        assert_eq!(err.to_string(), "insufficient funds: needed 10, had 3");

        let err = CollaboratorError::Unavailable("rpc down".to_string());
        assert_eq!(err.to_string(), "collaborator unavailable: rpc down");
    }
}
