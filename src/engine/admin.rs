//! Owner-gated administration of a pool.

use super::settlement::PoolEngine;
use super::PoolError;
use crate::domain::{Address, PoolEvent};
use tracing::info;

impl PoolEngine {
    pub(crate) fn ensure_owner(&self, caller: &Address) -> Result<(), PoolError> {
        if caller != &self.state.owner {
            return Err(PoolError::PreconditionFailed(
                "caller is not the owner".to_string(),
            ));
        }
        Ok(())
    }

    /// Open or close the pool to new deposits. Withdrawals are never gated.
    pub fn set_deposits_enabled(&mut self, caller: &Address, enabled: bool) -> Result<(), PoolError> {
        self.ensure_owner(caller)?;
        self.state.deposits_enabled = enabled;
        self.emit(PoolEvent::DepositSet {
            account: caller.clone(),
            enabled,
        });
        info!(enabled, "Deposits toggled");
        Ok(())
    }

    pub fn transfer_ownership(
        &mut self,
        caller: &Address,
        new_owner: Address,
    ) -> Result<(), PoolError> {
        self.ensure_owner(caller)?;
        if new_owner == self.state.address {
            return Err(PoolError::PreconditionFailed(
                "the pool cannot own itself".to_string(),
            ));
        }
        self.state.owner = new_owner.clone();
        info!(new_owner = %new_owner, "Ownership transferred");
        self.emit(PoolEvent::OwnershipTransferred {
            account: caller.clone(),
            new_owner,
        });
        Ok(())
    }

    /// Redirect the worker's share. Reward already paid stays with the old worker.
    pub fn set_worker(&mut self, caller: &Address, new_worker: Address) -> Result<(), PoolError> {
        self.ensure_owner(caller)?;
        if new_worker == self.state.address {
            return Err(PoolError::PreconditionFailed(
                "the pool cannot be its own worker".to_string(),
            ));
        }
        self.state.worker = new_worker.clone();
        info!(new_worker = %new_worker, "Worker changed");
        self.emit(PoolEvent::WorkerSet {
            account: caller.clone(),
            new_worker,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::collaborators::{Collaborators, Simulator};
    use crate::domain::{Address, PoolConfig, PoolEvent};
    use crate::engine::{PoolEngine, PoolError};
    use std::sync::Arc;

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    fn engine() -> (PoolEngine, Arc<Simulator>) {
        let sim = Arc::new(Simulator::new(addr(1)));
        let engine = PoolEngine::new(
            PoolConfig {
                address: addr(1),
                owner: addr(2),
                worker: addr(3),
                worker_fraction: 0,
                deposits_enabled: true,
            },
            Collaborators::simulated(sim.clone()),
        )
        .unwrap();
        (engine, sim)
    }

    #[tokio::test]
    async fn test_disabling_deposits_blocks_only_deposits() {
        let (mut engine, sim) = engine();
        sim.mint_tokens(&addr(10), 10);
        engine.deposit(&addr(10), 5).await.unwrap();

        engine.set_deposits_enabled(&addr(2), false).unwrap();
        let err = engine.deposit(&addr(10), 5).await.unwrap_err();
        assert_eq!(
            err,
            PoolError::PreconditionFailed("deposits are disabled".to_string())
        );
        engine.withdraw(&addr(10), 5).await.unwrap();

        engine.set_deposits_enabled(&addr(2), true).unwrap();
        engine.deposit(&addr(10), 5).await.unwrap();
    }

    #[test]
    fn test_admin_requires_owner() {
        let (mut engine, _sim) = engine();
        assert!(engine.set_deposits_enabled(&addr(9), false).is_err());
        assert!(engine.transfer_ownership(&addr(9), addr(9)).is_err());
        assert!(engine.set_worker(&addr(9), addr(9)).is_err());
        assert!(engine.state().deposits_enabled);
        assert!(engine.drain_events().is_empty());
    }

    #[test]
    fn test_transfer_ownership_hands_over_control() {
        let (mut engine, _sim) = engine();
        engine.transfer_ownership(&addr(2), addr(4)).unwrap();
        assert_eq!(engine.state().owner, addr(4));
        assert!(engine.set_deposits_enabled(&addr(2), false).is_err());
        engine.set_deposits_enabled(&addr(4), false).unwrap();

        let events = engine.drain_events();
        assert_eq!(
            events[0].event,
            PoolEvent::OwnershipTransferred {
                account: addr(2),
                new_owner: addr(4),
            }
        );
    }

    #[test]
    fn test_set_worker() {
        let (mut engine, _sim) = engine();
        assert!(engine.set_worker(&addr(2), addr(1)).is_err());
        engine.set_worker(&addr(2), addr(5)).unwrap();
        assert_eq!(engine.state().worker, addr(5));
        assert_eq!(engine.drain_events()[0].event.kind(), "workerSet");
    }
}
