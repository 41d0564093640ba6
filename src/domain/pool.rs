//! Pool-wide state: totals, administrative settings, and the delegator ledger.

use crate::domain::delegator::Delegator;
use crate::domain::primitives::{amount_string, Address, Amount};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Denominator for `worker_fraction`.
pub const BASIS_FRACTION: Amount = 100;

/// Construction parameters for a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// The pool's own account on the ledger, escrow, auction and vault.
    pub address: Address,
    pub owner: Address,
    pub worker: Address,
    /// Share of all reward reserved for the worker, out of `BASIS_FRACTION`.
    pub worker_fraction: Amount,
    pub deposits_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolConfigError {
    #[error("worker fraction {0} exceeds basis {}", BASIS_FRACTION)]
    WorkerFractionTooLarge(Amount),
    #[error("{0} address must differ from the pool address")]
    SelfReference(&'static str),
}

impl PoolConfig {
    pub fn validate(&self) -> Result<(), PoolConfigError> {
        if self.worker_fraction > BASIS_FRACTION {
            return Err(PoolConfigError::WorkerFractionTooLarge(self.worker_fraction));
        }
        if self.owner == self.address {
            return Err(PoolConfigError::SelfReference("owner"));
        }
        if self.worker == self.address {
            return Err(PoolConfigError::SelfReference("worker"));
        }
        Ok(())
    }
}

/// Cumulative pool counters.
///
/// Small and `Copy` so an operation can checkpoint them before mutating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolTotals {
    #[serde(with = "amount_string")]
    pub total_deposited_tokens: Amount,
    #[serde(with = "amount_string")]
    pub work_lock_claimed_tokens: Amount,
    /// Portion of `work_lock_claimed_tokens` already moved into some account's principal.
    #[serde(with = "amount_string")]
    pub work_lock_applied_tokens: Amount,
    #[serde(with = "amount_string")]
    pub total_withdrawn_reward: Amount,
    #[serde(with = "amount_string")]
    pub total_withdrawn_eth: Amount,
    #[serde(with = "amount_string")]
    pub total_work_lock_eth_received: Amount,
    #[serde(with = "amount_string")]
    pub total_work_lock_eth_refunded: Amount,
    #[serde(with = "amount_string")]
    pub total_work_lock_eth_withdrawn: Amount,
    #[serde(with = "amount_string")]
    pub worker_withdrawn_reward: Amount,
}

impl PoolTotals {
    /// Claimed auction tokens held by the pool but not yet attributed to any account.
    pub fn pending_claim(&self) -> Amount {
        self.work_lock_claimed_tokens
            .saturating_sub(self.work_lock_applied_tokens)
    }
}

/// Complete engine state. One instance per pool, owned by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolState {
    pub address: Address,
    pub owner: Address,
    pub worker: Address,
    #[serde(with = "amount_string")]
    pub worker_fraction: Amount,
    pub deposits_enabled: bool,
    pub totals: PoolTotals,
    delegators: BTreeMap<Address, Delegator>,
}

impl PoolState {
    pub fn new(config: PoolConfig) -> Result<Self, PoolConfigError> {
        config.validate()?;
        Ok(Self {
            address: config.address,
            owner: config.owner,
            worker: config.worker,
            worker_fraction: config.worker_fraction,
            deposits_enabled: config.deposits_enabled,
            totals: PoolTotals::default(),
            delegators: BTreeMap::new(),
        })
    }

    /// Copy of an account's record; a zeroed record if the account is unknown.
    pub fn delegator(&self, account: &Address) -> Delegator {
        self.delegators.get(account).copied().unwrap_or_default()
    }

    /// Mutable record for an account, created zeroed on first access.
    pub fn delegator_mut(&mut self, account: &Address) -> &mut Delegator {
        self.delegators.entry(account.clone()).or_default()
    }

    /// Put a previously checkpointed record back.
    ///
    /// `None` means the record did not exist before; it is removed again so a
    /// failed first operation leaves no trace.
    pub(crate) fn restore_delegator(&mut self, account: &Address, record: Option<Delegator>) {
        match record {
            Some(record) => {
                self.delegators.insert(account.clone(), record);
            }
            None => {
                self.delegators.remove(account);
            }
        }
    }

    pub(crate) fn existing_delegator(&self, account: &Address) -> Option<Delegator> {
        self.delegators.get(account).copied()
    }

    pub fn delegators(&self) -> impl Iterator<Item = (&Address, &Delegator)> {
        self.delegators.iter()
    }

    pub fn delegator_count(&self) -> usize {
        self.delegators.len()
    }

    /// Describe every broken ledger invariant. Empty when the ledger is consistent.
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut deposited: Amount = 0;
        let mut withdrawn_reward: Amount = 0;
        let mut withdrawn_eth: Amount = 0;
        let mut bid: Amount = 0;
        let mut refunded: Amount = 0;
        for d in self.delegators.values() {
            deposited = deposited.saturating_add(d.deposited_tokens);
            withdrawn_reward = withdrawn_reward.saturating_add(d.withdrawn_reward);
            withdrawn_eth = withdrawn_eth.saturating_add(d.withdrawn_eth);
            bid = bid.saturating_add(d.deposited_eth_work_lock);
            refunded = refunded.saturating_add(d.refunded_eth_work_lock);
        }

        let t = &self.totals;
        let mut out = Vec::new();
        if deposited != t.total_deposited_tokens {
            out.push(format!(
                "total deposited {} != sum of principal {}",
                t.total_deposited_tokens, deposited
            ));
        }
        let reward_paid = withdrawn_reward.saturating_add(t.worker_withdrawn_reward);
        if reward_paid != t.total_withdrawn_reward {
            out.push(format!(
                "total withdrawn reward {} != delegator and worker payouts {}",
                t.total_withdrawn_reward, reward_paid
            ));
        }
        if withdrawn_eth != t.total_withdrawn_eth {
            out.push(format!(
                "total withdrawn eth {} != sum of payouts {}",
                t.total_withdrawn_eth, withdrawn_eth
            ));
        }
        if bid != t.total_work_lock_eth_received {
            out.push(format!(
                "auction eth received {} != sum of bids {}",
                t.total_work_lock_eth_received, bid
            ));
        }
        if refunded != t.total_work_lock_eth_withdrawn {
            out.push(format!(
                "refund withdrawn {} != sum of refunds paid {}",
                t.total_work_lock_eth_withdrawn, refunded
            ));
        }
        if t.total_work_lock_eth_withdrawn > t.total_work_lock_eth_refunded {
            out.push(format!(
                "refund withdrawn {} exceeds refund received {}",
                t.total_work_lock_eth_withdrawn, t.total_work_lock_eth_refunded
            ));
        }
        if t.work_lock_applied_tokens > t.work_lock_claimed_tokens {
            out.push(format!(
                "applied claim {} exceeds collective claim {}",
                t.work_lock_applied_tokens, t.work_lock_claimed_tokens
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(fraction: Amount) -> PoolConfig {
        PoolConfig {
            address: Address::from_bytes([1; 20]),
            owner: Address::from_bytes([2; 20]),
            worker: Address::from_bytes([3; 20]),
            worker_fraction: fraction,
            deposits_enabled: true,
        }
    }

    #[test]
    fn test_config_rejects_oversized_fraction() {
        assert_eq!(
            PoolState::new(config(101)).unwrap_err(),
            PoolConfigError::WorkerFractionTooLarge(101)
        );
        assert!(PoolState::new(config(100)).is_ok());
    }

    #[test]
    fn test_config_rejects_self_reference() {
        let mut cfg = config(10);
        cfg.worker = cfg.address.clone();
        assert_eq!(
            cfg.validate(),
            Err(PoolConfigError::SelfReference("worker"))
        );
    }

    #[test]
    fn test_unknown_delegator_reads_as_zero_without_insert() {
        let state = PoolState::new(config(10)).unwrap();
        let who = Address::from_bytes([9; 20]);
        assert!(state.delegator(&who).is_empty());
        assert_eq!(state.delegator_count(), 0);
    }

    #[test]
    fn test_invariant_violations_detects_drift() {
        let mut state = PoolState::new(config(10)).unwrap();
        let who = Address::from_bytes([9; 20]);
        state.delegator_mut(&who).deposited_tokens = 50;
        assert_eq!(state.invariant_violations().len(), 1);
        state.totals.total_deposited_tokens = 50;
        assert!(state.invariant_violations().is_empty());
    }

    #[test]
    fn test_restore_removes_fresh_record() {
        let mut state = PoolState::new(config(10)).unwrap();
        let who = Address::from_bytes([9; 20]);
        let before = state.existing_delegator(&who);
        state.delegator_mut(&who).deposited_tokens = 5;
        state.restore_delegator(&who, before);
        assert_eq!(state.delegator_count(), 0);
    }
}
