//! Read-only entitlement computations.
//!
//! Every figure is derived from scratch off the pool totals and live collaborator
//! balances, never from an incrementally maintained running share. Operation order
//! follows the formulas literally: multiply first, one floor division last.

use super::math::{add, mul_div, mul_mul_div, sub};
use super::PoolError;
use crate::domain::{amount_string, Amount, Delegator, PoolTotals, BASIS_FRACTION};
use serde::Serialize;

/// Collaborator balances read at the start of an operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveBalances {
    /// Stake the escrow holds for the pool.
    #[serde(with = "amount_string")]
    pub staked: Amount,
    /// Liquid tokens on the pool's ledger account.
    #[serde(with = "amount_string")]
    pub free_tokens: Amount,
    /// The pool's native-currency balance.
    #[serde(with = "amount_string")]
    pub native: Amount,
}

/// Reward the pool holds right now.
///
/// Held tokens in excess of principal (including claimed auction tokens not yet
/// attributed to an account), clamped to the liquid balance. Floors at zero if the
/// escrow reports less than principal, e.g. after a slash.
pub fn available_reward(totals: &PoolTotals, live: &LiveBalances) -> Result<Amount, PoolError> {
    let held = add(live.staked, live.free_tokens, "held tokens")?;
    let principal = share_base(totals)?;
    let reward = held.saturating_sub(principal);
    Ok(reward.min(live.free_tokens))
}

/// All reward the pool ever earned: what it holds plus what it already paid.
pub fn cumulative_reward(totals: &PoolTotals, live: &LiveBalances) -> Result<Amount, PoolError> {
    add(
        available_reward(totals, live)?,
        totals.total_withdrawn_reward,
        "cumulative reward",
    )
}

/// Principal that shares are measured against.
///
/// Claimed auction tokens not yet applied still belong to their bidders, so they
/// count as owned even though no record carries them yet. Applying a share moves
/// it from pending to deposited and leaves this sum unchanged.
pub fn share_base(totals: &PoolTotals) -> Result<Amount, PoolError> {
    add(
        totals.total_deposited_tokens,
        totals.pending_claim(),
        "share base",
    )
}

/// Worker's unpaid share of cumulative reward.
pub fn available_worker_reward(
    totals: &PoolTotals,
    worker_fraction: Amount,
    live: &LiveBalances,
) -> Result<Amount, PoolError> {
    let reward = cumulative_reward(totals, live)?;
    let max_allowable = if share_base(totals)? != 0 {
        mul_div(reward, worker_fraction, BASIS_FRACTION)?
    } else {
        reward
    };
    Ok(max_allowable.saturating_sub(totals.worker_withdrawn_reward))
}

/// A delegator's unpaid share of cumulative reward, net of the worker's fraction.
pub fn available_delegator_reward(
    totals: &PoolTotals,
    worker_fraction: Amount,
    live: &LiveBalances,
    delegator: &Delegator,
) -> Result<Amount, PoolError> {
    let total = share_base(totals)?;
    if total == 0 {
        return Ok(0);
    }
    let reward = cumulative_reward(totals, live)?;
    let denom = total
        .checked_mul(BASIS_FRACTION)
        .ok_or_else(|| PoolError::InvariantViolation("total deposited overflows".into()))?;
    let max_allowable = mul_mul_div(
        reward,
        delegator.deposited_tokens,
        BASIS_FRACTION - worker_fraction,
        denom,
    )?;
    Ok(max_allowable.saturating_sub(delegator.withdrawn_reward))
}

/// All native currency ever available to delegators, net of auction refunds.
///
/// Current balance plus everything already paid out, minus the refund pot which
/// belongs to bidders rather than depositors.
pub fn native_pool(totals: &PoolTotals, live: &LiveBalances) -> Result<Amount, PoolError> {
    let gross = add(
        add(live.native, totals.total_withdrawn_eth, "native pool")?,
        totals.total_work_lock_eth_withdrawn,
        "native pool",
    )?;
    sub(gross, totals.total_work_lock_eth_refunded, "native pool")
}

/// A delegator's unpaid share of the native-currency pool.
pub fn available_eth(
    totals: &PoolTotals,
    live: &LiveBalances,
    delegator: &Delegator,
) -> Result<Amount, PoolError> {
    let total = share_base(totals)?;
    if total == 0 {
        return Ok(0);
    }
    let pool = native_pool(totals, live)?;
    let max_allowable = mul_div(pool, delegator.deposited_tokens, total)?;
    let available = max_allowable.saturating_sub(delegator.withdrawn_eth);
    Ok(available.min(pool))
}

/// A bidder's unpaid share of the auction refund.
pub fn available_refund(totals: &PoolTotals, delegator: &Delegator) -> Result<Amount, PoolError> {
    if totals.total_work_lock_eth_received == 0 {
        return Ok(0);
    }
    let max_allowable = mul_div(
        totals.total_work_lock_eth_refunded,
        delegator.deposited_eth_work_lock,
        totals.total_work_lock_eth_received,
    )?;
    let available = max_allowable.saturating_sub(delegator.refunded_eth_work_lock);
    let unpaid = sub(
        totals.total_work_lock_eth_refunded,
        totals.total_work_lock_eth_withdrawn,
        "unpaid refund",
    )?;
    Ok(available.min(unpaid))
}

/// Everything a single account could withdraw at this instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlements {
    #[serde(with = "amount_string")]
    pub reward: Amount,
    #[serde(with = "amount_string")]
    pub eth: Amount,
    #[serde(with = "amount_string")]
    pub refund: Amount,
    /// Upper bound for a token withdrawal: reward plus principal.
    #[serde(with = "amount_string")]
    pub max_token_withdrawal: Amount,
}

pub fn entitlements(
    totals: &PoolTotals,
    worker_fraction: Amount,
    live: &LiveBalances,
    delegator: &Delegator,
) -> Result<Entitlements, PoolError> {
    let reward = available_delegator_reward(totals, worker_fraction, live, delegator)?;
    Ok(Entitlements {
        reward,
        eth: available_eth(totals, live, delegator)?,
        refund: available_refund(totals, delegator)?,
        max_token_withdrawal: add(reward, delegator.deposited_tokens, "token entitlement")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Address, PoolConfig, PoolState};

    fn state(fraction: Amount) -> PoolState {
        PoolState::new(PoolConfig {
            address: Address::from_bytes([1; 20]),
            owner: Address::from_bytes([2; 20]),
            worker: Address::from_bytes([3; 20]),
            worker_fraction: fraction,
            deposits_enabled: true,
        })
        .unwrap()
    }

    fn with_deposits(fraction: Amount, deposits: &[(u8, Amount)]) -> PoolState {
        let mut s = state(fraction);
        for (b, v) in deposits {
            s.delegator_mut(&Address::from_bytes([*b; 20])).deposited_tokens += v;
            s.totals.total_deposited_tokens += v;
        }
        s
    }

    fn live(staked: Amount, free_tokens: Amount, native: Amount) -> LiveBalances {
        LiveBalances {
            staked,
            free_tokens,
            native,
        }
    }

    #[test]
    fn test_available_reward_clamps_to_liquid() {
        let s = with_deposits(10, &[(10, 400)]);
        // 1000 staked + 50 liquid, principal 400 -> reward 650 but only 50 liquid.
        assert_eq!(available_reward(&s.totals, &live(1000, 50, 0)).unwrap(), 50);
        assert_eq!(available_reward(&s.totals, &live(0, 440, 0)).unwrap(), 40);
    }

    #[test]
    fn test_available_reward_floors_on_shortfall() {
        let s = with_deposits(10, &[(10, 400)]);
        assert_eq!(available_reward(&s.totals, &live(0, 390, 0)).unwrap(), 0);
    }

    #[test]
    fn test_pending_claim_is_not_reward() {
        let mut s = with_deposits(10, &[(10, 400)]);
        s.totals.work_lock_claimed_tokens = 1000;
        assert_eq!(available_reward(&s.totals, &live(1000, 440, 0)).unwrap(), 40);
        s.totals.work_lock_applied_tokens = 1000;
        s.totals.total_deposited_tokens += 1000;
        assert_eq!(available_reward(&s.totals, &live(1000, 440, 0)).unwrap(), 40);
    }

    #[test]
    fn test_unapplied_claim_counts_toward_share_base() {
        // Two bidders of 500 claim shares each; only A's share is applied.
        let mut s = with_deposits(0, &[(10, 500)]);
        s.totals.work_lock_claimed_tokens = 1000;
        s.totals.work_lock_applied_tokens = 500;
        assert_eq!(share_base(&s.totals).unwrap(), 1000);

        let l = live(0, 1100, 40);
        let a = s.delegator(&Address::from_bytes([10; 20]));
        assert_eq!(available_delegator_reward(&s.totals, 0, &l, &a).unwrap(), 50);
        assert_eq!(available_eth(&s.totals, &l, &a).unwrap(), 20);
    }

    #[test]
    fn test_worker_takes_everything_without_depositors() {
        let s = state(10);
        assert_eq!(available_worker_reward(&s.totals, s.worker_fraction, &live(0, 30, 0)).unwrap(), 30);
        let d = Delegator::new();
        assert_eq!(available_delegator_reward(&s.totals, s.worker_fraction, &live(0, 30, 0), &d).unwrap(), 0);
        assert_eq!(available_eth(&s.totals, &live(0, 30, 100), &d).unwrap(), 0);
    }

    #[test]
    fn test_delegator_reward_floors_when_overpaid() {
        let s = with_deposits(10, &[(10, 100), (11, 300)]);
        let mut d = s.delegator(&Address::from_bytes([10; 20]));
        d.withdrawn_reward = 50;
        assert_eq!(available_delegator_reward(&s.totals, s.worker_fraction, &live(0, 440, 0), &d).unwrap(), 0);
    }

    #[test]
    fn test_available_eth_proportional_and_net_of_refund_pot() {
        let mut s = with_deposits(0, &[(10, 100), (11, 300)]);
        // 80 native from fees plus a 20 refund pot that belongs to bidders.
        s.totals.total_work_lock_eth_refunded = 20;
        let l = live(0, 400, 100);
        assert_eq!(native_pool(&s.totals, &l).unwrap(), 80);
        let a = s.delegator(&Address::from_bytes([10; 20]));
        let b = s.delegator(&Address::from_bytes([11; 20]));
        assert_eq!(available_eth(&s.totals, &l, &a).unwrap(), 20);
        assert_eq!(available_eth(&s.totals, &l, &b).unwrap(), 60);
    }

    #[test]
    fn test_available_refund_clamped_to_unpaid() {
        let mut s = state(0);
        s.totals.total_work_lock_eth_received = 10;
        s.totals.total_work_lock_eth_refunded = 10;
        s.totals.total_work_lock_eth_withdrawn = 9;
        let mut d = Delegator::new();
        d.deposited_eth_work_lock = 8;
        assert_eq!(available_refund(&s.totals, &d).unwrap(), 1);
    }

    #[test]
    fn test_available_refund_zero_without_bids() {
        let s = state(0);
        assert_eq!(available_refund(&s.totals, &Delegator::new()).unwrap(), 0);
    }
}
