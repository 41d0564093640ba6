//! One-time conversion of an account's share of the collective auction claim into principal.

use super::math::{add, mul_div};
use super::PoolError;
use crate::domain::{Address, Amount, Delegator, PoolState, PoolTotals};

/// The account's share of the collective claim, if it is due and not yet applied.
pub fn due_claim(totals: &PoolTotals, delegator: &Delegator) -> Result<Option<Amount>, PoolError> {
    if totals.work_lock_claimed_tokens == 0
        || delegator.deposited_eth_work_lock == 0
        || delegator.claimed_work_lock_tokens
    {
        return Ok(None);
    }
    let share = mul_div(
        delegator.deposited_eth_work_lock,
        totals.work_lock_claimed_tokens,
        totals.total_work_lock_eth_received,
    )?;
    Ok(Some(share))
}

/// Apply the claim to the ledger. Returns the credited amount on the first call,
/// `None` on every later call and whenever nothing is due.
pub fn apply_claim_if_due(
    state: &mut PoolState,
    account: &Address,
) -> Result<Option<Amount>, PoolError> {
    let delegator = state.delegator(account);
    let Some(share) = due_claim(&state.totals, &delegator)? else {
        return Ok(None);
    };

    let deposited = add(delegator.deposited_tokens, share, "deposited tokens")?;
    let total = add(
        state.totals.total_deposited_tokens,
        share,
        "total deposited tokens",
    )?;
    let applied = add(
        state.totals.work_lock_applied_tokens,
        share,
        "applied claim tokens",
    )?;

    state.totals.total_deposited_tokens = total;
    state.totals.work_lock_applied_tokens = applied;
    let record = state.delegator_mut(account);
    record.deposited_tokens = deposited;
    record.claimed_work_lock_tokens = true;

    tracing::info!(account = %account, share = %share, "Applied auction claim share");
    Ok(Some(share))
}

/// Totals and record as they will look once the claim trigger has run for `account`.
///
/// Lets read-only queries report exactly what a withdrawal would pay.
pub fn projected(state: &PoolState, account: &Address) -> Result<(PoolTotals, Delegator), PoolError> {
    let mut totals = state.totals;
    let mut delegator = state.delegator(account);
    if let Some(share) = due_claim(&totals, &delegator)? {
        delegator.deposited_tokens = add(delegator.deposited_tokens, share, "deposited tokens")?;
        delegator.claimed_work_lock_tokens = true;
        totals.total_deposited_tokens = add(
            totals.total_deposited_tokens,
            share,
            "total deposited tokens",
        )?;
        totals.work_lock_applied_tokens = add(
            totals.work_lock_applied_tokens,
            share,
            "applied claim tokens",
        )?;
    }
    Ok((totals, delegator))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PoolConfig;

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    fn claimed_state() -> PoolState {
        let mut s = PoolState::new(PoolConfig {
            address: addr(1),
            owner: addr(2),
            worker: addr(3),
            worker_fraction: 10,
            deposits_enabled: true,
        })
        .unwrap();
        s.delegator_mut(&addr(10)).deposited_eth_work_lock = 3;
        s.delegator_mut(&addr(11)).deposited_eth_work_lock = 7;
        s.totals.total_work_lock_eth_received = 10;
        s.totals.work_lock_claimed_tokens = 1001;
        s
    }

    #[test]
    fn test_claim_applies_once() {
        let mut s = claimed_state();
        assert_eq!(apply_claim_if_due(&mut s, &addr(10)).unwrap(), Some(300));
        let after_first = s.clone();
        assert_eq!(apply_claim_if_due(&mut s, &addr(10)).unwrap(), None);
        assert_eq!(s, after_first);
        assert_eq!(s.delegator(&addr(10)).deposited_tokens, 300);
        assert_eq!(s.totals.total_deposited_tokens, 300);
        assert_eq!(s.totals.pending_claim(), 701);
    }

    #[test]
    fn test_claim_floors_and_leaves_dust_pending() {
        let mut s = claimed_state();
        apply_claim_if_due(&mut s, &addr(10)).unwrap();
        assert_eq!(apply_claim_if_due(&mut s, &addr(11)).unwrap(), Some(700));
        assert_eq!(s.totals.work_lock_applied_tokens, 1000);
        assert_eq!(s.totals.pending_claim(), 1);
        assert!(s.invariant_violations().is_empty());
    }

    #[test]
    fn test_claim_noop_without_bid_or_before_collective_claim() {
        let mut s = claimed_state();
        assert_eq!(apply_claim_if_due(&mut s, &addr(12)).unwrap(), None);
        assert_eq!(s.delegator_count(), 2);

        s.totals.work_lock_claimed_tokens = 0;
        assert_eq!(apply_claim_if_due(&mut s, &addr(10)).unwrap(), None);
        assert!(!s.delegator(&addr(10)).claimed_work_lock_tokens);
    }

    #[test]
    fn test_projection_matches_application() {
        let s = claimed_state();
        let (totals, delegator) = projected(&s, &addr(11)).unwrap();
        let mut applied = s.clone();
        apply_claim_if_due(&mut applied, &addr(11)).unwrap();
        assert_eq!(delegator, applied.delegator(&addr(11)));
        assert_eq!(totals, applied.totals);
    }
}
