//! Per-account delegator record.

use crate::domain::primitives::{amount_string, Amount};
use serde::{Deserialize, Serialize};

/// One depositor's standing in the pool.
///
/// Created zeroed on first access and never removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delegator {
    /// Current principal share.
    #[serde(with = "amount_string")]
    pub deposited_tokens: Amount,
    /// Reward already paid, rebased whenever principal shrinks.
    #[serde(with = "amount_string")]
    pub withdrawn_reward: Amount,
    /// Native currency already paid, rebased whenever principal shrinks.
    #[serde(with = "amount_string")]
    pub withdrawn_eth: Amount,
    /// Contribution to the collective auction bid.
    #[serde(with = "amount_string")]
    pub deposited_eth_work_lock: Amount,
    /// Portion of the auction refund already paid out.
    #[serde(with = "amount_string")]
    pub refunded_eth_work_lock: Amount,
    /// Set once this account's share of the auction claim has been added to principal.
    pub claimed_work_lock_tokens: bool,
}

impl Delegator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the account never deposited, bid, or got paid.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
