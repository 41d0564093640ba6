//! Audit events emitted by successful pool operations.

use crate::domain::primitives::{amount_string, Address, Amount, TimeMs};
use serde::{Deserialize, Serialize};

/// Observable side effect of an operation, used for off-chain reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PoolEvent {
    #[serde(rename_all = "camelCase")]
    TokensDeposited {
        account: Address,
        #[serde(with = "amount_string")]
        value: Amount,
        #[serde(with = "amount_string")]
        deposited_tokens: Amount,
    },
    #[serde(rename_all = "camelCase")]
    TokensWithdrawn {
        account: Address,
        #[serde(with = "amount_string")]
        value: Amount,
        #[serde(with = "amount_string")]
        deposited_tokens: Amount,
    },
    #[serde(rename_all = "camelCase")]
    EthWithdrawn {
        account: Address,
        #[serde(with = "amount_string")]
        value: Amount,
    },
    #[serde(rename_all = "camelCase")]
    Bid {
        account: Address,
        #[serde(with = "amount_string")]
        value: Amount,
    },
    /// Per-account claim allocation, or the collective claim when `account` is the pool.
    #[serde(rename_all = "camelCase")]
    WorkLockTokensClaimed {
        account: Address,
        #[serde(with = "amount_string")]
        value: Amount,
    },
    #[serde(rename_all = "camelCase")]
    RefundReceived {
        account: Address,
        #[serde(with = "amount_string")]
        value: Amount,
    },
    #[serde(rename_all = "camelCase")]
    RefundWithdrawn {
        account: Address,
        #[serde(with = "amount_string")]
        value: Amount,
    },
    #[serde(rename_all = "camelCase")]
    DepositSet { account: Address, enabled: bool },
    #[serde(rename_all = "camelCase")]
    OwnershipTransferred {
        account: Address,
        new_owner: Address,
    },
    #[serde(rename_all = "camelCase")]
    WorkerSet {
        account: Address,
        new_worker: Address,
    },
}

impl PoolEvent {
    /// Short stable name, also used as the `kind` column.
    pub fn kind(&self) -> &'static str {
        match self {
            PoolEvent::TokensDeposited { .. } => "tokensDeposited",
            PoolEvent::TokensWithdrawn { .. } => "tokensWithdrawn",
            PoolEvent::EthWithdrawn { .. } => "ethWithdrawn",
            PoolEvent::Bid { .. } => "bid",
            PoolEvent::WorkLockTokensClaimed { .. } => "workLockTokensClaimed",
            PoolEvent::RefundReceived { .. } => "refundReceived",
            PoolEvent::RefundWithdrawn { .. } => "refundWithdrawn",
            PoolEvent::DepositSet { .. } => "depositSet",
            PoolEvent::OwnershipTransferred { .. } => "ownershipTransferred",
            PoolEvent::WorkerSet { .. } => "workerSet",
        }
    }

    /// The acting account.
    pub fn account(&self) -> &Address {
        match self {
            PoolEvent::TokensDeposited { account, .. }
            | PoolEvent::TokensWithdrawn { account, .. }
            | PoolEvent::EthWithdrawn { account, .. }
            | PoolEvent::Bid { account, .. }
            | PoolEvent::WorkLockTokensClaimed { account, .. }
            | PoolEvent::RefundReceived { account, .. }
            | PoolEvent::RefundWithdrawn { account, .. }
            | PoolEvent::DepositSet { account, .. }
            | PoolEvent::OwnershipTransferred { account, .. }
            | PoolEvent::WorkerSet { account, .. } => account,
        }
    }

    /// The amount moved, if the event moves value.
    pub fn value(&self) -> Option<Amount> {
        match self {
            PoolEvent::TokensDeposited { value, .. }
            | PoolEvent::TokensWithdrawn { value, .. }
            | PoolEvent::EthWithdrawn { value, .. }
            | PoolEvent::Bid { value, .. }
            | PoolEvent::WorkLockTokensClaimed { value, .. }
            | PoolEvent::RefundReceived { value, .. }
            | PoolEvent::RefundWithdrawn { value, .. } => Some(*value),
            PoolEvent::DepositSet { .. }
            | PoolEvent::OwnershipTransferred { .. }
            | PoolEvent::WorkerSet { .. } => None,
        }
    }
}

/// A sequenced, keyed event as handed to persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub seq: u64,
    pub time_ms: TimeMs,
    pub event_key: String,
    pub event: PoolEvent,
}

impl EventRecord {
    pub fn new(seq: u64, time_ms: TimeMs, event: PoolEvent) -> Self {
        let event_key = Self::compute_event_key(seq, &event);
        Self {
            seq,
            time_ms,
            event_key,
            event,
        }
    }

    /// Stable key for idempotent storage.
    ///
    /// SHA-256 over length-prefixed (seq, kind, account, value), truncated to 128 bits.
    pub fn compute_event_key(seq: u64, event: &PoolEvent) -> String {
        use sha2::{Digest, Sha256};

        fn hash_var(hasher: &mut Sha256, data: &str) {
            hasher.update((data.len() as u32).to_le_bytes());
            hasher.update(data.as_bytes());
        }

        let mut hasher = Sha256::new();
        hasher.update(seq.to_le_bytes());
        hash_var(&mut hasher, event.kind());
        hash_var(&mut hasher, event.account().as_str());
        hasher.update(event.value().unwrap_or(0).to_le_bytes());

        let hash = hasher.finalize();
        format!("evt:{}", hex::encode(&hash[..16]))
    }
}
