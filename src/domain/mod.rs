//! Domain types for the pooled-stake ledger.
//!
//! This module provides:
//! - Domain primitives: Amount, TimeMs, Address
//! - The per-account Delegator record
//! - Pool-wide state with the delegator ledger
//! - Audit events with stable storage keys

pub mod delegator;
pub mod event;
pub mod pool;
pub mod primitives;

pub use delegator::Delegator;
pub use event::{EventRecord, PoolEvent};
pub use pool::{PoolConfig, PoolConfigError, PoolState, PoolTotals, BASIS_FRACTION};
pub use primitives::{amount_string, Address, AddressParseError, Amount, TimeMs};
