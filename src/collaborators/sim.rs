//! In-memory simulation of the ledger, escrow, auction and vault.
//!
//! A single world backs all four collaborator traits so value moves between
//! them the way it does on chain: claimed auction tokens land in the pool's
//! stake, refunds and compensation land in the pool's native balance.

use super::{Auction, CollaboratorError, NativeVault, StakeEscrow, TokenLedger};
use crate::domain::{Address, Amount};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// Collaborator calls that can be made to fail once via [`Simulator::fail_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimCall {
    TransferFrom,
    Transfer,
    BalanceOf,
    TotalHeldBy,
    Bid,
    Claim,
    Refund,
    Compensation,
    WithdrawCompensation,
    NativeBalance,
    Send,
}

#[derive(Debug, Default)]
struct World {
    tokens: HashMap<Address, Amount>,
    native: HashMap<Address, Amount>,
    stake: HashMap<Address, Amount>,
    auction_bids: Amount,
    claimable: Amount,
    claimed: bool,
    refundable: Amount,
    compensation: Amount,
    failures: HashSet<SimCall>,
}

impl World {
    fn check(&mut self, call: SimCall) -> Result<(), CollaboratorError> {
        if self.failures.remove(&call) {
            return Err(CollaboratorError::Unavailable(format!(
                "injected failure on {:?}",
                call
            )));
        }
        Ok(())
    }
}

fn debit(
    balances: &mut HashMap<Address, Amount>,
    account: &Address,
    amount: Amount,
) -> Result<(), CollaboratorError> {
    let available = balances.get(account).copied().unwrap_or(0);
    if available < amount {
        return Err(CollaboratorError::InsufficientFunds {
            needed: amount,
            available,
        });
    }
    balances.insert(account.clone(), available - amount);
    Ok(())
}

fn credit(balances: &mut HashMap<Address, Amount>, account: &Address, amount: Amount) {
    let entry = balances.entry(account.clone()).or_insert(0);
    *entry = entry.saturating_add(amount);
}

/// Simulated collaborators for one pool account.
#[derive(Debug)]
pub struct Simulator {
    pool: Address,
    world: Mutex<World>,
}

impl Simulator {
    pub fn new(pool: Address) -> Self {
        Self {
            pool,
            world: Mutex::new(World::default()),
        }
    }

    pub fn pool(&self) -> &Address {
        &self.pool
    }

    fn world(&self) -> MutexGuard<'_, World> {
        self.world.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Give `account` liquid tokens.
    pub fn mint_tokens(&self, account: &Address, amount: Amount) {
        credit(&mut self.world().tokens, account, amount);
    }

    /// Staking reward accrues inside the escrow on the pool's stake.
    pub fn accrue_stake_reward(&self, amount: Amount) {
        let pool = self.pool.clone();
        credit(&mut self.world().stake, &pool, amount);
    }

    /// Move stake out of the escrow into the pool's liquid token balance.
    pub fn unstake(&self, amount: Amount) -> Result<(), CollaboratorError> {
        let mut world = self.world();
        debit(&mut world.stake, &self.pool, amount)?;
        credit(&mut world.tokens, &self.pool, amount);
        Ok(())
    }

    /// Native currency paid to the pool from outside (e.g. staking fees).
    pub fn receive_native(&self, amount: Amount) {
        let pool = self.pool.clone();
        credit(&mut self.world().native, &pool, amount);
    }

    /// Give `account` native currency to bid with.
    pub fn fund_native(&self, account: &Address, amount: Amount) {
        credit(&mut self.world().native, account, amount);
    }

    /// Tokens the auction will allocate to the pool on `claim`.
    pub fn set_claimable_tokens(&self, amount: Amount) {
        self.world().claimable = amount;
    }

    /// Native currency the auction will return on the next `refund`.
    pub fn set_refundable(&self, amount: Amount) {
        self.world().refundable = amount;
    }

    pub fn set_compensation(&self, amount: Amount) {
        self.world().compensation = amount;
    }

    /// Make the next call of `call` fail with `Unavailable`.
    pub fn fail_next(&self, call: SimCall) {
        self.world().failures.insert(call);
    }

    pub fn token_balance(&self, account: &Address) -> Amount {
        self.world().tokens.get(account).copied().unwrap_or(0)
    }

    pub fn native_balance(&self, account: &Address) -> Amount {
        self.world().native.get(account).copied().unwrap_or(0)
    }

    pub fn stake_of(&self, account: &Address) -> Amount {
        self.world().stake.get(account).copied().unwrap_or(0)
    }

    pub fn auction_bids(&self) -> Amount {
        self.world().auction_bids
    }
}

#[async_trait]
impl TokenLedger for Simulator {
    async fn transfer_from(
        &self,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), CollaboratorError> {
        let mut world = self.world();
        world.check(SimCall::TransferFrom)?;
        debit(&mut world.tokens, from, amount)?;
        credit(&mut world.tokens, to, amount);
        Ok(())
    }

    async fn transfer(&self, to: &Address, amount: Amount) -> Result<(), CollaboratorError> {
        let mut world = self.world();
        world.check(SimCall::Transfer)?;
        debit(&mut world.tokens, &self.pool, amount)?;
        credit(&mut world.tokens, to, amount);
        Ok(())
    }

    async fn balance_of(&self, account: &Address) -> Result<Amount, CollaboratorError> {
        let mut world = self.world();
        world.check(SimCall::BalanceOf)?;
        Ok(world.tokens.get(account).copied().unwrap_or(0))
    }
}

#[async_trait]
impl StakeEscrow for Simulator {
    async fn total_held_by(&self, account: &Address) -> Result<Amount, CollaboratorError> {
        let mut world = self.world();
        world.check(SimCall::TotalHeldBy)?;
        Ok(world.stake.get(account).copied().unwrap_or(0))
    }
}

#[async_trait]
impl Auction for Simulator {
    async fn bid(&self, payer: &Address, amount: Amount) -> Result<(), CollaboratorError> {
        let mut world = self.world();
        world.check(SimCall::Bid)?;
        if world.claimed {
            return Err(CollaboratorError::Rejected("bidding is closed".to_string()));
        }
        debit(&mut world.native, payer, amount)?;
        world.auction_bids = world.auction_bids.saturating_add(amount);
        Ok(())
    }

    async fn claim(&self) -> Result<Amount, CollaboratorError> {
        let mut world = self.world();
        world.check(SimCall::Claim)?;
        if world.claimed {
            return Err(CollaboratorError::Rejected("tokens already claimed".to_string()));
        }
        world.claimed = true;
        let amount = std::mem::take(&mut world.claimable);
        credit(&mut world.stake, &self.pool, amount);
        Ok(amount)
    }

    async fn refund(&self) -> Result<(), CollaboratorError> {
        let mut world = self.world();
        world.check(SimCall::Refund)?;
        let amount = std::mem::take(&mut world.refundable);
        world.auction_bids = world.auction_bids.saturating_sub(amount);
        credit(&mut world.native, &self.pool, amount);
        Ok(())
    }

    async fn compensation(&self, account: &Address) -> Result<Amount, CollaboratorError> {
        let mut world = self.world();
        world.check(SimCall::Compensation)?;
        if account == &self.pool {
            Ok(world.compensation)
        } else {
            Ok(0)
        }
    }

    async fn withdraw_compensation(&self) -> Result<(), CollaboratorError> {
        let mut world = self.world();
        world.check(SimCall::WithdrawCompensation)?;
        let amount = std::mem::take(&mut world.compensation);
        if amount == 0 {
            return Err(CollaboratorError::Rejected("no compensation".to_string()));
        }
        credit(&mut world.native, &self.pool, amount);
        Ok(())
    }
}

#[async_trait]
impl NativeVault for Simulator {
    async fn balance(&self) -> Result<Amount, CollaboratorError> {
        let mut world = self.world();
        world.check(SimCall::NativeBalance)?;
        Ok(world.native.get(&self.pool).copied().unwrap_or(0))
    }

    async fn send(&self, to: &Address, amount: Amount) -> Result<(), CollaboratorError> {
        let mut world = self.world();
        world.check(SimCall::Send)?;
        debit(&mut world.native, &self.pool, amount)?;
        credit(&mut world.native, to, amount);
        Ok(())
    }
}
