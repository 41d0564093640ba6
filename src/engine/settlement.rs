//! Settlement executor: validated state transitions followed by external transfers.
//!
//! Every operation checkpoints the totals and the caller's record, mutates internal
//! state first, and only then calls the collaborator. If anything fails the
//! checkpoint is restored, so a rejected call leaves no partial change behind.

use super::accounting::{self, Entitlements, LiveBalances};
use super::claim;
use super::math::{add, mul_div, sub};
use super::PoolError;
use crate::collaborators::Collaborators;
use crate::domain::{
    amount_string, Address, Amount, Delegator, EventRecord, PoolConfig, PoolConfigError,
    PoolEvent, PoolState, PoolTotals, TimeMs,
};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Pool-wide figures for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSummary {
    pub address: Address,
    pub owner: Address,
    pub worker: Address,
    #[serde(with = "amount_string")]
    pub worker_fraction: Amount,
    pub deposits_enabled: bool,
    pub delegator_count: usize,
    pub totals: PoolTotals,
    pub live: LiveBalances,
    #[serde(with = "amount_string")]
    pub available_reward: Amount,
    #[serde(with = "amount_string")]
    pub cumulative_reward: Amount,
    #[serde(with = "amount_string")]
    pub available_worker_reward: Amount,
    #[serde(with = "amount_string")]
    pub native_pool: Amount,
}

struct Checkpoint {
    totals: PoolTotals,
    account: Option<(Address, Option<Delegator>)>,
    events_len: usize,
    next_seq: u64,
}

/// The pool's accounting engine. Owns its state; collaborators are injected.
#[derive(Debug)]
pub struct PoolEngine {
    pub(crate) state: PoolState,
    collaborators: Collaborators,
    pub(crate) events: Vec<EventRecord>,
    pub(crate) next_seq: u64,
}

impl PoolEngine {
    pub fn new(config: PoolConfig, collaborators: Collaborators) -> Result<Self, PoolConfigError> {
        Ok(Self {
            state: PoolState::new(config)?,
            collaborators,
            events: Vec::new(),
            next_seq: 1,
        })
    }

    pub fn state(&self) -> &PoolState {
        &self.state
    }

    /// Take every event recorded since the last drain.
    pub fn drain_events(&mut self) -> Vec<EventRecord> {
        std::mem::take(&mut self.events)
    }

    /// Events recorded since the last drain, oldest first.
    pub fn buffered_events(&self) -> &[EventRecord] {
        &self.events
    }

    /// Number new events after `last_seq`, the newest sequence already stored.
    pub fn resume_after(&mut self, last_seq: u64) {
        self.next_seq = self.next_seq.max(last_seq.saturating_add(1));
    }

    pub(crate) fn emit(&mut self, event: PoolEvent) {
        let record = EventRecord::new(self.next_seq, TimeMs::now(), event);
        self.next_seq += 1;
        self.events.push(record);
    }

    fn checkpoint(&self, account: Option<&Address>) -> Checkpoint {
        Checkpoint {
            totals: self.state.totals,
            account: account.map(|a| (a.clone(), self.state.existing_delegator(a))),
            events_len: self.events.len(),
            next_seq: self.next_seq,
        }
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        self.state.totals = checkpoint.totals;
        if let Some((account, record)) = checkpoint.account {
            self.state.restore_delegator(&account, record);
        }
        self.events.truncate(checkpoint.events_len);
        self.next_seq = checkpoint.next_seq;
    }

    fn finish<T>(
        &mut self,
        checkpoint: Checkpoint,
        op: &'static str,
        result: Result<T, PoolError>,
    ) -> Result<T, PoolError> {
        if let Err(e) = &result {
            warn!(op, error = %e, "Operation rejected, state restored");
            self.rollback(checkpoint);
        }
        result
    }

    /// Read the collaborator balances the formulas depend on.
    pub async fn live_balances(&self) -> Result<LiveBalances, PoolError> {
        let pool = &self.state.address;
        let staked = self.collaborators.escrow.total_held_by(pool).await?;
        let free_tokens = self.collaborators.ledger.balance_of(pool).await?;
        let native = self.collaborators.vault.balance().await?;
        Ok(LiveBalances {
            staked,
            free_tokens,
            native,
        })
    }

    /// Run the claim trigger for `account`, recording an event when it fires.
    async fn claim_for(&mut self, account: &Address) -> Result<(), PoolError> {
        if let Some(share) = claim::apply_claim_if_due(&mut self.state, account)? {
            self.emit(PoolEvent::WorkLockTokensClaimed {
                account: account.clone(),
                value: share,
            });
        }
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn available_reward(&self) -> Result<Amount, PoolError> {
        let live = self.live_balances().await?;
        accounting::available_reward(&self.state.totals, &live)
    }

    pub async fn cumulative_reward(&self) -> Result<Amount, PoolError> {
        let live = self.live_balances().await?;
        accounting::cumulative_reward(&self.state.totals, &live)
    }

    pub async fn available_worker_reward(&self) -> Result<Amount, PoolError> {
        let live = self.live_balances().await?;
        accounting::available_worker_reward(&self.state.totals, self.state.worker_fraction, &live)
    }

    /// Reward `account` could withdraw now, counting any claim share not yet applied.
    pub async fn available_reward_of(&self, account: &Address) -> Result<Amount, PoolError> {
        let live = self.live_balances().await?;
        let (totals, delegator) = claim::projected(&self.state, account)?;
        accounting::available_delegator_reward(&totals, self.state.worker_fraction, &live, &delegator)
    }

    pub async fn available_eth_of(&self, account: &Address) -> Result<Amount, PoolError> {
        let live = self.live_balances().await?;
        let (totals, delegator) = claim::projected(&self.state, account)?;
        accounting::available_eth(&totals, &live, &delegator)
    }

    pub async fn available_refund_of(&self, account: &Address) -> Result<Amount, PoolError> {
        let (totals, delegator) = claim::projected(&self.state, account)?;
        accounting::available_refund(&totals, &delegator)
    }

    /// Projected record and entitlements for one account.
    pub async fn delegator_view(
        &self,
        account: &Address,
    ) -> Result<(Delegator, Entitlements), PoolError> {
        let live = self.live_balances().await?;
        let (totals, delegator) = claim::projected(&self.state, account)?;
        let entitlements =
            accounting::entitlements(&totals, self.state.worker_fraction, &live, &delegator)?;
        Ok((delegator, entitlements))
    }

    pub async fn summary(&self) -> Result<PoolSummary, PoolError> {
        let live = self.live_balances().await?;
        let totals = &self.state.totals;
        Ok(PoolSummary {
            address: self.state.address.clone(),
            owner: self.state.owner.clone(),
            worker: self.state.worker.clone(),
            worker_fraction: self.state.worker_fraction,
            deposits_enabled: self.state.deposits_enabled,
            delegator_count: self.state.delegator_count(),
            totals: *totals,
            live,
            available_reward: accounting::available_reward(totals, &live)?,
            cumulative_reward: accounting::cumulative_reward(totals, &live)?,
            available_worker_reward: accounting::available_worker_reward(
                totals,
                self.state.worker_fraction,
                &live,
            )?,
            native_pool: accounting::native_pool(totals, &live)?,
        })
    }

    // =========================================================================
    // Deposits and bids
    // =========================================================================

    /// Add `value` tokens to the caller's principal. Returns the new principal.
    pub async fn deposit(&mut self, caller: &Address, value: Amount) -> Result<Amount, PoolError> {
        let checkpoint = self.checkpoint(Some(caller));
        let result = self.try_deposit(caller, value).await;
        self.finish(checkpoint, "deposit", result)
    }

    async fn try_deposit(&mut self, caller: &Address, value: Amount) -> Result<Amount, PoolError> {
        if !self.state.deposits_enabled {
            return Err(PoolError::PreconditionFailed(
                "deposits are disabled".to_string(),
            ));
        }
        if value == 0 {
            return Err(PoolError::PreconditionFailed(
                "deposit value must be positive".to_string(),
            ));
        }
        self.claim_for(caller).await?;

        let delegator = self.state.delegator(caller);
        let deposited = add(delegator.deposited_tokens, value, "deposited tokens")?;
        let total = add(
            self.state.totals.total_deposited_tokens,
            value,
            "total deposited tokens",
        )?;
        self.state.totals.total_deposited_tokens = total;
        self.state.delegator_mut(caller).deposited_tokens = deposited;

        let pool = self.state.address.clone();
        self.collaborators
            .ledger
            .transfer_from(caller, &pool, value)
            .await?;

        self.emit(PoolEvent::TokensDeposited {
            account: caller.clone(),
            value,
            deposited_tokens: deposited,
        });
        info!(account = %caller, value = %value, deposited = %deposited, "Tokens deposited");
        Ok(deposited)
    }

    /// Contribute `value` native currency to the pool's collective auction bid.
    pub async fn bid(&mut self, caller: &Address, value: Amount) -> Result<Amount, PoolError> {
        let checkpoint = self.checkpoint(Some(caller));
        let result = self.try_bid(caller, value).await;
        self.finish(checkpoint, "bid", result)
    }

    async fn try_bid(&mut self, caller: &Address, value: Amount) -> Result<Amount, PoolError> {
        if value == 0 {
            return Err(PoolError::PreconditionFailed(
                "bid value must be positive".to_string(),
            ));
        }
        if self.state.totals.work_lock_claimed_tokens != 0 {
            return Err(PoolError::PreconditionFailed(
                "auction tokens are already claimed".to_string(),
            ));
        }

        let delegator = self.state.delegator(caller);
        let bid = add(delegator.deposited_eth_work_lock, value, "bid")?;
        let received = add(
            self.state.totals.total_work_lock_eth_received,
            value,
            "auction eth received",
        )?;
        self.state.totals.total_work_lock_eth_received = received;
        self.state.delegator_mut(caller).deposited_eth_work_lock = bid;

        self.collaborators.auction.bid(caller, value).await?;

        self.emit(PoolEvent::Bid {
            account: caller.clone(),
            value,
        });
        info!(account = %caller, value = %value, total_bid = %bid, "Auction bid placed");
        Ok(bid)
    }

    // =========================================================================
    // Withdrawals
    // =========================================================================

    /// Withdraw `value` tokens: reward first, any excess out of principal.
    ///
    /// When principal shrinks, the caller's withdrawn reward and native amounts are
    /// rebased to the new principal so later entitlements stay consistent with what
    /// was already paid.
    pub async fn withdraw(&mut self, caller: &Address, value: Amount) -> Result<Amount, PoolError> {
        let checkpoint = self.checkpoint(Some(caller));
        let result = self.try_withdraw(caller, value).await;
        self.finish(checkpoint, "withdraw", result)
    }

    async fn try_withdraw(&mut self, caller: &Address, value: Amount) -> Result<Amount, PoolError> {
        if value == 0 {
            return Err(PoolError::PreconditionFailed(
                "withdrawal value must be positive".to_string(),
            ));
        }
        self.claim_for(caller).await?;

        let live = self.live_balances().await?;
        let delegator = self.state.delegator(caller);
        let reward = accounting::available_delegator_reward(
            &self.state.totals,
            self.state.worker_fraction,
            &live,
            &delegator,
        )?;
        debug!(account = %caller, reward = %reward, deposited = %delegator.deposited_tokens, "Token entitlement");

        let allowed = add(reward, delegator.deposited_tokens, "token entitlement")?;
        if value > allowed {
            return Err(PoolError::InvariantViolation(format!(
                "requested {} exceeds allowed portion {}",
                value, allowed
            )));
        }
        if value > live.free_tokens {
            return Err(PoolError::InsufficientLiquidity {
                requested: value,
                available: live.free_tokens,
            });
        }

        let mut totals = self.state.totals;
        let mut record = delegator;
        if value <= reward {
            record.withdrawn_reward = add(record.withdrawn_reward, value, "withdrawn reward")?;
            totals.total_withdrawn_reward =
                add(totals.total_withdrawn_reward, value, "total withdrawn reward")?;
        } else {
            record.withdrawn_reward = add(record.withdrawn_reward, reward, "withdrawn reward")?;
            totals.total_withdrawn_reward =
                add(totals.total_withdrawn_reward, reward, "total withdrawn reward")?;

            let old_deposited = record.deposited_tokens;
            let excess = value - reward;
            let new_deposited = sub(old_deposited, excess, "deposited tokens")?;
            let new_withdrawn_reward = mul_div(record.withdrawn_reward, new_deposited, old_deposited)?;
            let new_withdrawn_eth = mul_div(record.withdrawn_eth, new_deposited, old_deposited)?;

            totals.total_deposited_tokens =
                sub(totals.total_deposited_tokens, excess, "total deposited tokens")?;
            totals.total_withdrawn_reward = sub(
                totals.total_withdrawn_reward,
                record.withdrawn_reward - new_withdrawn_reward,
                "total withdrawn reward",
            )?;
            totals.total_withdrawn_eth = sub(
                totals.total_withdrawn_eth,
                record.withdrawn_eth - new_withdrawn_eth,
                "total withdrawn eth",
            )?;

            record.deposited_tokens = new_deposited;
            record.withdrawn_reward = new_withdrawn_reward;
            record.withdrawn_eth = new_withdrawn_eth;
        }
        self.state.totals = totals;
        *self.state.delegator_mut(caller) = record;

        self.collaborators.ledger.transfer(caller, value).await?;

        self.emit(PoolEvent::TokensWithdrawn {
            account: caller.clone(),
            value,
            deposited_tokens: record.deposited_tokens,
        });
        info!(account = %caller, value = %value, deposited = %record.deposited_tokens, "Tokens withdrawn");
        Ok(value)
    }

    /// Pay the worker its share of reward, limited by the liquid balance.
    pub async fn withdraw_worker_reward(&mut self, caller: &Address) -> Result<Amount, PoolError> {
        let checkpoint = self.checkpoint(None);
        let result = self.try_withdraw_worker_reward(caller).await;
        self.finish(checkpoint, "withdraw_worker_reward", result)
    }

    async fn try_withdraw_worker_reward(&mut self, caller: &Address) -> Result<Amount, PoolError> {
        if caller != &self.state.worker {
            return Err(PoolError::PreconditionFailed(
                "caller is not the worker".to_string(),
            ));
        }
        let live = self.live_balances().await?;
        let available = accounting::available_worker_reward(
            &self.state.totals,
            self.state.worker_fraction,
            &live,
        )?
        .min(live.free_tokens);
        if available == 0 {
            return Err(PoolError::NothingAvailable("worker reward"));
        }

        let totals = &mut self.state.totals;
        totals.worker_withdrawn_reward =
            add(totals.worker_withdrawn_reward, available, "worker withdrawn reward")?;
        totals.total_withdrawn_reward =
            add(totals.total_withdrawn_reward, available, "total withdrawn reward")?;

        self.collaborators.ledger.transfer(caller, available).await?;

        self.emit(PoolEvent::TokensWithdrawn {
            account: caller.clone(),
            value: available,
            deposited_tokens: 0,
        });
        info!(worker = %caller, value = %available, "Worker reward withdrawn");
        Ok(available)
    }

    /// Pay the caller's whole available share of native currency.
    pub async fn withdraw_eth(&mut self, caller: &Address) -> Result<Amount, PoolError> {
        let checkpoint = self.checkpoint(Some(caller));
        let result = self.try_withdraw_eth(caller).await;
        self.finish(checkpoint, "withdraw_eth", result)
    }

    async fn try_withdraw_eth(&mut self, caller: &Address) -> Result<Amount, PoolError> {
        self.claim_for(caller).await?;
        let live = self.live_balances().await?;
        let delegator = self.state.delegator(caller);
        let available = accounting::available_eth(&self.state.totals, &live, &delegator)?;
        if available == 0 {
            return Err(PoolError::NothingAvailable("native currency"));
        }

        let withdrawn = add(delegator.withdrawn_eth, available, "withdrawn eth")?;
        let total = add(
            self.state.totals.total_withdrawn_eth,
            available,
            "total withdrawn eth",
        )?;
        self.state.totals.total_withdrawn_eth = total;
        self.state.delegator_mut(caller).withdrawn_eth = withdrawn;

        self.collaborators.vault.send(caller, available).await?;

        self.emit(PoolEvent::EthWithdrawn {
            account: caller.clone(),
            value: available,
        });
        info!(account = %caller, value = %available, "Native currency withdrawn");
        Ok(available)
    }

    /// Pay the caller's available share of the auction refund.
    pub async fn withdraw_refund(&mut self, caller: &Address) -> Result<Amount, PoolError> {
        let checkpoint = self.checkpoint(Some(caller));
        let result = self.try_withdraw_refund(caller).await;
        self.finish(checkpoint, "withdraw_refund", result)
    }

    async fn try_withdraw_refund(&mut self, caller: &Address) -> Result<Amount, PoolError> {
        self.claim_for(caller).await?;
        let delegator = self.state.delegator(caller);
        let available = accounting::available_refund(&self.state.totals, &delegator)?;
        if available == 0 {
            return Err(PoolError::NothingAvailable("refund"));
        }

        let refunded = add(delegator.refunded_eth_work_lock, available, "refunded eth")?;
        let total = add(
            self.state.totals.total_work_lock_eth_withdrawn,
            available,
            "refund withdrawn",
        )?;
        self.state.totals.total_work_lock_eth_withdrawn = total;
        self.state.delegator_mut(caller).refunded_eth_work_lock = refunded;

        self.collaborators.vault.send(caller, available).await?;

        self.emit(PoolEvent::RefundWithdrawn {
            account: caller.clone(),
            value: available,
        });
        info!(account = %caller, value = %available, "Auction refund withdrawn");
        Ok(available)
    }

    // =========================================================================
    // Auction settlement
    // =========================================================================

    /// Pull outstanding compensation and refund from the auction into the vault.
    ///
    /// Returns the amount received. Calling it with nothing outstanding is a no-op.
    /// If compensation arrives but the refund call then fails, the compensation is
    /// still recorded and the refund is left for a later pull.
    pub async fn pull_refund(&mut self) -> Result<Amount, PoolError> {
        let checkpoint = self.checkpoint(None);
        let result = self.try_pull_refund().await;
        self.finish(checkpoint, "pull_refund", result)
    }

    async fn try_pull_refund(&mut self) -> Result<Amount, PoolError> {
        let pool = self.state.address.clone();
        let before = self.collaborators.vault.balance().await?;
        if self.collaborators.auction.compensation(&pool).await? > 0 {
            self.collaborators.auction.withdraw_compensation().await?;
        }
        if let Err(e) = self.collaborators.auction.refund().await {
            let after = self.collaborators.vault.balance().await?;
            if after == before {
                return Err(e.into());
            }
            warn!(error = %e, "Auction refund failed after compensation arrived");
        }
        let after = self.collaborators.vault.balance().await?;

        let received = sub(after, before, "vault balance after refund")?;
        if received == 0 {
            debug!("No auction refund outstanding");
            return Ok(0);
        }
        self.state.totals.total_work_lock_eth_refunded = add(
            self.state.totals.total_work_lock_eth_refunded,
            received,
            "auction eth refunded",
        )?;

        self.emit(PoolEvent::RefundReceived {
            account: pool,
            value: received,
        });
        info!(value = %received, "Auction refund received");
        Ok(received)
    }

    /// Owner-only collective claim of the pool's auction tokens. Happens once.
    pub async fn claim_from_auction(&mut self, caller: &Address) -> Result<Amount, PoolError> {
        let checkpoint = self.checkpoint(None);
        let result = self.try_claim_from_auction(caller).await;
        self.finish(checkpoint, "claim_from_auction", result)
    }

    async fn try_claim_from_auction(&mut self, caller: &Address) -> Result<Amount, PoolError> {
        self.ensure_owner(caller)?;
        if self.state.totals.work_lock_claimed_tokens != 0 {
            return Err(PoolError::PreconditionFailed(
                "auction tokens are already claimed".to_string(),
            ));
        }
        if self.state.totals.total_work_lock_eth_received == 0 {
            return Err(PoolError::PreconditionFailed(
                "the pool has not bid in the auction".to_string(),
            ));
        }

        let claimed = self.collaborators.auction.claim().await?;
        if claimed == 0 {
            return Err(PoolError::NothingAvailable("auction tokens"));
        }
        self.state.totals.work_lock_claimed_tokens = claimed;

        let pool = self.state.address.clone();
        self.emit(PoolEvent::WorkLockTokensClaimed {
            account: pool,
            value: claimed,
        });
        info!(value = %claimed, "Auction tokens claimed for the pool");
        Ok(claimed)
    }
}
