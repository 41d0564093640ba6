pub mod admin;
pub mod events;
pub mod health;
pub mod operations;
pub mod pool;
pub mod sim;

use crate::collaborators::{Collaborators, Simulator};
use crate::config::Config;
use crate::db::Repository;
use crate::domain::{Address, PoolConfigError};
use crate::engine::PoolEngine;
use crate::error::AppError;
use axum::{
    routing::{get, post},
    Router,
};
use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Mutex<PoolEngine>>,
    pub repo: Arc<Repository>,
    pub sim: Arc<Simulator>,
    pub config: Config,
}

impl AppState {
    /// Build a pool engine over a fresh simulated world for `config`.
    pub fn new(repo: Arc<Repository>, config: Config) -> Result<Self, PoolConfigError> {
        let sim = Arc::new(Simulator::new(config.pool_address.clone()));
        let engine = PoolEngine::new(config.pool_config(), Collaborators::simulated(sim.clone()))?;
        Ok(Self {
            engine: Arc::new(Mutex::new(engine)),
            repo,
            sim,
            config,
        })
    }

    /// Continue the event sequence after the newest stored event, so keys stay
    /// unique across restarts. Returns that sequence number.
    pub async fn resume_sequence(&self) -> Result<u64, sqlx::Error> {
        let last = self.repo.last_seq().await?;
        self.engine.lock().await.resume_after(last);
        Ok(last)
    }
}

pub(crate) fn parse_address(raw: &str, field: &str) -> Result<Address, AppError> {
    Address::from_str(raw).map_err(|e| AppError::BadRequest(format!("Invalid {}: {}", field, e)))
}

/// Write buffered events and the records they touched to the event store.
///
/// The buffer is only cleared once the batch is stored; after a failure the events
/// stay buffered and go out with the next successful call.
pub(crate) async fn persist(state: &AppState, engine: &mut PoolEngine) -> Result<(), AppError> {
    let records = engine.buffered_events().to_vec();
    if records.is_empty() {
        return Ok(());
    }

    let touched: BTreeSet<&Address> = records.iter().map(|r| r.event.account()).collect();
    for account in touched {
        if let Some(delegator) = engine.state().existing_delegator(account) {
            state.repo.upsert_delegator(account, &delegator).await?;
        }
    }

    let inserted = state.repo.insert_events_batch(&records).await?;
    engine.drain_events();
    tracing::debug!(inserted, "Persisted pool events");
    Ok(())
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/pool", get(pool::get_pool))
        .route("/v1/delegators/:address", get(pool::get_delegator))
        .route("/v1/events", get(events::get_events))
        .route("/v1/deposit", post(operations::deposit))
        .route("/v1/bid", post(operations::bid))
        .route("/v1/withdraw", post(operations::withdraw))
        .route("/v1/withdraw-eth", post(operations::withdraw_eth))
        .route("/v1/withdraw-refund", post(operations::withdraw_refund))
        .route("/v1/worker/withdraw", post(operations::withdraw_worker_reward))
        .route("/v1/admin/deposits", post(admin::set_deposits))
        .route("/v1/admin/owner", post(admin::transfer_ownership))
        .route("/v1/admin/worker", post(admin::set_worker))
        .route("/v1/admin/claim", post(admin::claim))
        .route("/v1/admin/refund", post(admin::pull_refund))
        .route("/v1/sim/mint", post(sim::mint))
        .route("/v1/sim/accrue", post(sim::accrue))
        .route("/v1/sim/native", post(sim::native))
        .route("/v1/sim/claimable", post(sim::claimable))
        .route("/v1/sim/refundable", post(sim::refundable))
        .layer(cors)
        .with_state(state)
}
