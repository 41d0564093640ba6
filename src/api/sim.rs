//! Drivers for the simulated world behind the bundled server.
//!
//! These stand in for activity that happens outside the pool: tokens arriving in
//! wallets, staking reward accruing, fees paid in native currency, and the
//! auction deciding its allocation and refunds.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::{parse_address, AppState};
use crate::domain::{amount_string, Amount};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintRequest {
    pub account: String,
    #[serde(with = "amount_string")]
    pub value: Amount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimValueRequest {
    #[serde(with = "amount_string")]
    pub value: Amount,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimResponse {
    #[serde(with = "amount_string")]
    pub pool_tokens: Amount,
    #[serde(with = "amount_string")]
    pub pool_stake: Amount,
    #[serde(with = "amount_string")]
    pub pool_native: Amount,
}

fn snapshot(state: &AppState) -> SimResponse {
    let pool = state.sim.pool();
    SimResponse {
        pool_tokens: state.sim.token_balance(pool),
        pool_stake: state.sim.stake_of(pool),
        pool_native: state.sim.native_balance(pool),
    }
}

/// Credit liquid tokens to any account, the pool included.
pub async fn mint(
    State(state): State<AppState>,
    Json(req): Json<MintRequest>,
) -> Result<Json<SimResponse>, AppError> {
    let account = parse_address(&req.account, "account")?;
    state.sim.mint_tokens(&account, req.value);
    tracing::debug!(account = %account, value = %req.value, "Simulated mint");
    Ok(Json(snapshot(&state)))
}

pub async fn accrue(
    State(state): State<AppState>,
    Json(req): Json<SimValueRequest>,
) -> Json<SimResponse> {
    state.sim.accrue_stake_reward(req.value);
    Json(snapshot(&state))
}

pub async fn native(
    State(state): State<AppState>,
    Json(req): Json<MintRequest>,
) -> Result<Json<SimResponse>, AppError> {
    let account = parse_address(&req.account, "account")?;
    if &account == state.sim.pool() {
        state.sim.receive_native(req.value);
    } else {
        state.sim.fund_native(&account, req.value);
    }
    Ok(Json(snapshot(&state)))
}

pub async fn claimable(
    State(state): State<AppState>,
    Json(req): Json<SimValueRequest>,
) -> Json<SimResponse> {
    state.sim.set_claimable_tokens(req.value);
    Json(snapshot(&state))
}

pub async fn refundable(
    State(state): State<AppState>,
    Json(req): Json<SimValueRequest>,
) -> Json<SimResponse> {
    state.sim.set_refundable(req.value);
    Json(snapshot(&state))
}
