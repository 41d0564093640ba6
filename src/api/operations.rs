//! Delegator-facing settlement endpoints.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::{parse_address, persist, AppState};
use crate::domain::{amount_string, Amount};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRequest {
    pub caller: String,
    #[serde(with = "amount_string")]
    pub value: Amount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerRequest {
    pub caller: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountResponse {
    #[serde(with = "amount_string")]
    pub amount: Amount,
}

/// Responds with the caller's principal after the deposit.
pub async fn deposit(
    State(state): State<AppState>,
    Json(req): Json<ValueRequest>,
) -> Result<Json<AmountResponse>, AppError> {
    let caller = parse_address(&req.caller, "caller")?;
    let mut engine = state.engine.lock().await;
    let amount = engine.deposit(&caller, req.value).await?;
    persist(&state, &mut engine).await?;
    Ok(Json(AmountResponse { amount }))
}

/// Responds with the caller's total bid.
pub async fn bid(
    State(state): State<AppState>,
    Json(req): Json<ValueRequest>,
) -> Result<Json<AmountResponse>, AppError> {
    let caller = parse_address(&req.caller, "caller")?;
    let mut engine = state.engine.lock().await;
    let amount = engine.bid(&caller, req.value).await?;
    persist(&state, &mut engine).await?;
    Ok(Json(AmountResponse { amount }))
}

pub async fn withdraw(
    State(state): State<AppState>,
    Json(req): Json<ValueRequest>,
) -> Result<Json<AmountResponse>, AppError> {
    let caller = parse_address(&req.caller, "caller")?;
    let mut engine = state.engine.lock().await;
    let amount = engine.withdraw(&caller, req.value).await?;
    persist(&state, &mut engine).await?;
    Ok(Json(AmountResponse { amount }))
}

pub async fn withdraw_eth(
    State(state): State<AppState>,
    Json(req): Json<CallerRequest>,
) -> Result<Json<AmountResponse>, AppError> {
    let caller = parse_address(&req.caller, "caller")?;
    let mut engine = state.engine.lock().await;
    let amount = engine.withdraw_eth(&caller).await?;
    persist(&state, &mut engine).await?;
    Ok(Json(AmountResponse { amount }))
}

pub async fn withdraw_refund(
    State(state): State<AppState>,
    Json(req): Json<CallerRequest>,
) -> Result<Json<AmountResponse>, AppError> {
    let caller = parse_address(&req.caller, "caller")?;
    let mut engine = state.engine.lock().await;
    let amount = engine.withdraw_refund(&caller).await?;
    persist(&state, &mut engine).await?;
    Ok(Json(AmountResponse { amount }))
}

pub async fn withdraw_worker_reward(
    State(state): State<AppState>,
    Json(req): Json<CallerRequest>,
) -> Result<Json<AmountResponse>, AppError> {
    let caller = parse_address(&req.caller, "caller")?;
    let mut engine = state.engine.lock().await;
    let amount = engine.withdraw_worker_reward(&caller).await?;
    persist(&state, &mut engine).await?;
    Ok(Json(AmountResponse { amount }))
}
