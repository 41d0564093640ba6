use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::operations::{AmountResponse, CallerRequest};
use crate::api::{parse_address, persist, AppState};
use crate::domain::Address;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositsRequest {
    pub caller: String,
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressRequest {
    pub caller: String,
    pub address: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminResponse {
    pub owner: Address,
    pub worker: Address,
    pub deposits_enabled: bool,
}

async fn admin_response(state: &AppState) -> AdminResponse {
    let engine = state.engine.lock().await;
    let pool = engine.state();
    AdminResponse {
        owner: pool.owner.clone(),
        worker: pool.worker.clone(),
        deposits_enabled: pool.deposits_enabled,
    }
}

pub async fn set_deposits(
    State(state): State<AppState>,
    Json(req): Json<DepositsRequest>,
) -> Result<Json<AdminResponse>, AppError> {
    let caller = parse_address(&req.caller, "caller")?;
    {
        let mut engine = state.engine.lock().await;
        engine.set_deposits_enabled(&caller, req.enabled)?;
        persist(&state, &mut engine).await?;
    }
    Ok(Json(admin_response(&state).await))
}

pub async fn transfer_ownership(
    State(state): State<AppState>,
    Json(req): Json<AddressRequest>,
) -> Result<Json<AdminResponse>, AppError> {
    let caller = parse_address(&req.caller, "caller")?;
    let new_owner = parse_address(&req.address, "address")?;
    {
        let mut engine = state.engine.lock().await;
        engine.transfer_ownership(&caller, new_owner)?;
        persist(&state, &mut engine).await?;
    }
    Ok(Json(admin_response(&state).await))
}

pub async fn set_worker(
    State(state): State<AppState>,
    Json(req): Json<AddressRequest>,
) -> Result<Json<AdminResponse>, AppError> {
    let caller = parse_address(&req.caller, "caller")?;
    let new_worker = parse_address(&req.address, "address")?;
    {
        let mut engine = state.engine.lock().await;
        engine.set_worker(&caller, new_worker)?;
        persist(&state, &mut engine).await?;
    }
    Ok(Json(admin_response(&state).await))
}

/// Collective auction claim. Responds with the tokens allocated to the pool.
pub async fn claim(
    State(state): State<AppState>,
    Json(req): Json<CallerRequest>,
) -> Result<Json<AmountResponse>, AppError> {
    let caller = parse_address(&req.caller, "caller")?;
    let mut engine = state.engine.lock().await;
    let amount = engine.claim_from_auction(&caller).await?;
    persist(&state, &mut engine).await?;
    Ok(Json(AmountResponse { amount }))
}

/// Pull any auction refund into the pool. Open to anyone; zero when nothing was due.
pub async fn pull_refund(State(state): State<AppState>) -> Result<Json<AmountResponse>, AppError> {
    let mut engine = state.engine.lock().await;
    let amount = engine.pull_refund().await?;
    persist(&state, &mut engine).await?;
    Ok(Json(AmountResponse { amount }))
}
