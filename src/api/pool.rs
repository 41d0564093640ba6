use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::api::{parse_address, AppState};
use crate::domain::{Address, Delegator};
use crate::engine::{Entitlements, PoolSummary};
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegatorResponse {
    pub address: Address,
    /// Record as it stands once any due claim share has been applied.
    pub delegator: Delegator,
    pub entitlements: Entitlements,
}

pub async fn get_pool(State(state): State<AppState>) -> Result<Json<PoolSummary>, AppError> {
    let engine = state.engine.lock().await;
    Ok(Json(engine.summary().await?))
}

pub async fn get_delegator(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<DelegatorResponse>, AppError> {
    let address = parse_address(&address, "address")?;
    let engine = state.engine.lock().await;
    let (delegator, entitlements) = engine.delegator_view(&address).await?;
    Ok(Json(DelegatorResponse {
        address,
        delegator,
        entitlements,
    }))
}
