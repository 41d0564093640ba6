use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::{parse_address, AppState};
use crate::domain::EventRecord;
use crate::error::AppError;
use crate::export::events_to_csv;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsQuery {
    pub account: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsResponse {
    pub event_count: usize,
    pub events: Vec<EventRecord>,
}

/// Stored audit log in sequence order, as JSON or (`format=csv`) CSV.
pub async fn get_events(
    Query(params): Query<EventsQuery>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let account = params
        .account
        .as_deref()
        .map(|a| parse_address(a, "account"))
        .transpose()?;

    let events = state.repo.query_events(account.as_ref()).await?;

    match params.format.as_deref() {
        None | Some("json") => Ok(Json(EventsResponse {
            event_count: events.len(),
            events,
        })
        .into_response()),
        Some("csv") => {
            let body = events_to_csv(&events)?;
            Ok(([(header::CONTENT_TYPE, "text/csv")], body).into_response())
        }
        Some(other) => Err(AppError::BadRequest(format!(
            "format must be json or csv, got {}",
            other
        ))),
    }
}
