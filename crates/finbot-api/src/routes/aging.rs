//! AR/AP aging report endpoint

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{NaiveDate, Utc};
use finbot_core::aging::{aging_report, AgingDirection, AgingReport};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{authenticate, require_member};
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AgingQuery {
    pub team_id: Uuid,
    /// "receivable" or "payable"
    pub direction: String,
    /// Defaults to today
    pub as_of: Option<NaiveDate>,
}

pub async fn report(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AgingQuery>,
) -> Result<Json<AgingReport>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_member(&state, &user, query.team_id)?;

    let direction: AgingDirection = query
        .direction
        .parse()
        .map_err(ApiError::bad_request)?;
    let as_of = query.as_of.unwrap_or_else(|| Utc::now().date_naive());
    Ok(Json(aging_report(&state.db, query.team_id, direction, as_of)?))
}
