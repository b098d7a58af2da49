//! Recurring template endpoints

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{NaiveDate, Utc};
use finbot_core::recurring::{RecurringEngine, RunReport};
use finbot_store::models::{EntryType, IntervalUnit, NewRecurring, RecurringTransaction};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::{authenticate, require_manager, require_member};
use crate::error::ApiError;
use crate::routes::TeamQuery;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListRecurringQuery {
    pub team_id: Uuid,
    #[serde(default)]
    pub active_only: bool,
}

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListRecurringQuery>,
) -> Result<Json<Vec<RecurringTransaction>>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_member(&state, &user, query.team_id)?;
    Ok(Json(state.db.list_recurring(query.team_id, query.active_only)?))
}

#[derive(Debug, Deserialize)]
pub struct CreateRecurringRequest {
    pub team_id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    pub amount: Decimal,
    pub entry_type: EntryType,
    pub category: String,
    pub interval_unit: IntervalUnit,
    #[serde(default = "default_interval_count")]
    pub interval_count: u32,
    pub next_due: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

fn default_interval_count() -> u32 {
    1
}

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateRecurringRequest>,
) -> Result<Json<RecurringTransaction>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_manager(&state, &user, req.team_id)?;
    if req.amount <= Decimal::ZERO {
        return Err(ApiError::bad_request("Amount must be positive"));
    }
    if let Some(end) = req.end_date {
        if end < req.next_due {
            return Err(ApiError::bad_request("End date precedes the first due date"));
        }
    }

    let template = state.db.create_recurring(
        req.team_id,
        NewRecurring {
            account_id: req.account_id,
            name: req.name,
            amount: req.amount,
            entry_type: req.entry_type,
            category: req.category,
            interval_unit: req.interval_unit,
            interval_count: req.interval_count,
            next_due: req.next_due,
            end_date: req.end_date,
        },
    )?;
    Ok(Json(template))
}

pub async fn deactivate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(query): Query<TeamQuery>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_manager(&state, &user, query.team_id)?;
    state.db.deactivate_recurring(query.team_id, id)?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub team_id: Uuid,
    /// Defaults to today
    pub as_of: Option<NaiveDate>,
}

/// Materialize all due occurrences for the team
pub async fn run(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RunRequest>,
) -> Result<Json<RunReport>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_manager(&state, &user, req.team_id)?;

    let as_of = req.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let engine = RecurringEngine::new(state.db.clone());
    let report = engine.run_due(
        req.team_id,
        as_of,
        &state.config.currency.default_currency,
    )?;
    state.db.record_audit(
        req.team_id,
        user.id,
        "recurring.run",
        "team",
        req.team_id,
        json!({
            "as_of": as_of.to_string(),
            "created": report.transactions_created,
        }),
    )?;
    Ok(Json(report))
}
