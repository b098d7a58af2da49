//! Cashbox endpoints
//!
//! Mutations require a managing role; reading is open to any member.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use finbot_core::ledger::CashboxLedger;
use finbot_store::models::{Cashbox, CashboxEntry, NewCashbox};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::{authenticate, require_manager, require_member};
use crate::error::ApiError;
use crate::routes::TeamQuery;
use crate::AppState;

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TeamQuery>,
) -> Result<Json<Vec<Cashbox>>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_member(&state, &user, query.team_id)?;
    let ledger = CashboxLedger::new(state.db.clone());
    Ok(Json(ledger.list(query.team_id, query.include_archived)?))
}

#[derive(Debug, Deserialize)]
pub struct CreateCashboxRequest {
    pub team_id: Uuid,
    pub name: String,
    pub currency: Option<String>,
    pub opening_balance: Option<Decimal>,
}

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateCashboxRequest>,
) -> Result<Json<Cashbox>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_manager(&state, &user, req.team_id)?;
    let ledger = CashboxLedger::new(state.db.clone());
    let cashbox = ledger.create(
        req.team_id,
        NewCashbox {
            name: req.name,
            currency: req.currency,
            opening_balance: req.opening_balance,
        },
        &state.config.currency.default_currency,
    )?;
    state.db.record_audit(
        req.team_id,
        user.id,
        "cashbox.create",
        "cashbox",
        cashbox.id,
        json!({ "name": cashbox.name }),
    )?;
    Ok(Json(cashbox))
}

pub async fn get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(query): Query<TeamQuery>,
) -> Result<Json<Cashbox>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_member(&state, &user, query.team_id)?;
    let ledger = CashboxLedger::new(state.db.clone());
    Ok(Json(ledger.get(query.team_id, id)?))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub team_id: Uuid,
    pub limit: Option<usize>,
}

pub async fn history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<CashboxEntry>>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_member(&state, &user, query.team_id)?;
    let ledger = CashboxLedger::new(state.db.clone());
    let limit = query
        .limit
        .unwrap_or(state.config.pagination.records_per_page);
    Ok(Json(ledger.history(query.team_id, id, limit)?))
}

#[derive(Debug, Deserialize)]
pub struct MovementRequest {
    pub team_id: Uuid,
    pub amount: Decimal,
    pub note: Option<String>,
}

pub async fn deposit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<MovementRequest>,
) -> Result<Json<CashboxEntry>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_manager(&state, &user, req.team_id)?;
    let ledger = CashboxLedger::new(state.db.clone());
    Ok(Json(ledger.deposit(
        req.team_id,
        id,
        req.amount,
        req.note.as_deref(),
        user.id,
    )?))
}

pub async fn withdraw(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<MovementRequest>,
) -> Result<Json<CashboxEntry>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_manager(&state, &user, req.team_id)?;
    let ledger = CashboxLedger::new(state.db.clone());
    Ok(Json(ledger.withdraw(
        req.team_id,
        id,
        req.amount,
        req.note.as_deref(),
        user.id,
    )?))
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub team_id: Uuid,
    pub to: Uuid,
    pub amount: Decimal,
    pub note: Option<String>,
}

pub async fn transfer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<TransferRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_manager(&state, &user, req.team_id)?;
    let ledger = CashboxLedger::new(state.db.clone());
    let (out_leg, in_leg) = ledger.transfer(
        req.team_id,
        id,
        req.to,
        req.amount,
        req.note.as_deref(),
        user.id,
    )?;
    Ok(Json(json!({ "out": out_leg, "in": in_leg })))
}

pub async fn archive(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(query): Query<TeamQuery>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_manager(&state, &user, query.team_id)?;
    let ledger = CashboxLedger::new(state.db.clone());
    ledger.archive(query.team_id, id)?;
    Ok(Json(json!({ "ok": true })))
}
