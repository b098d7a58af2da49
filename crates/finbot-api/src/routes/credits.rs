//! Installment credit endpoints

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::NaiveDate;
use finbot_core::credit::CreditBook;
use finbot_store::models::{Credit, CreditPayment, NewCredit};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::{authenticate, require_manager, require_member};
use crate::error::ApiError;
use crate::routes::TeamQuery;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListCreditsQuery {
    pub team_id: Uuid,
    #[serde(default)]
    pub open_only: bool,
}

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListCreditsQuery>,
) -> Result<Json<Vec<Credit>>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_member(&state, &user, query.team_id)?;
    let book = CreditBook::new(state.db.clone());
    Ok(Json(book.list(query.team_id, query.open_only)?))
}

#[derive(Debug, Deserialize)]
pub struct CreateCreditRequest {
    pub team_id: Uuid,
    pub name: String,
    pub principal: Decimal,
    pub annual_rate_bps: i64,
    pub installment: Decimal,
    pub start_date: NaiveDate,
    pub term_months: u32,
}

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateCreditRequest>,
) -> Result<Json<Credit>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_manager(&state, &user, req.team_id)?;
    let book = CreditBook::new(state.db.clone());
    let credit = book.create(
        req.team_id,
        NewCredit {
            name: req.name,
            principal: req.principal,
            annual_rate_bps: req.annual_rate_bps,
            installment: req.installment,
            start_date: req.start_date,
            term_months: req.term_months,
        },
    )?;
    state.db.record_audit(
        req.team_id,
        user.id,
        "credit.create",
        "credit",
        credit.id,
        json!({ "principal": credit.principal.to_string() }),
    )?;
    Ok(Json(credit))
}

pub async fn get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(query): Query<TeamQuery>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_member(&state, &user, query.team_id)?;
    let book = CreditBook::new(state.db.clone());
    let credit = book.get(query.team_id, id)?;
    let payments = book.payments(query.team_id, id)?;
    Ok(Json(json!({ "credit": credit, "payments": payments })))
}

#[derive(Debug, Deserialize)]
pub struct PayRequest {
    pub team_id: Uuid,
}

pub async fn pay(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<PayRequest>,
) -> Result<Json<CreditPayment>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_manager(&state, &user, req.team_id)?;
    let book = CreditBook::new(state.db.clone());
    Ok(Json(book.pay(req.team_id, id, user.id)?))
}
