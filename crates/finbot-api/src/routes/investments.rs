//! Investment endpoints

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::NaiveDate;
use finbot_store::models::{Investment, NewInvestment};
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
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_member(&state, &user, query.team_id)?;
    let positions = state
        .db
        .list_investments(query.team_id, query.include_archived)?;
    let total_value: Decimal = positions.iter().map(|p| p.market_value()).sum();
    let total_gain: Decimal = positions.iter().map(|p| p.gain()).sum();
    Ok(Json(json!({
        "positions": positions,
        "total_value": total_value,
        "total_gain": total_gain,
    })))
}

#[derive(Debug, Deserialize)]
pub struct CreateInvestmentRequest {
    pub team_id: Uuid,
    pub name: String,
    pub kind: String,
    pub units: Decimal,
    pub unit_cost: Decimal,
    pub current_price: Option<Decimal>,
    pub currency: Option<String>,
    pub purchased_at: NaiveDate,
}

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateInvestmentRequest>,
) -> Result<Json<Investment>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_manager(&state, &user, req.team_id)?;
    let position = state.db.create_investment(
        req.team_id,
        NewInvestment {
            name: req.name,
            kind: req.kind,
            units: req.units,
            unit_cost: req.unit_cost,
            current_price: req.current_price,
            currency: req.currency,
            purchased_at: req.purchased_at,
        },
        &state.config.currency.default_currency,
    )?;
    Ok(Json(position))
}

#[derive(Debug, Deserialize)]
pub struct PriceUpdateRequest {
    pub team_id: Uuid,
    pub current_price: Decimal,
}

pub async fn update_price(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<PriceUpdateRequest>,
) -> Result<Json<Investment>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_manager(&state, &user, req.team_id)?;
    Ok(Json(state.db.update_investment_price(
        req.team_id,
        id,
        req.current_price,
    )?))
}

pub async fn archive(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(query): Query<TeamQuery>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_manager(&state, &user, query.team_id)?;
    state.db.archive_investment(query.team_id, id)?;
    Ok(Json(json!({ "ok": true })))
}
