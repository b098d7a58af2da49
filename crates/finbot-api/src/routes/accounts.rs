//! Account endpoints

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use finbot_store::models::{Account, AccountKind, NewAccount};
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
) -> Result<Json<Vec<Account>>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_member(&state, &user, query.team_id)?;
    Ok(Json(
        state.db.list_accounts(query.team_id, query.include_archived)?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub team_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub kind: AccountKind,
    pub currency: Option<String>,
    pub opening_balance: Option<Decimal>,
}

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateAccountRequest>,
) -> Result<Json<Account>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_manager(&state, &user, req.team_id)?;
    if req.name.trim().is_empty() {
        return Err(ApiError::bad_request("Account name cannot be empty"));
    }

    let account = state.db.create_account(
        req.team_id,
        NewAccount {
            name: req.name.trim().to_string(),
            kind: req.kind,
            currency: req.currency,
            opening_balance: req.opening_balance,
        },
        &state.config.currency.default_currency,
    )?;
    state.db.record_audit(
        req.team_id,
        user.id,
        "account.create",
        "account",
        account.id,
        json!({ "name": account.name }),
    )?;
    Ok(Json(account))
}

pub async fn get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(query): Query<TeamQuery>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_member(&state, &user, query.team_id)?;
    let account = state.db.account_by_id(query.team_id, id)?;
    let balance = state.db.account_balance(query.team_id, id)?;
    Ok(Json(json!({ "account": account, "balance": balance })))
}

#[derive(Debug, Deserialize)]
pub struct RenameAccountRequest {
    pub team_id: Uuid,
    pub name: String,
}

pub async fn rename(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<RenameAccountRequest>,
) -> Result<Json<Account>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_manager(&state, &user, req.team_id)?;
    if req.name.trim().is_empty() {
        return Err(ApiError::bad_request("Account name cannot be empty"));
    }
    Ok(Json(state.db.rename_account(req.team_id, id, req.name.trim())?))
}

pub async fn archive(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(query): Query<TeamQuery>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_manager(&state, &user, query.team_id)?;
    state.db.archive_account(query.team_id, id)?;
    state.db.record_audit(
        query.team_id,
        user.id,
        "account.archive",
        "account",
        id,
        json!({}),
    )?;
    Ok(Json(json!({ "ok": true })))
}
