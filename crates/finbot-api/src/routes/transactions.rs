//! Transaction endpoints

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::NaiveDate;
use finbot_store::models::{EntryType, NewTransaction, Transaction, TransactionFilter};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::{authenticate, require_member};
use crate::error::ApiError;
use crate::routes::TeamQuery;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub team_id: Uuid,
    pub account_id: Option<Uuid>,
    pub category: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub unsettled_only: bool,
    pub page: Option<usize>,
}

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_member(&state, &user, query.team_id)?;

    let per_page = state.config.pagination.records_per_page;
    let filter = TransactionFilter {
        account_id: query.account_id,
        category: query.category,
        from: query.from,
        to: query.to,
        unsettled_only: query.unsettled_only,
        limit: Some(per_page),
        offset: Some(query.page.unwrap_or(0) * per_page),
    };
    Ok(Json(state.db.list_transactions(query.team_id, &filter)?))
}

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub team_id: Uuid,
    pub account_id: Uuid,
    pub entry_type: EntryType,
    pub amount: Decimal,
    pub currency: Option<String>,
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub counterparty: Option<String>,
    pub date: NaiveDate,
    pub due_date: Option<NaiveDate>,
}

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateTransactionRequest>,
) -> Result<Json<Transaction>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_member(&state, &user, req.team_id)?;
    if req.amount <= Decimal::ZERO {
        return Err(ApiError::bad_request("Amount must be positive"));
    }
    if req.category.trim().is_empty() {
        return Err(ApiError::bad_request("Category cannot be empty"));
    }
    if let Some(due) = req.due_date {
        if due < req.date {
            return Err(ApiError::bad_request("Due date cannot precede the transaction date"));
        }
    }

    let txn = state.db.create_transaction(
        req.team_id,
        NewTransaction {
            account_id: req.account_id,
            entry_type: req.entry_type,
            amount: req.amount,
            currency: req.currency,
            category: req.category.trim().to_string(),
            description: req.description,
            counterparty: req.counterparty,
            date: req.date,
            due_date: req.due_date,
            recurring_id: None,
        },
        &state.config.currency.default_currency,
    )?;
    Ok(Json(txn))
}

pub async fn get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(query): Query<TeamQuery>,
) -> Result<Json<Transaction>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_member(&state, &user, query.team_id)?;
    Ok(Json(state.db.transaction_by_id(query.team_id, id)?))
}

#[derive(Debug, Deserialize)]
pub struct SettleRequest {
    pub team_id: Uuid,
}

pub async fn settle(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<SettleRequest>,
) -> Result<Json<Transaction>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_member(&state, &user, req.team_id)?;
    let txn = state.db.settle_transaction(req.team_id, id)?;
    state.db.record_audit(
        req.team_id,
        user.id,
        "transaction.settle",
        "transaction",
        id,
        json!({ "amount": txn.amount.to_string() }),
    )?;
    Ok(Json(txn))
}

pub async fn delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(query): Query<TeamQuery>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_member(&state, &user, query.team_id)?;
    state.db.delete_transaction(query.team_id, id)?;
    state.db.record_audit(
        query.team_id,
        user.id,
        "transaction.delete",
        "transaction",
        id,
        json!({}),
    )?;
    Ok(Json(json!({ "ok": true })))
}
