//! CSV export endpoint

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use chrono::NaiveDate;
use finbot_core::reports::transactions_csv;
use finbot_store::models::TransactionFilter;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{authenticate, require_member};
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub team_id: Uuid,
    pub account_id: Option<Uuid>,
    pub category: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

pub async fn transactions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_member(&state, &user, query.team_id)?;

    let filter = TransactionFilter {
        account_id: query.account_id,
        category: query.category,
        from: query.from,
        to: query.to,
        unsettled_only: false,
        limit: None,
        offset: None,
    };
    let csv = transactions_csv(&state.db, query.team_id, &filter)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"transactions.csv\"",
            ),
        ],
        csv,
    )
        .into_response())
}
