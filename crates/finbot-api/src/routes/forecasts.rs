//! Monte Carlo forecast endpoints

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use finbot_core::forecast::{ForecastParams, ForecastService, Scenario};
use finbot_store::models::Forecast;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::{authenticate, require_manager, require_member};
use crate::error::ApiError;
use crate::routes::TeamQuery;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RunForecastRequest {
    pub team_id: Uuid,
    pub name: String,
    /// Defaults from config when omitted
    pub horizon_months: Option<u32>,
    pub iterations: Option<u32>,
    #[serde(default)]
    pub scenario: Scenario,
}

pub async fn run(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RunForecastRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_member(&state, &user, req.team_id)?;

    let caps = &state.config.forecast;
    let horizon_months = req.horizon_months.unwrap_or(caps.horizon_months);
    let iterations = req.iterations.unwrap_or(caps.iterations);
    if horizon_months == 0 || horizon_months > caps.max_horizon_months {
        return Err(ApiError::bad_request(format!(
            "Horizon must be between 1 and {} months",
            caps.max_horizon_months
        )));
    }
    if iterations == 0 || iterations > caps.max_iterations {
        return Err(ApiError::bad_request(format!(
            "Iterations must be between 1 and {}",
            caps.max_iterations
        )));
    }

    let params = ForecastParams {
        horizon_months,
        iterations,
        scenario: req.scenario,
    };
    let service = ForecastService::new(state.db.clone());
    let (saved, result) = service.run(req.team_id, &req.name, &params)?;
    Ok(Json(json!({ "forecast": saved, "result": result })))
}

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TeamQuery>,
) -> Result<Json<Vec<Forecast>>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_member(&state, &user, query.team_id)?;
    Ok(Json(state.db.list_forecasts(query.team_id)?))
}

pub async fn get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(query): Query<TeamQuery>,
) -> Result<Json<Forecast>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_member(&state, &user, query.team_id)?;
    Ok(Json(state.db.forecast_by_id(query.team_id, id)?))
}

pub async fn delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(query): Query<TeamQuery>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_manager(&state, &user, query.team_id)?;
    state.db.delete_forecast(query.team_id, id)?;
    Ok(Json(json!({ "ok": true })))
}
