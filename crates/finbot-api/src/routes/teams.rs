//! Team and membership endpoints

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use finbot_store::models::{AuditLog, Role, Team, TeamMember};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::{authenticate, require_manager, require_member};
use crate::error::ApiError;
use crate::AppState;

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Team>>, ApiError> {
    let user = authenticate(&state, &headers)?;
    Ok(Json(state.db.teams_for_user(user.id)?))
}

#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub name: String,
    pub default_currency: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateTeamRequest>,
) -> Result<Json<Team>, ApiError> {
    let user = authenticate(&state, &headers)?;
    if req.name.trim().is_empty() {
        return Err(ApiError::bad_request("Team name cannot be empty"));
    }
    let currency = req
        .default_currency
        .unwrap_or_else(|| state.config.currency.default_currency.clone());
    Ok(Json(state.db.create_team(req.name.trim(), user.id, &currency)?))
}

pub async fn members(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(team_id): Path<Uuid>,
) -> Result<Json<Vec<TeamMember>>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_member(&state, &user, team_id)?;
    Ok(Json(state.db.team_members(team_id)?))
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub email: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::Member
}

pub async fn add_member(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(team_id): Path<Uuid>,
    Json(req): Json<AddMemberRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_manager(&state, &user, team_id)?;
    if req.role == Role::Owner {
        return Err(ApiError::bad_request("Cannot grant the owner role"));
    }

    let invitee = state
        .db
        .user_by_email(&req.email)?
        .ok_or_else(|| ApiError::not_found(format!("No user with email {}", req.email)))?;
    state.db.add_team_member(team_id, invitee.id, req.role)?;
    state.db.record_audit(
        team_id,
        user.id,
        "team.member_add",
        "user",
        invitee.id,
        json!({ "role": req.role.to_string() }),
    )?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn remove_member(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((team_id, member_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_manager(&state, &user, team_id)?;
    state.db.remove_team_member(team_id, member_id)?;
    state.db.record_audit(
        team_id,
        user.id,
        "team.member_remove",
        "user",
        member_id,
        json!({}),
    )?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<usize>,
}

pub async fn audit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(team_id): Path<Uuid>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditLog>>, ApiError> {
    let user = authenticate(&state, &headers)?;
    require_manager(&state, &user, team_id)?;
    let limit = query
        .limit
        .unwrap_or(state.config.pagination.records_per_page);
    Ok(Json(state.db.list_audit_logs(team_id, limit)?))
}
