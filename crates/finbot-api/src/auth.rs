//! Authentication and team scoping
//!
//! Sessions are opaque bearer tokens stored server-side with a TTL
//! from the config. Passwords are salted digests; the salt is per-user
//! and regenerated on registration.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use finbot_store::models::{NewUser, Role, Team, User};
use log::info;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

pub(crate) fn hash_password(salt: &str, password: &str) -> String {
    format!("{:x}", md5::compute(format!("{}{}", salt, password)))
}

fn new_salt() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

/// Resolve the bearer token in `Authorization` to a live user
pub fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthorized("Expected a bearer token"))?;
    let token = Uuid::parse_str(token.trim())
        .map_err(|_| ApiError::unauthorized("Malformed token"))?;

    let session = state
        .db
        .session_by_token(token)?
        .ok_or_else(|| ApiError::unauthorized("Session expired or unknown"))?;
    Ok(state.db.user_by_id(session.user_id)?)
}

/// The user must belong to the team; returns their role
pub fn require_member(state: &AppState, user: &User, team_id: Uuid) -> Result<Role, ApiError> {
    state
        .db
        .membership(team_id, user.id)?
        .ok_or_else(|| ApiError::forbidden("Not a member of this team"))
}

/// The user must hold a managing role (owner or admin) in the team
pub fn require_manager(state: &AppState, user: &User, team_id: Uuid) -> Result<Role, ApiError> {
    let role = require_member(state, user, team_id)?;
    if !role.can_manage() {
        return Err(ApiError::forbidden("Requires owner or admin role"));
    }
    Ok(role)
}

// ==================== Handlers ====================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub display_name: String,
    pub password: String,
    /// Name for the user's first team; defaults to a personal team
    pub team_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: Uuid,
    pub user: User,
    pub team: Team,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let email = req.email.trim();
    if !email.contains('@') {
        return Err(ApiError::bad_request("Invalid email address"));
    }
    if req.password.len() < state.config.auth.min_password_len {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {} characters",
            state.config.auth.min_password_len
        )));
    }
    if req.display_name.trim().is_empty() {
        return Err(ApiError::bad_request("Display name cannot be empty"));
    }

    let salt = new_salt();
    let user = state.db.create_user(NewUser {
        email: email.to_string(),
        display_name: req.display_name.trim().to_string(),
        password_hash: hash_password(&salt, &req.password),
        password_salt: salt,
    })?;

    let team_name = req
        .team_name
        .unwrap_or_else(|| format!("{}'s team", user.display_name));
    let team = state.db.create_team(
        &team_name,
        user.id,
        &state.config.currency.default_currency,
    )?;

    let session = state
        .db
        .create_session(user.id, state.config.auth.token_ttl_hours)?;
    info!("Registered user {} with team {}", user.email, team.id);
    Ok(Json(AuthResponse {
        token: session.token,
        user,
        team,
    }))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: Uuid,
    pub user: User,
    pub teams: Vec<Team>,
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = state
        .db
        .user_by_email(&req.email)?
        .ok_or_else(|| ApiError::unauthorized("Unknown email or wrong password"))?;
    if hash_password(&user.password_salt, &req.password) != user.password_hash {
        return Err(ApiError::unauthorized("Unknown email or wrong password"));
    }

    let session = state
        .db
        .create_session(user.id, state.config.auth.token_ttl_hours)?;
    let teams = state.db.teams_for_user(user.id)?;
    Ok(Json(LoginResponse {
        token: session.token,
        user,
        teams,
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    authenticate(&state, &headers)?;
    if let Some(token) = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|t| Uuid::parse_str(t.trim()).ok())
    {
        state.db.delete_session(token)?;
    }
    Ok(Json(json!({ "ok": true })))
}

pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers)?;
    let teams = state.db.teams_for_user(user.id)?;
    Ok(Json(json!({ "user": user, "teams": teams })))
}
