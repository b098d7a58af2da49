//! HTTP API server for finbot
//!
//! Routes are organized into modules:
//! - routes::accounts: bookkeeping accounts and balances
//! - routes::transactions: entries, invoices, settling
//! - routes::cashboxes: the cash ledger with atomic transfers
//! - routes::recurring: templates and the due-date run
//! - routes::aging, routes::forecasts, routes::credits,
//!   routes::investments, routes::teams, routes::export

pub mod auth;
pub mod error;
pub mod routes;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use finbot_config::Config;
use finbot_core::reports;
use finbot_store::Database;
use log::info;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

pub use error::ApiError;

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
}

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        // Auth
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        // Teams
        .route("/api/teams", get(routes::teams::list))
        .route("/api/teams", post(routes::teams::create))
        .route("/api/teams/:id/members", get(routes::teams::members))
        .route("/api/teams/:id/members", post(routes::teams::add_member))
        .route(
            "/api/teams/:id/members/:user_id",
            delete(routes::teams::remove_member),
        )
        .route("/api/teams/:id/audit", get(routes::teams::audit))
        // Accounts
        .route("/api/accounts", get(routes::accounts::list))
        .route("/api/accounts", post(routes::accounts::create))
        .route("/api/accounts/:id", get(routes::accounts::get))
        .route("/api/accounts/:id", put(routes::accounts::rename))
        .route("/api/accounts/:id", delete(routes::accounts::archive))
        // Transactions
        .route("/api/transactions", get(routes::transactions::list))
        .route("/api/transactions", post(routes::transactions::create))
        .route("/api/transactions/:id", get(routes::transactions::get))
        .route("/api/transactions/:id", delete(routes::transactions::delete))
        .route(
            "/api/transactions/:id/settle",
            post(routes::transactions::settle),
        )
        // Cashboxes
        .route("/api/cashboxes", get(routes::cashboxes::list))
        .route("/api/cashboxes", post(routes::cashboxes::create))
        .route("/api/cashboxes/:id", get(routes::cashboxes::get))
        .route("/api/cashboxes/:id", delete(routes::cashboxes::archive))
        .route("/api/cashboxes/:id/history", get(routes::cashboxes::history))
        .route("/api/cashboxes/:id/deposit", post(routes::cashboxes::deposit))
        .route(
            "/api/cashboxes/:id/withdraw",
            post(routes::cashboxes::withdraw),
        )
        .route(
            "/api/cashboxes/:id/transfer",
            post(routes::cashboxes::transfer),
        )
        // Recurring templates
        .route("/api/recurring", get(routes::recurring::list))
        .route("/api/recurring", post(routes::recurring::create))
        .route("/api/recurring/run", post(routes::recurring::run))
        .route("/api/recurring/:id", delete(routes::recurring::deactivate))
        // Reports
        .route("/api/summary", get(api_summary))
        .route("/api/reports/aging", get(routes::aging::report))
        .route("/api/reports/monthly", get(api_monthly))
        .route("/api/export/transactions", get(routes::export::transactions))
        // Forecasts
        .route("/api/forecasts", get(routes::forecasts::list))
        .route("/api/forecasts", post(routes::forecasts::run))
        .route("/api/forecasts/:id", get(routes::forecasts::get))
        .route("/api/forecasts/:id", delete(routes::forecasts::delete))
        // Credits
        .route("/api/credits", get(routes::credits::list))
        .route("/api/credits", post(routes::credits::create))
        .route("/api/credits/:id", get(routes::credits::get))
        .route("/api/credits/:id/pay", post(routes::credits::pay))
        // Investments
        .route("/api/investments", get(routes::investments::list))
        .route("/api/investments", post(routes::investments::create))
        .route(
            "/api/investments/:id/price",
            put(routes::investments::update_price),
        )
        .route(
            "/api/investments/:id",
            delete(routes::investments::archive),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Dashboard summary for one team
async fn api_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<routes::TeamQuery>,
) -> Result<Json<Value>, ApiError> {
    let user = auth::authenticate(&state, &headers)?;
    auth::require_member(&state, &user, query.team_id)?;
    let summary = reports::team_summary(&state.db, query.team_id)?;
    Ok(Json(json!({ "summary": summary })))
}

/// Monthly income/expense series for one team
async fn api_monthly(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<routes::TeamQuery>,
) -> Result<Json<Value>, ApiError> {
    let user = auth::authenticate(&state, &headers)?;
    auth::require_member(&state, &user, query.team_id)?;
    let series = reports::monthly_series(&state.db, query.team_id)?;
    Ok(Json(json!({ "months": series })))
}

/// Start the HTTP server
///
/// Binds to the configured address and serves until the process is
/// stopped. Expired sessions are purged once at startup.
pub async fn start_server(config: Config, db: Database) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let purged = db.purge_expired_sessions()?;
    if purged > 0 {
        info!("Purged {} expired sessions", purged);
    }

    let state = AppState { db, config };
    let router = create_router(state);

    let listener = TcpListener::bind(&addr).await?;
    info!("Starting finbot server on http://{}", addr);
    axum::serve(listener, router).await?;
    Ok(())
}
