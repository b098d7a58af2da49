//! Route handlers, one module per resource

pub mod accounts;
pub mod aging;
pub mod cashboxes;
pub mod credits;
pub mod export;
pub mod forecasts;
pub mod investments;
pub mod recurring;
pub mod teams;
pub mod transactions;

use serde::Deserialize;
use uuid::Uuid;

/// Query parameters shared by team-scoped GET endpoints
#[derive(Debug, Deserialize)]
pub struct TeamQuery {
    pub team_id: Uuid,
    #[serde(default)]
    pub include_archived: bool,
}
