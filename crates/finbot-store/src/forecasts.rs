//! Persisted forecast runs

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::Forecast;
use crate::{format_datetime, parse_datetime, parse_uuid, Database};

type ForecastRaw = (String, String, String, u32, u32, String, String, String);

fn row_to_forecast(row: &Row) -> rusqlite::Result<ForecastRaw> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn build_forecast(raw: ForecastRaw) -> StoreResult<Forecast> {
    Ok(Forecast {
        id: parse_uuid(raw.0)?,
        team_id: parse_uuid(raw.1)?,
        name: raw.2,
        horizon_months: raw.3,
        iterations: raw.4,
        params: serde_json::from_str(&raw.5)?,
        result: serde_json::from_str(&raw.6)?,
        created_at: parse_datetime(raw.7)?,
    })
}

const FORECAST_COLS: &str =
    "id, team_id, name, horizon_months, iterations, params, result, created_at";

impl Database {
    pub fn save_forecast(
        &self,
        team_id: Uuid,
        name: &str,
        horizon_months: u32,
        iterations: u32,
        params: &serde_json::Value,
        result: &serde_json::Value,
    ) -> StoreResult<Forecast> {
        let forecast = Forecast {
            id: Uuid::new_v4(),
            team_id,
            name: name.to_string(),
            horizon_months,
            iterations,
            params: params.clone(),
            result: result.clone(),
            created_at: Utc::now(),
        };

        let conn = self.lock();
        conn.execute(
            "INSERT INTO forecasts
             (id, team_id, name, horizon_months, iterations, params, result, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                forecast.id.to_string(),
                forecast.team_id.to_string(),
                forecast.name,
                forecast.horizon_months,
                forecast.iterations,
                forecast.params.to_string(),
                forecast.result.to_string(),
                format_datetime(forecast.created_at),
            ],
        )?;
        Ok(forecast)
    }

    pub fn forecast_by_id(&self, team_id: Uuid, id: Uuid) -> StoreResult<Forecast> {
        let conn = self.lock();
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {} FROM forecasts WHERE id = ?1 AND team_id = ?2",
                    FORECAST_COLS
                ),
                params![id.to_string(), team_id.to_string()],
                row_to_forecast,
            )
            .optional()?;
        match raw {
            Some(raw) => build_forecast(raw),
            None => Err(StoreError::NotFound(format!("Forecast {}", id))),
        }
    }

    pub fn list_forecasts(&self, team_id: Uuid) -> StoreResult<Vec<Forecast>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM forecasts WHERE team_id = ?1 ORDER BY created_at DESC",
            FORECAST_COLS
        ))?;
        let rows = stmt.query_map(params![team_id.to_string()], row_to_forecast)?;
        let mut forecasts = Vec::new();
        for raw in rows {
            forecasts.push(build_forecast(raw?)?);
        }
        Ok(forecasts)
    }

    pub fn delete_forecast(&self, team_id: Uuid, id: Uuid) -> StoreResult<()> {
        let conn = self.lock();
        let removed = conn.execute(
            "DELETE FROM forecasts WHERE id = ?1 AND team_id = ?2",
            params![id.to_string(), team_id.to_string()],
        )?;
        if removed == 0 {
            return Err(StoreError::NotFound(format!("Forecast {}", id)));
        }
        Ok(())
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;
    use serde_json::json;

    #[test]
    fn test_save_and_list_forecasts() {
        let db = Database::open_in_memory().unwrap();
        let user = db
            .create_user(NewUser {
                email: "f@example.com".to_string(),
                display_name: "F".to_string(),
                password_hash: "h".to_string(),
                password_salt: "s".to_string(),
            })
            .unwrap();
        let team = db.create_team("T", user.id, "TRY").unwrap();

        let params = json!({"income_growth_pct": 5.0});
        let result = json!({"points": []});
        let saved = db
            .save_forecast(team.id, "Baseline", 12, 1000, &params, &result)
            .unwrap();

        let fetched = db.forecast_by_id(team.id, saved.id).unwrap();
        assert_eq!(fetched.params["income_growth_pct"], 5.0);
        assert_eq!(db.list_forecasts(team.id).unwrap().len(), 1);

        db.delete_forecast(team.id, saved.id).unwrap();
        assert!(db.list_forecasts(team.id).unwrap().is_empty());
    }
}
