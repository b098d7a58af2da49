//! Investment position queries

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{Investment, NewInvestment};
use crate::{format_date, format_datetime, parse_date, parse_datetime, parse_decimal, parse_uuid, Database};

type InvestmentRaw = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    bool,
    String,
);

fn row_to_investment(row: &Row) -> rusqlite::Result<InvestmentRaw> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ))
}

fn build_investment(raw: InvestmentRaw) -> StoreResult<Investment> {
    Ok(Investment {
        id: parse_uuid(raw.0)?,
        team_id: parse_uuid(raw.1)?,
        name: raw.2,
        kind: raw.3,
        units: parse_decimal(raw.4)?,
        unit_cost: parse_decimal(raw.5)?,
        current_price: parse_decimal(raw.6)?,
        currency: raw.7,
        purchased_at: parse_date(raw.8)?,
        archived: raw.9,
        created_at: parse_datetime(raw.10)?,
    })
}

const INVESTMENT_COLS: &str = "id, team_id, name, kind, units, unit_cost, current_price, \
                               currency, purchased_at, archived, created_at";

impl Database {
    pub fn create_investment(
        &self,
        team_id: Uuid,
        new: NewInvestment,
        default_currency: &str,
    ) -> StoreResult<Investment> {
        if new.units <= Decimal::ZERO {
            return Err(StoreError::Conflict("Units must be positive".to_string()));
        }

        let investment = Investment {
            id: Uuid::new_v4(),
            team_id,
            name: new.name,
            kind: new.kind,
            units: new.units,
            unit_cost: new.unit_cost,
            current_price: new.current_price.unwrap_or(new.unit_cost),
            currency: new.currency.unwrap_or_else(|| default_currency.to_string()),
            purchased_at: new.purchased_at,
            archived: false,
            created_at: Utc::now(),
        };

        let conn = self.lock();
        conn.execute(
            "INSERT INTO investments
             (id, team_id, name, kind, units, unit_cost, current_price, currency, purchased_at,
              archived, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10)",
            params![
                investment.id.to_string(),
                investment.team_id.to_string(),
                investment.name,
                investment.kind,
                investment.units.to_string(),
                investment.unit_cost.to_string(),
                investment.current_price.to_string(),
                investment.currency,
                format_date(investment.purchased_at),
                format_datetime(investment.created_at),
            ],
        )?;
        Ok(investment)
    }

    pub fn investment_by_id(&self, team_id: Uuid, id: Uuid) -> StoreResult<Investment> {
        let conn = self.lock();
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {} FROM investments WHERE id = ?1 AND team_id = ?2",
                    INVESTMENT_COLS
                ),
                params![id.to_string(), team_id.to_string()],
                row_to_investment,
            )
            .optional()?;
        match raw {
            Some(raw) => build_investment(raw),
            None => Err(StoreError::NotFound(format!("Investment {}", id))),
        }
    }

    pub fn list_investments(
        &self,
        team_id: Uuid,
        include_archived: bool,
    ) -> StoreResult<Vec<Investment>> {
        let conn = self.lock();
        let sql = if include_archived {
            format!(
                "SELECT {} FROM investments WHERE team_id = ?1 ORDER BY created_at",
                INVESTMENT_COLS
            )
        } else {
            format!(
                "SELECT {} FROM investments WHERE team_id = ?1 AND archived = 0 ORDER BY created_at",
                INVESTMENT_COLS
            )
        };
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![team_id.to_string()], row_to_investment)?;
        let mut investments = Vec::new();
        for raw in rows {
            investments.push(build_investment(raw?)?);
        }
        Ok(investments)
    }

    /// Refresh the mark price of a position
    pub fn update_investment_price(
        &self,
        team_id: Uuid,
        id: Uuid,
        current_price: Decimal,
    ) -> StoreResult<Investment> {
        if current_price < Decimal::ZERO {
            return Err(StoreError::Conflict("Price cannot be negative".to_string()));
        }
        {
            let conn = self.lock();
            let changed = conn.execute(
                "UPDATE investments SET current_price = ?1 WHERE id = ?2 AND team_id = ?3",
                params![current_price.to_string(), id.to_string(), team_id.to_string()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("Investment {}", id)));
            }
        }
        self.investment_by_id(team_id, id)
    }

    pub fn archive_investment(&self, team_id: Uuid, id: Uuid) -> StoreResult<()> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE investments SET archived = 1 WHERE id = ?1 AND team_id = ?2",
            params![id.to_string(), team_id.to_string()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("Investment {}", id)));
        }
        Ok(())
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;
    use chrono::NaiveDate;

    fn setup() -> (Database, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let user = db
            .create_user(NewUser {
                email: "i@example.com".to_string(),
                display_name: "I".to_string(),
                password_hash: "h".to_string(),
                password_salt: "s".to_string(),
            })
            .unwrap();
        let team = db.create_team("T", user.id, "TRY").unwrap();
        (db, team.id)
    }

    fn new_position() -> NewInvestment {
        NewInvestment {
            name: "Gold".to_string(),
            kind: "commodity".to_string(),
            units: Decimal::new(10, 0),
            unit_cost: Decimal::new(200000, 2),
            current_price: None,
            currency: None,
            purchased_at: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        }
    }

    #[test]
    fn test_price_defaults_to_cost_and_gain_tracks_mark() {
        let (db, team) = setup();
        let position = db.create_investment(team, new_position(), "TRY").unwrap();
        assert_eq!(position.current_price, position.unit_cost);
        assert_eq!(position.gain(), Decimal::ZERO);

        let updated = db
            .update_investment_price(team, position.id, Decimal::new(250000, 2))
            .unwrap();
        // 10 units * (2500 - 2000)
        assert_eq!(updated.gain(), Decimal::new(500000, 2));
        assert_eq!(updated.market_value(), Decimal::new(2_500_000, 2));
    }

    #[test]
    fn test_zero_units_rejected() {
        let (db, team) = setup();
        let mut p = new_position();
        p.units = Decimal::ZERO;
        assert!(matches!(
            db.create_investment(team, p, "TRY"),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn test_archive_hides_position() {
        let (db, team) = setup();
        let position = db.create_investment(team, new_position(), "TRY").unwrap();
        db.archive_investment(team, position.id).unwrap();
        assert!(db.list_investments(team, false).unwrap().is_empty());
        assert_eq!(db.list_investments(team, true).unwrap().len(), 1);
    }
}
