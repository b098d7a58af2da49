//! Recurring transaction templates

use chrono::{NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{NewRecurring, RecurringTransaction};
use crate::{
    format_date, format_datetime, parse_date, parse_date_opt, parse_datetime, parse_datetime_opt,
    parse_decimal, parse_enum, parse_uuid, Database,
};

type RecurringRaw = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    u32,
    String,
    Option<String>,
    bool,
    Option<String>,
    String,
);

fn row_to_recurring(row: &Row) -> rusqlite::Result<RecurringRaw> {
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
        row.get(11)?,
        row.get(12)?,
        row.get(13)?,
    ))
}

fn build_recurring(raw: RecurringRaw) -> StoreResult<RecurringTransaction> {
    Ok(RecurringTransaction {
        id: parse_uuid(raw.0)?,
        team_id: parse_uuid(raw.1)?,
        account_id: parse_uuid(raw.2)?,
        name: raw.3,
        amount: parse_decimal(raw.4)?,
        entry_type: parse_enum(raw.5)?,
        category: raw.6,
        interval_unit: parse_enum(raw.7)?,
        interval_count: raw.8,
        next_due: parse_date(raw.9)?,
        end_date: parse_date_opt(raw.10)?,
        active: raw.11,
        last_run: parse_datetime_opt(raw.12)?,
        created_at: parse_datetime(raw.13)?,
    })
}

const RECURRING_COLS: &str = "id, team_id, account_id, name, amount, entry_type, category, \
                              interval_unit, interval_count, next_due, end_date, active, \
                              last_run, created_at";

impl Database {
    pub fn create_recurring(
        &self,
        team_id: Uuid,
        new: NewRecurring,
    ) -> StoreResult<RecurringTransaction> {
        self.account_by_id(team_id, new.account_id)?;
        if new.interval_count == 0 {
            return Err(StoreError::Conflict(
                "Interval count must be at least 1".to_string(),
            ));
        }

        let template = RecurringTransaction {
            id: Uuid::new_v4(),
            team_id,
            account_id: new.account_id,
            name: new.name,
            amount: new.amount,
            entry_type: new.entry_type,
            category: new.category,
            interval_unit: new.interval_unit,
            interval_count: new.interval_count,
            next_due: new.next_due,
            end_date: new.end_date,
            active: true,
            last_run: None,
            created_at: Utc::now(),
        };

        let conn = self.lock();
        conn.execute(
            "INSERT INTO recurring_transactions
             (id, team_id, account_id, name, amount, entry_type, category, interval_unit,
              interval_count, next_due, end_date, active, last_run, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 1, NULL, ?12)",
            params![
                template.id.to_string(),
                template.team_id.to_string(),
                template.account_id.to_string(),
                template.name,
                template.amount.to_string(),
                template.entry_type.to_string(),
                template.category,
                template.interval_unit.to_string(),
                template.interval_count,
                format_date(template.next_due),
                template.end_date.map(format_date),
                format_datetime(template.created_at),
            ],
        )?;
        Ok(template)
    }

    pub fn recurring_by_id(&self, team_id: Uuid, id: Uuid) -> StoreResult<RecurringTransaction> {
        let conn = self.lock();
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {} FROM recurring_transactions WHERE id = ?1 AND team_id = ?2",
                    RECURRING_COLS
                ),
                params![id.to_string(), team_id.to_string()],
                row_to_recurring,
            )
            .optional()?;
        match raw {
            Some(raw) => build_recurring(raw),
            None => Err(StoreError::NotFound(format!("Recurring template {}", id))),
        }
    }

    pub fn list_recurring(
        &self,
        team_id: Uuid,
        active_only: bool,
    ) -> StoreResult<Vec<RecurringTransaction>> {
        let conn = self.lock();
        let sql = if active_only {
            format!(
                "SELECT {} FROM recurring_transactions
                 WHERE team_id = ?1 AND active = 1 ORDER BY next_due",
                RECURRING_COLS
            )
        } else {
            format!(
                "SELECT {} FROM recurring_transactions WHERE team_id = ?1 ORDER BY next_due",
                RECURRING_COLS
            )
        };
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![team_id.to_string()], row_to_recurring)?;
        let mut templates = Vec::new();
        for raw in rows {
            templates.push(build_recurring(raw?)?);
        }
        Ok(templates)
    }

    /// Active templates whose next due date is on or before `as_of`
    pub fn due_recurring(
        &self,
        team_id: Uuid,
        as_of: NaiveDate,
    ) -> StoreResult<Vec<RecurringTransaction>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM recurring_transactions
             WHERE team_id = ?1 AND active = 1 AND next_due <= ?2
             ORDER BY next_due",
            RECURRING_COLS
        ))?;
        let rows = stmt.query_map(
            params![team_id.to_string(), format_date(as_of)],
            row_to_recurring,
        )?;
        let mut templates = Vec::new();
        for raw in rows {
            templates.push(build_recurring(raw?)?);
        }
        Ok(templates)
    }

    /// Record the outcome of one materialization pass over a template
    pub fn mark_recurring_run(
        &self,
        id: Uuid,
        next_due: NaiveDate,
        still_active: bool,
    ) -> StoreResult<()> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE recurring_transactions
             SET next_due = ?1, active = ?2, last_run = ?3
             WHERE id = ?4",
            params![
                format_date(next_due),
                still_active,
                format_datetime(Utc::now()),
                id.to_string()
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("Recurring template {}", id)));
        }
        Ok(())
    }

    pub fn deactivate_recurring(&self, team_id: Uuid, id: Uuid) -> StoreResult<()> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE recurring_transactions SET active = 0 WHERE id = ?1 AND team_id = ?2",
            params![id.to_string(), team_id.to_string()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("Recurring template {}", id)));
        }
        Ok(())
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountKind, EntryType, IntervalUnit, NewAccount, NewUser};
    use rust_decimal::Decimal;

    fn setup() -> (Database, Uuid, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let user = db
            .create_user(NewUser {
                email: "r@example.com".to_string(),
                display_name: "R".to_string(),
                password_hash: "h".to_string(),
                password_salt: "s".to_string(),
            })
            .unwrap();
        let team = db.create_team("T", user.id, "TRY").unwrap();
        let account = db
            .create_account(
                team.id,
                NewAccount {
                    name: "Main".to_string(),
                    kind: AccountKind::Bank,
                    currency: None,
                    opening_balance: None,
                },
                "TRY",
            )
            .unwrap();
        (db, team.id, account.id)
    }

    fn template(account_id: Uuid, next_due: &str) -> NewRecurring {
        NewRecurring {
            account_id,
            name: "Rent".to_string(),
            amount: Decimal::new(150000, 2),
            entry_type: EntryType::Expense,
            category: "rent".to_string(),
            interval_unit: IntervalUnit::Monthly,
            interval_count: 1,
            next_due: NaiveDate::parse_from_str(next_due, "%Y-%m-%d").unwrap(),
            end_date: None,
        }
    }

    #[test]
    fn test_due_picks_only_ripe_templates() {
        let (db, team, account) = setup();
        db.create_recurring(team, template(account, "2025-01-01")).unwrap();
        db.create_recurring(team, template(account, "2025-06-01")).unwrap();

        let due = db
            .due_recurring(team, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap())
            .unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].next_due, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
    }

    #[test]
    fn test_mark_run_advances_and_deactivates() {
        let (db, team, account) = setup();
        let created = db.create_recurring(team, template(account, "2025-01-01")).unwrap();

        let next = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        db.mark_recurring_run(created.id, next, false).unwrap();

        let fetched = db.recurring_by_id(team, created.id).unwrap();
        assert_eq!(fetched.next_due, next);
        assert!(!fetched.active);
        assert!(fetched.last_run.is_some());
    }

    #[test]
    fn test_zero_interval_count_rejected() {
        let (db, team, account) = setup();
        let mut t = template(account, "2025-01-01");
        t.interval_count = 0;
        assert!(matches!(
            db.create_recurring(team, t),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn test_deactivate_hides_from_active_listing() {
        let (db, team, account) = setup();
        let created = db.create_recurring(team, template(account, "2025-01-01")).unwrap();
        db.deactivate_recurring(team, created.id).unwrap();
        assert!(db.list_recurring(team, true).unwrap().is_empty());
        assert_eq!(db.list_recurring(team, false).unwrap().len(), 1);
    }
}
