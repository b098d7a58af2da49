//! Installment credit queries

use chrono::{Months, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use crate::audit::insert_audit_row;
use crate::error::{StoreError, StoreResult};
use crate::models::{Credit, CreditPayment, NewCredit};
use crate::{format_date, format_datetime, parse_date, parse_datetime, parse_decimal, parse_uuid, Database};

type CreditRaw = (
    String,
    String,
    String,
    String,
    String,
    i64,
    String,
    String,
    u32,
    String,
    bool,
    String,
);

fn row_to_credit(row: &Row) -> rusqlite::Result<CreditRaw> {
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
    ))
}

fn build_credit(raw: CreditRaw) -> StoreResult<Credit> {
    Ok(Credit {
        id: parse_uuid(raw.0)?,
        team_id: parse_uuid(raw.1)?,
        name: raw.2,
        principal: parse_decimal(raw.3)?,
        balance: parse_decimal(raw.4)?,
        annual_rate_bps: raw.5,
        installment: parse_decimal(raw.6)?,
        start_date: parse_date(raw.7)?,
        term_months: raw.8,
        next_payment_due: parse_date(raw.9)?,
        closed: raw.10,
        created_at: parse_datetime(raw.11)?,
    })
}

const CREDIT_COLS: &str = "id, team_id, name, principal, balance, annual_rate_bps, installment, \
                           start_date, term_months, next_payment_due, closed, created_at";

/// Step a due date forward one month, clamping at month end
fn next_month(date: NaiveDate) -> NaiveDate {
    date.checked_add_months(Months::new(1)).unwrap_or(date)
}

impl Database {
    pub fn create_credit(&self, team_id: Uuid, new: NewCredit) -> StoreResult<Credit> {
        if new.principal <= Decimal::ZERO {
            return Err(StoreError::Conflict(
                "Principal must be positive".to_string(),
            ));
        }
        if new.term_months == 0 {
            return Err(StoreError::Conflict(
                "Term must be at least one month".to_string(),
            ));
        }

        let credit = Credit {
            id: Uuid::new_v4(),
            team_id,
            name: new.name,
            principal: new.principal,
            balance: new.principal,
            annual_rate_bps: new.annual_rate_bps,
            installment: new.installment,
            start_date: new.start_date,
            term_months: new.term_months,
            next_payment_due: next_month(new.start_date),
            closed: false,
            created_at: Utc::now(),
        };

        let conn = self.lock();
        conn.execute(
            "INSERT INTO credits
             (id, team_id, name, principal, balance, annual_rate_bps, installment, start_date,
              term_months, next_payment_due, closed, created_at)
             VALUES (?1, ?2, ?3, ?4, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10)",
            params![
                credit.id.to_string(),
                credit.team_id.to_string(),
                credit.name,
                credit.principal.to_string(),
                credit.annual_rate_bps,
                credit.installment.to_string(),
                format_date(credit.start_date),
                credit.term_months,
                format_date(credit.next_payment_due),
                format_datetime(credit.created_at),
            ],
        )?;
        Ok(credit)
    }

    pub fn credit_by_id(&self, team_id: Uuid, id: Uuid) -> StoreResult<Credit> {
        let conn = self.lock();
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {} FROM credits WHERE id = ?1 AND team_id = ?2",
                    CREDIT_COLS
                ),
                params![id.to_string(), team_id.to_string()],
                row_to_credit,
            )
            .optional()?;
        match raw {
            Some(raw) => build_credit(raw),
            None => Err(StoreError::NotFound(format!("Credit {}", id))),
        }
    }

    pub fn list_credits(&self, team_id: Uuid, open_only: bool) -> StoreResult<Vec<Credit>> {
        let conn = self.lock();
        let sql = if open_only {
            format!(
                "SELECT {} FROM credits WHERE team_id = ?1 AND closed = 0 ORDER BY created_at",
                CREDIT_COLS
            )
        } else {
            format!(
                "SELECT {} FROM credits WHERE team_id = ?1 ORDER BY created_at",
                CREDIT_COLS
            )
        };
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![team_id.to_string()], row_to_credit)?;
        let mut credits = Vec::new();
        for raw in rows {
            credits.push(build_credit(raw?)?);
        }
        Ok(credits)
    }

    /// Apply one payment: append the payment row, shrink the balance by
    /// the principal part, advance the due date, and close the credit
    /// when the balance reaches zero. All inside one transaction.
    pub fn apply_credit_payment(
        &self,
        team_id: Uuid,
        credit_id: Uuid,
        principal_part: Decimal,
        interest_part: Decimal,
        actor_id: Uuid,
    ) -> StoreResult<CreditPayment> {
        let mut guard = self.lock();
        let tx = guard.transaction()?;

        let raw = tx
            .query_row(
                &format!(
                    "SELECT {} FROM credits WHERE id = ?1 AND team_id = ?2",
                    CREDIT_COLS
                ),
                params![credit_id.to_string(), team_id.to_string()],
                row_to_credit,
            )
            .optional()?;
        let credit = match raw {
            Some(raw) => build_credit(raw)?,
            None => return Err(StoreError::NotFound(format!("Credit {}", credit_id))),
        };
        if credit.closed {
            return Err(StoreError::Conflict(format!(
                "Credit {} is already closed",
                credit_id
            )));
        }
        if principal_part > credit.balance {
            return Err(StoreError::Conflict(format!(
                "Principal part {} exceeds balance {}",
                principal_part, credit.balance
            )));
        }

        let new_balance = credit.balance - principal_part;
        let closed = new_balance == Decimal::ZERO;
        let payment = CreditPayment {
            id: Uuid::new_v4(),
            credit_id,
            amount: principal_part + interest_part,
            principal_part,
            interest_part,
            paid_at: Utc::now(),
        };

        tx.execute(
            "INSERT INTO credit_payments (id, credit_id, amount, principal_part, interest_part, paid_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                payment.id.to_string(),
                payment.credit_id.to_string(),
                payment.amount.to_string(),
                payment.principal_part.to_string(),
                payment.interest_part.to_string(),
                format_datetime(payment.paid_at),
            ],
        )?;
        tx.execute(
            "UPDATE credits SET balance = ?1, next_payment_due = ?2, closed = ?3 WHERE id = ?4",
            params![
                new_balance.to_string(),
                format_date(next_month(credit.next_payment_due)),
                closed,
                credit_id.to_string()
            ],
        )?;
        insert_audit_row(
            &tx,
            team_id,
            actor_id,
            "credit.payment",
            "credit",
            credit_id,
            &json!({
                "amount": payment.amount.to_string(),
                "balance_after": new_balance.to_string(),
                "closed": closed,
            }),
        )?;
        tx.commit()?;
        Ok(payment)
    }

    pub fn credit_payments(&self, team_id: Uuid, credit_id: Uuid) -> StoreResult<Vec<CreditPayment>> {
        self.credit_by_id(team_id, credit_id)?;
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, credit_id, amount, principal_part, interest_part, paid_at
             FROM credit_payments WHERE credit_id = ?1 ORDER BY paid_at",
        )?;
        let rows = stmt.query_map(params![credit_id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;
        let mut payments = Vec::new();
        for raw in rows {
            let raw = raw?;
            payments.push(CreditPayment {
                id: parse_uuid(raw.0)?,
                credit_id: parse_uuid(raw.1)?,
                amount: parse_decimal(raw.2)?,
                principal_part: parse_decimal(raw.3)?,
                interest_part: parse_decimal(raw.4)?,
                paid_at: parse_datetime(raw.5)?,
            });
        }
        Ok(payments)
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;

    fn setup() -> (Database, Uuid, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let user = db
            .create_user(NewUser {
                email: "k@example.com".to_string(),
                display_name: "K".to_string(),
                password_hash: "h".to_string(),
                password_salt: "s".to_string(),
            })
            .unwrap();
        let team = db.create_team("T", user.id, "TRY").unwrap();
        (db, team.id, user.id)
    }

    fn new_credit(principal: i64) -> NewCredit {
        NewCredit {
            name: "Car loan".to_string(),
            principal: Decimal::new(principal, 2),
            annual_rate_bps: 1200,
            installment: Decimal::new(100000, 2),
            start_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            term_months: 12,
        }
    }

    #[test]
    fn test_create_sets_balance_and_first_due() {
        let (db, team, _) = setup();
        let credit = db.create_credit(team, new_credit(1_200_000)).unwrap();
        assert_eq!(credit.balance, credit.principal);
        assert_eq!(
            credit.next_payment_due,
            NaiveDate::from_ymd_opt(2025, 2, 15).unwrap()
        );
    }

    #[test]
    fn test_payment_shrinks_balance_and_advances_due() {
        let (db, team, user) = setup();
        let credit = db.create_credit(team, new_credit(1_200_000)).unwrap();

        let payment = db
            .apply_credit_payment(
                team,
                credit.id,
                Decimal::new(90000, 2),
                Decimal::new(10000, 2),
                user,
            )
            .unwrap();
        assert_eq!(payment.amount, Decimal::new(100000, 2));

        let fetched = db.credit_by_id(team, credit.id).unwrap();
        assert_eq!(fetched.balance, Decimal::new(1_110_000, 2));
        assert_eq!(
            fetched.next_payment_due,
            NaiveDate::from_ymd_opt(2025, 3, 15).unwrap()
        );
        assert!(!fetched.closed);
        assert_eq!(db.credit_payments(team, credit.id).unwrap().len(), 1);
    }

    #[test]
    fn test_final_payment_closes_credit() {
        let (db, team, user) = setup();
        let credit = db.create_credit(team, new_credit(50000)).unwrap();

        db.apply_credit_payment(team, credit.id, Decimal::new(50000, 2), Decimal::ZERO, user)
            .unwrap();
        let fetched = db.credit_by_id(team, credit.id).unwrap();
        assert!(fetched.closed);
        assert_eq!(fetched.balance, Decimal::ZERO);

        let err = db
            .apply_credit_payment(team, credit.id, Decimal::new(100, 2), Decimal::ZERO, user)
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert!(db.list_credits(team, true).unwrap().is_empty());
    }

    #[test]
    fn test_overpayment_of_principal_rejected() {
        let (db, team, user) = setup();
        let credit = db.create_credit(team, new_credit(10000)).unwrap();
        let err = db
            .apply_credit_payment(team, credit.id, Decimal::new(20000, 2), Decimal::ZERO, user)
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(
            db.credit_by_id(team, credit.id).unwrap().balance,
            Decimal::new(10000, 2)
        );
    }
}
