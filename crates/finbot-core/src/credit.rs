//! Installment credit service
//!
//! Flat-rate amortization: each payment first covers one month of
//! interest on the outstanding balance, the remainder reduces the
//! principal. The final payment is clamped so the balance never goes
//! below zero.

use finbot_store::models::{Credit, CreditPayment, NewCredit};
use finbot_store::Database;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// Split one installment into principal and interest parts.
/// Returns `(principal, interest)`.
pub fn installment_split(
    balance: Decimal,
    annual_rate_bps: i64,
    installment: Decimal,
) -> CoreResult<(Decimal, Decimal)> {
    if balance <= Decimal::ZERO {
        return Err(CoreError::Validation(
            "Balance must be positive".to_string(),
        ));
    }
    let monthly_rate = Decimal::new(annual_rate_bps, 4) / Decimal::from(12);
    let interest = (balance * monthly_rate).round_dp(2);
    if installment <= interest {
        return Err(CoreError::Validation(format!(
            "Installment {} does not cover the monthly interest {}",
            installment, interest
        )));
    }
    let principal = (installment - interest).min(balance);
    Ok((principal, interest))
}

#[derive(Clone)]
pub struct CreditBook {
    db: Database,
}

impl CreditBook {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn create(&self, team_id: Uuid, new: NewCredit) -> CoreResult<Credit> {
        if new.annual_rate_bps < 0 {
            return Err(CoreError::Validation(
                "Interest rate cannot be negative".to_string(),
            ));
        }
        if new.installment <= Decimal::ZERO {
            return Err(CoreError::Validation(
                "Installment must be positive".to_string(),
            ));
        }
        // reject plans where the first payment cannot reduce principal
        installment_split(new.principal, new.annual_rate_bps, new.installment)?;
        Ok(self.db.create_credit(team_id, new)?)
    }

    pub fn get(&self, team_id: Uuid, id: Uuid) -> CoreResult<Credit> {
        Ok(self.db.credit_by_id(team_id, id)?)
    }

    pub fn list(&self, team_id: Uuid, open_only: bool) -> CoreResult<Vec<Credit>> {
        Ok(self.db.list_credits(team_id, open_only)?)
    }

    pub fn payments(&self, team_id: Uuid, id: Uuid) -> CoreResult<Vec<CreditPayment>> {
        Ok(self.db.credit_payments(team_id, id)?)
    }

    /// Record one installment payment against the credit
    pub fn pay(&self, team_id: Uuid, id: Uuid, actor_id: Uuid) -> CoreResult<CreditPayment> {
        let credit = self.db.credit_by_id(team_id, id)?;
        if credit.closed {
            return Err(CoreError::Conflict(format!(
                "Credit {} is already closed",
                id
            )));
        }
        let (principal, interest) =
            installment_split(credit.balance, credit.annual_rate_bps, credit.installment)?;
        Ok(self
            .db
            .apply_credit_payment(team_id, id, principal, interest, actor_id)?)
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use finbot_store::models::NewUser;

    #[test]
    fn test_split_covers_interest_first() {
        // 12000 at 12% -> monthly interest 120
        let (principal, interest) = installment_split(
            Decimal::new(1_200_000, 2),
            1200,
            Decimal::new(110_000, 2),
        )
        .unwrap();
        assert_eq!(interest, Decimal::new(12_000, 2));
        assert_eq!(principal, Decimal::new(98_000, 2));
    }

    #[test]
    fn test_split_clamps_final_payment() {
        // balance 50, installment 1100: principal part is the whole balance
        let (principal, _) =
            installment_split(Decimal::new(5_000, 2), 1200, Decimal::new(110_000, 2)).unwrap();
        assert_eq!(principal, Decimal::new(5_000, 2));
    }

    #[test]
    fn test_split_rejects_insufficient_installment() {
        let err = installment_split(Decimal::new(1_200_000, 2), 1200, Decimal::new(10_000, 2))
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    fn setup() -> (CreditBook, Database, Uuid, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let user = db
            .create_user(NewUser {
                email: "c@example.com".to_string(),
                display_name: "C".to_string(),
                password_hash: "h".to_string(),
                password_salt: "s".to_string(),
            })
            .unwrap();
        let team = db.create_team("T", user.id, "TRY").unwrap();
        (CreditBook::new(db.clone()), db, team.id, user.id)
    }

    #[test]
    fn test_payments_run_to_closure() {
        let (book, _db, team, user) = setup();
        let credit = book
            .create(
                team,
                NewCredit {
                    name: "Bridge loan".to_string(),
                    principal: Decimal::new(30_000, 2), // 300.00
                    annual_rate_bps: 0,
                    installment: Decimal::new(10_000, 2), // 100.00
                    start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                    term_months: 3,
                },
            )
            .unwrap();

        for _ in 0..3 {
            book.pay(team, credit.id, user).unwrap();
        }
        let fetched = book.get(team, credit.id).unwrap();
        assert!(fetched.closed);
        assert_eq!(fetched.balance, Decimal::ZERO);
        assert_eq!(book.payments(team, credit.id).unwrap().len(), 3);

        let err = book.pay(team, credit.id, user).unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn test_interest_shrinks_as_balance_falls() {
        let (book, _db, team, user) = setup();
        let credit = book
            .create(
                team,
                NewCredit {
                    name: "Loan".to_string(),
                    principal: Decimal::new(1_200_000, 2),
                    annual_rate_bps: 1200,
                    installment: Decimal::new(110_000, 2),
                    start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                    term_months: 12,
                },
            )
            .unwrap();

        let first = book.pay(team, credit.id, user).unwrap();
        let second = book.pay(team, credit.id, user).unwrap();
        assert!(second.interest_part < first.interest_part);
        assert!(second.principal_part > first.principal_part);
        assert_eq!(first.amount, second.amount);
    }
}
