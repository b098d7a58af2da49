//! Recurring transaction engine
//!
//! Walks each active template forward from its next due date,
//! materializing one concrete transaction per elapsed occurrence up to
//! the run date. Catch-up is bounded so a template forgotten for years
//! cannot flood the books in a single run.

use chrono::{Duration, Months, NaiveDate};
use finbot_store::models::{IntervalUnit, NewTransaction, RecurringTransaction};
use finbot_store::Database;
use log::{info, warn};
use uuid::Uuid;

use crate::error::CoreResult;

/// Upper bound on occurrences materialized per template per run
pub const MAX_CATCHUP: usize = 36;

/// Step a due date forward by one schedule interval.
///
/// Month-based steps clamp to the end of the target month, so a
/// template due Jan 31 lands on Feb 28 (or 29) next.
pub fn advance(date: NaiveDate, unit: IntervalUnit, count: u32) -> NaiveDate {
    match unit {
        IntervalUnit::Daily => date + Duration::days(count as i64),
        IntervalUnit::Weekly => date + Duration::days(7 * count as i64),
        IntervalUnit::Monthly => date
            .checked_add_months(Months::new(count))
            .unwrap_or(date),
        IntervalUnit::Quarterly => date
            .checked_add_months(Months::new(3 * count))
            .unwrap_or(date),
        IntervalUnit::Yearly => date
            .checked_add_months(Months::new(12 * count))
            .unwrap_or(date),
    }
}

/// Outcome of one run over a team's templates
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct RunReport {
    pub templates_processed: usize,
    pub transactions_created: usize,
    pub templates_deactivated: usize,
}

#[derive(Clone)]
pub struct RecurringEngine {
    db: Database,
}

impl RecurringEngine {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Materialize every due occurrence for the team as of `as_of`
    pub fn run_due(
        &self,
        team_id: Uuid,
        as_of: NaiveDate,
        default_currency: &str,
    ) -> CoreResult<RunReport> {
        let mut report = RunReport::default();

        for template in self.db.due_recurring(team_id, as_of)? {
            report.templates_processed += 1;
            let (created, next_due, still_active) =
                self.materialize(&template, as_of, default_currency)?;
            report.transactions_created += created;
            if !still_active {
                report.templates_deactivated += 1;
            }
            self.db.mark_recurring_run(template.id, next_due, still_active)?;
        }

        if report.transactions_created > 0 {
            info!(
                "Recurring run for team {}: {} transactions from {} templates",
                team_id, report.transactions_created, report.templates_processed
            );
        }
        Ok(report)
    }

    /// Walk one template forward, creating a transaction per occurrence.
    /// Returns the created count, the new next due date, and whether the
    /// template stays active.
    fn materialize(
        &self,
        template: &RecurringTransaction,
        as_of: NaiveDate,
        default_currency: &str,
    ) -> CoreResult<(usize, NaiveDate, bool)> {
        let mut due = template.next_due;
        let mut created = 0;

        while due <= as_of && created < MAX_CATCHUP {
            if let Some(end) = template.end_date {
                if due > end {
                    return Ok((created, due, false));
                }
            }
            self.db.create_transaction(
                template.team_id,
                NewTransaction {
                    account_id: template.account_id,
                    entry_type: template.entry_type,
                    amount: template.amount,
                    currency: None,
                    category: template.category.clone(),
                    description: template.name.clone(),
                    counterparty: None,
                    date: due,
                    due_date: None,
                    recurring_id: Some(template.id),
                },
                default_currency,
            )?;
            created += 1;
            due = advance(due, template.interval_unit, template.interval_count);
        }

        if created == MAX_CATCHUP && due <= as_of {
            warn!(
                "Recurring template {} hit the catch-up cap at {} occurrences",
                template.id, MAX_CATCHUP
            );
        }

        let still_active = match template.end_date {
            Some(end) => due <= end,
            None => true,
        };
        Ok((created, due, still_active))
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;
    use finbot_store::models::{
        AccountKind, EntryType, NewAccount, NewRecurring, NewUser, TransactionFilter,
    };
    use rust_decimal::Decimal;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_advance_daily_and_weekly() {
        assert_eq!(advance(date("2025-03-01"), IntervalUnit::Daily, 10), date("2025-03-11"));
        assert_eq!(advance(date("2025-03-01"), IntervalUnit::Weekly, 2), date("2025-03-15"));
    }

    #[test]
    fn test_advance_monthly_clamps_at_month_end() {
        assert_eq!(advance(date("2025-01-31"), IntervalUnit::Monthly, 1), date("2025-02-28"));
        assert_eq!(advance(date("2024-01-31"), IntervalUnit::Monthly, 1), date("2024-02-29"));
        assert_eq!(advance(date("2025-01-15"), IntervalUnit::Quarterly, 1), date("2025-04-15"));
        assert_eq!(advance(date("2024-02-29"), IntervalUnit::Yearly, 1), date("2025-02-28"));
    }

    fn setup() -> (Database, Uuid, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let user = db
            .create_user(NewUser {
                email: "e@example.com".to_string(),
                display_name: "E".to_string(),
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

    fn template(account: Uuid, next_due: &str, end: Option<&str>) -> NewRecurring {
        NewRecurring {
            account_id: account,
            name: "Salary".to_string(),
            amount: Decimal::new(500000, 2),
            entry_type: EntryType::Income,
            category: "salary".to_string(),
            interval_unit: IntervalUnit::Monthly,
            interval_count: 1,
            next_due: date(next_due),
            end_date: end.map(date),
        }
    }

    #[test]
    fn test_run_materializes_elapsed_occurrences() {
        let (db, team, account) = setup();
        db.create_recurring(team, template(account, "2025-01-01", None)).unwrap();
        let engine = RecurringEngine::new(db.clone());

        let report = engine.run_due(team, date("2025-03-15"), "TRY").unwrap();
        assert_eq!(report.transactions_created, 3); // Jan, Feb, Mar

        let txns = db.list_transactions(team, &TransactionFilter::default()).unwrap();
        assert_eq!(txns.len(), 3);
        assert!(txns.iter().all(|t| t.recurring_id.is_some()));

        // a second run on the same day creates nothing new
        let report = engine.run_due(team, date("2025-03-15"), "TRY").unwrap();
        assert_eq!(report.transactions_created, 0);
    }

    #[test]
    fn test_template_deactivates_past_end_date() {
        let (db, team, account) = setup();
        db.create_recurring(team, template(account, "2025-01-01", Some("2025-02-15")))
            .unwrap();
        let engine = RecurringEngine::new(db.clone());

        let report = engine.run_due(team, date("2025-06-01"), "TRY").unwrap();
        assert_eq!(report.transactions_created, 2); // Jan 1, Feb 1
        assert_eq!(report.templates_deactivated, 1);
        assert!(db.list_recurring(team, true).unwrap().is_empty());
    }

    #[test]
    fn test_catch_up_is_bounded() {
        let (db, team, account) = setup();
        let mut t = template(account, "2015-01-01", None);
        t.interval_unit = IntervalUnit::Daily;
        db.create_recurring(team, t).unwrap();
        let engine = RecurringEngine::new(db.clone());

        let report = engine.run_due(team, date("2025-01-01"), "TRY").unwrap();
        assert_eq!(report.transactions_created, MAX_CATCHUP);
    }

    #[test]
    fn test_future_template_untouched() {
        let (db, team, account) = setup();
        db.create_recurring(team, template(account, "2025-12-01", None)).unwrap();
        let engine = RecurringEngine::new(db.clone());

        let report = engine.run_due(team, date("2025-06-01"), "TRY").unwrap();
        assert_eq!(report.templates_processed, 0);
        assert_eq!(report.transactions_created, 0);
    }
}
