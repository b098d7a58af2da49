//! Summary reports and CSV export

use finbot_store::models::{EntryType, MonthlyFlow, TransactionFilter};
use finbot_store::Database;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::error::CoreResult;

/// Headline numbers for a team's dashboard
#[derive(Debug, Clone, Serialize)]
pub struct TeamSummary {
    pub accounts_total: Decimal,
    pub cashbox_total: Decimal,
    pub open_receivables: Decimal,
    pub open_payables: Decimal,
    pub outstanding_credit: Decimal,
    pub investment_value: Decimal,
    /// Accounts plus cashboxes plus investments minus credit debt
    pub net_position: Decimal,
}

pub fn team_summary(db: &Database, team_id: Uuid) -> CoreResult<TeamSummary> {
    let mut accounts_total = Decimal::ZERO;
    for account in db.list_accounts(team_id, false)? {
        accounts_total += db.account_balance(team_id, account.id)?;
    }

    let cashbox_total = db
        .list_cashboxes(team_id, false)?
        .iter()
        .map(|b| b.balance)
        .sum();

    let mut open_receivables = Decimal::ZERO;
    let mut open_payables = Decimal::ZERO;
    for invoice in db.open_invoices(team_id)? {
        match invoice.entry_type {
            EntryType::Income => open_receivables += invoice.amount,
            EntryType::Expense => open_payables += invoice.amount,
        }
    }

    let outstanding_credit = db
        .list_credits(team_id, true)?
        .iter()
        .map(|c| c.balance)
        .sum();
    let investment_value = db
        .list_investments(team_id, false)?
        .iter()
        .map(|i| i.market_value())
        .sum();

    let net_position =
        accounts_total + cashbox_total + investment_value - outstanding_credit;
    Ok(TeamSummary {
        accounts_total,
        cashbox_total,
        open_receivables,
        open_payables,
        outstanding_credit,
        investment_value,
        net_position,
    })
}

/// Monthly income/expense/net series, oldest first
pub fn monthly_series(db: &Database, team_id: Uuid) -> CoreResult<Vec<MonthlyFlow>> {
    Ok(db.monthly_net_flows(team_id)?)
}

// ==================== CSV export ====================

/// Quote a CSV field when it contains a delimiter, quote, or newline
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Render the team's transactions as CSV, newest first
pub fn transactions_csv(
    db: &Database,
    team_id: Uuid,
    filter: &TransactionFilter,
) -> CoreResult<String> {
    let mut out = String::from(
        "date,type,amount,currency,category,description,counterparty,due_date,settled\n",
    );
    for txn in db.list_transactions(team_id, filter)? {
        let row = [
            txn.date.format("%Y-%m-%d").to_string(),
            txn.entry_type.to_string(),
            txn.amount.to_string(),
            txn.currency.clone(),
            txn.category.clone(),
            txn.description.clone(),
            txn.counterparty.clone().unwrap_or_default(),
            txn.due_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            if txn.settled_at.is_some() { "yes" } else { "no" }.to_string(),
        ];
        let line: Vec<String> = row.iter().map(|f| csv_field(f)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    Ok(out)
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use finbot_store::models::{
        AccountKind, NewAccount, NewCashbox, NewTransaction, NewUser,
    };

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
                    opening_balance: Some(Decimal::new(100_000, 2)),
                },
                "TRY",
            )
            .unwrap();
        (db, team.id, account.id)
    }

    #[test]
    fn test_summary_aggregates_all_sides() {
        let (db, team, account) = setup();
        db.create_cashbox(
            team,
            NewCashbox {
                name: "Till".to_string(),
                currency: None,
                opening_balance: Some(Decimal::new(50_000, 2)),
            },
            "TRY",
        )
        .unwrap();
        db.create_transaction(
            team,
            NewTransaction {
                account_id: account,
                entry_type: EntryType::Income,
                amount: Decimal::new(30_000, 2),
                currency: None,
                category: "sales".to_string(),
                description: String::new(),
                counterparty: Some("Acme".to_string()),
                date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                due_date: Some(NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()),
                recurring_id: None,
            },
            "TRY",
        )
        .unwrap();

        let summary = team_summary(&db, team).unwrap();
        // opening 1000 + 300 income
        assert_eq!(summary.accounts_total, Decimal::new(130_000, 2));
        assert_eq!(summary.cashbox_total, Decimal::new(50_000, 2));
        assert_eq!(summary.open_receivables, Decimal::new(30_000, 2));
        assert_eq!(summary.open_payables, Decimal::ZERO);
        assert_eq!(summary.net_position, Decimal::new(180_000, 2));
    }

    #[test]
    fn test_csv_has_header_and_quoting() {
        let (db, team, account) = setup();
        db.create_transaction(
            team,
            NewTransaction {
                account_id: account,
                entry_type: EntryType::Expense,
                amount: Decimal::new(9_999, 2),
                currency: None,
                category: "office".to_string(),
                description: "chairs, desks and \"misc\"".to_string(),
                counterparty: None,
                date: NaiveDate::from_ymd_opt(2025, 3, 5).unwrap(),
                due_date: None,
                recurring_id: None,
            },
            "TRY",
        )
        .unwrap();

        let csv = transactions_csv(&db, team, &TransactionFilter::default()).unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("date,type,amount"));
        let row = lines.next().unwrap();
        assert!(row.contains("2025-03-05,expense,99.99,TRY,office"));
        assert!(row.contains("\"chairs, desks and \"\"misc\"\"\""));
    }

    #[test]
    fn test_empty_csv_is_just_header() {
        let (db, team, _) = setup();
        let csv = transactions_csv(&db, team, &TransactionFilter::default()).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }
}
