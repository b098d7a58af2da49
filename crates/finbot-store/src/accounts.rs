//! Account queries

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{Account, NewAccount};
use crate::{format_datetime, parse_datetime, parse_decimal, parse_enum, parse_uuid, Database};

type AccountRaw = (
    String,
    String,
    String,
    String,
    String,
    String,
    bool,
    String,
    String,
);

fn row_to_account(row: &Row) -> rusqlite::Result<AccountRaw> {
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
    ))
}

fn build_account(raw: AccountRaw) -> StoreResult<Account> {
    Ok(Account {
        id: parse_uuid(raw.0)?,
        team_id: parse_uuid(raw.1)?,
        name: raw.2,
        kind: parse_enum(raw.3)?,
        currency: raw.4,
        opening_balance: parse_decimal(raw.5)?,
        archived: raw.6,
        created_at: parse_datetime(raw.7)?,
        updated_at: parse_datetime(raw.8)?,
    })
}

const ACCOUNT_COLS: &str =
    "id, team_id, name, kind, currency, opening_balance, archived, created_at, updated_at";

impl Database {
    pub fn create_account(
        &self,
        team_id: Uuid,
        new: NewAccount,
        default_currency: &str,
    ) -> StoreResult<Account> {
        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            team_id,
            name: new.name,
            kind: new.kind,
            currency: new.currency.unwrap_or_else(|| default_currency.to_string()),
            opening_balance: new.opening_balance.unwrap_or_default(),
            archived: false,
            created_at: now,
            updated_at: now,
        };

        let conn = self.lock();
        conn.execute(
            "INSERT INTO accounts
             (id, team_id, name, kind, currency, opening_balance, archived, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?7)",
            params![
                account.id.to_string(),
                account.team_id.to_string(),
                account.name,
                account.kind.to_string(),
                account.currency,
                account.opening_balance.to_string(),
                format_datetime(now),
            ],
        )?;
        Ok(account)
    }

    pub fn account_by_id(&self, team_id: Uuid, id: Uuid) -> StoreResult<Account> {
        let conn = self.lock();
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {} FROM accounts WHERE id = ?1 AND team_id = ?2",
                    ACCOUNT_COLS
                ),
                params![id.to_string(), team_id.to_string()],
                row_to_account,
            )
            .optional()?;
        match raw {
            Some(raw) => build_account(raw),
            None => Err(StoreError::NotFound(format!("Account {}", id))),
        }
    }

    pub fn list_accounts(&self, team_id: Uuid, include_archived: bool) -> StoreResult<Vec<Account>> {
        let conn = self.lock();
        let sql = if include_archived {
            format!(
                "SELECT {} FROM accounts WHERE team_id = ?1 ORDER BY created_at",
                ACCOUNT_COLS
            )
        } else {
            format!(
                "SELECT {} FROM accounts WHERE team_id = ?1 AND archived = 0 ORDER BY created_at",
                ACCOUNT_COLS
            )
        };
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![team_id.to_string()], row_to_account)?;
        let mut accounts = Vec::new();
        for raw in rows {
            accounts.push(build_account(raw?)?);
        }
        Ok(accounts)
    }

    pub fn rename_account(&self, team_id: Uuid, id: Uuid, name: &str) -> StoreResult<Account> {
        {
            let conn = self.lock();
            let changed = conn.execute(
                "UPDATE accounts SET name = ?1, updated_at = ?2 WHERE id = ?3 AND team_id = ?4",
                params![
                    name,
                    format_datetime(Utc::now()),
                    id.to_string(),
                    team_id.to_string()
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("Account {}", id)));
            }
        }
        self.account_by_id(team_id, id)
    }

    /// Soft-delete: archived accounts keep their history but are hidden
    /// from listings and refuse new transactions.
    pub fn archive_account(&self, team_id: Uuid, id: Uuid) -> StoreResult<()> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE accounts SET archived = 1, updated_at = ?1 WHERE id = ?2 AND team_id = ?3",
            params![
                format_datetime(Utc::now()),
                id.to_string(),
                team_id.to_string()
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("Account {}", id)));
        }
        Ok(())
    }

    /// Current balance: opening balance plus the signed sum of all
    /// non-deleted transactions on the account.
    pub fn account_balance(&self, team_id: Uuid, id: Uuid) -> StoreResult<Decimal> {
        let account = self.account_by_id(team_id, id)?;
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT entry_type, amount FROM transactions
             WHERE account_id = ?1 AND deleted = 0",
        )?;
        let rows = stmt.query_map(params![id.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut balance = account.opening_balance;
        for raw in rows {
            let (entry_type, amount) = raw?;
            let amount = parse_decimal(amount)?;
            match entry_type.as_str() {
                "income" => balance += amount,
                _ => balance -= amount,
            }
        }
        Ok(balance)
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountKind, EntryType, NewTransaction, NewUser};
    use chrono::NaiveDate;

    fn setup() -> (Database, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let user = db
            .create_user(NewUser {
                email: "a@example.com".to_string(),
                display_name: "A".to_string(),
                password_hash: "h".to_string(),
                password_salt: "s".to_string(),
            })
            .unwrap();
        let team = db.create_team("T", user.id, "TRY").unwrap();
        (db, team.id)
    }

    fn new_account(name: &str) -> NewAccount {
        NewAccount {
            name: name.to_string(),
            kind: AccountKind::Bank,
            currency: None,
            opening_balance: Some(Decimal::new(10000, 2)),
        }
    }

    #[test]
    fn test_create_uses_team_default_currency() {
        let (db, team) = setup();
        let account = db.create_account(team, new_account("Main"), "TRY").unwrap();
        assert_eq!(account.currency, "TRY");
        assert_eq!(account.opening_balance, Decimal::new(10000, 2));
    }

    #[test]
    fn test_archive_hides_from_listing() {
        let (db, team) = setup();
        let account = db.create_account(team, new_account("Old"), "TRY").unwrap();
        db.archive_account(team, account.id).unwrap();

        assert!(db.list_accounts(team, false).unwrap().is_empty());
        assert_eq!(db.list_accounts(team, true).unwrap().len(), 1);
    }

    #[test]
    fn test_balance_includes_signed_transactions() {
        let (db, team) = setup();
        let account = db.create_account(team, new_account("Main"), "TRY").unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();

        for (entry_type, amount) in [
            (EntryType::Income, Decimal::new(50000, 2)),
            (EntryType::Expense, Decimal::new(20000, 2)),
        ] {
            db.create_transaction(
                team,
                NewTransaction {
                    account_id: account.id,
                    entry_type,
                    amount,
                    currency: None,
                    category: "general".to_string(),
                    description: String::new(),
                    counterparty: None,
                    date,
                    due_date: None,
                    recurring_id: None,
                },
                "TRY",
            )
            .unwrap();
        }

        // 100 opening + 500 income - 200 expense
        assert_eq!(
            db.account_balance(team, account.id).unwrap(),
            Decimal::new(40000, 2)
        );
    }

    #[test]
    fn test_cross_team_lookup_is_not_found() {
        let (db, team) = setup();
        let account = db.create_account(team, new_account("Main"), "TRY").unwrap();
        let other = Uuid::new_v4();
        assert!(matches!(
            db.account_by_id(other, account.id),
            Err(StoreError::NotFound(_))
        ));
    }
}
