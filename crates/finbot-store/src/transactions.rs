//! Transaction queries

use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{MonthlyFlow, NewTransaction, Transaction, TransactionFilter};
use crate::{
    format_date, format_datetime, parse_date, parse_date_opt, parse_datetime, parse_datetime_opt,
    parse_decimal, parse_enum, parse_uuid, parse_uuid_opt, Database,
};

type TxnRaw = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    bool,
    String,
);

fn row_to_txn(row: &Row) -> rusqlite::Result<TxnRaw> {
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
        row.get(14)?,
    ))
}

fn build_txn(raw: TxnRaw) -> StoreResult<Transaction> {
    Ok(Transaction {
        id: parse_uuid(raw.0)?,
        team_id: parse_uuid(raw.1)?,
        account_id: parse_uuid(raw.2)?,
        entry_type: parse_enum(raw.3)?,
        amount: parse_decimal(raw.4)?,
        currency: raw.5,
        category: raw.6,
        description: raw.7,
        counterparty: raw.8,
        date: parse_date(raw.9)?,
        due_date: parse_date_opt(raw.10)?,
        settled_at: parse_datetime_opt(raw.11)?,
        recurring_id: parse_uuid_opt(raw.12)?,
        deleted: raw.13,
        created_at: parse_datetime(raw.14)?,
    })
}

const TXN_COLS: &str = "id, team_id, account_id, entry_type, amount, currency, category, \
                        description, counterparty, date, due_date, settled_at, recurring_id, \
                        deleted, created_at";

impl Database {
    pub fn create_transaction(
        &self,
        team_id: Uuid,
        new: NewTransaction,
        default_currency: &str,
    ) -> StoreResult<Transaction> {
        let account = self.account_by_id(team_id, new.account_id)?;
        if account.archived {
            return Err(StoreError::Conflict(format!(
                "Account {} is archived",
                account.id
            )));
        }

        let txn = Transaction {
            id: Uuid::new_v4(),
            team_id,
            account_id: new.account_id,
            entry_type: new.entry_type,
            amount: new.amount,
            currency: new.currency.unwrap_or_else(|| default_currency.to_string()),
            category: new.category,
            description: new.description,
            counterparty: new.counterparty,
            date: new.date,
            due_date: new.due_date,
            settled_at: None,
            recurring_id: new.recurring_id,
            deleted: false,
            created_at: Utc::now(),
        };

        let conn = self.lock();
        conn.execute(
            "INSERT INTO transactions
             (id, team_id, account_id, entry_type, amount, currency, category, description,
              counterparty, date, due_date, settled_at, recurring_id, deleted, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, NULL, ?12, 0, ?13)",
            params![
                txn.id.to_string(),
                txn.team_id.to_string(),
                txn.account_id.to_string(),
                txn.entry_type.to_string(),
                txn.amount.to_string(),
                txn.currency,
                txn.category,
                txn.description,
                txn.counterparty,
                format_date(txn.date),
                txn.due_date.map(format_date),
                txn.recurring_id.map(|id| id.to_string()),
                format_datetime(txn.created_at),
            ],
        )?;
        Ok(txn)
    }

    pub fn transaction_by_id(&self, team_id: Uuid, id: Uuid) -> StoreResult<Transaction> {
        let conn = self.lock();
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {} FROM transactions WHERE id = ?1 AND team_id = ?2 AND deleted = 0",
                    TXN_COLS
                ),
                params![id.to_string(), team_id.to_string()],
                row_to_txn,
            )
            .optional()?;
        match raw {
            Some(raw) => build_txn(raw),
            None => Err(StoreError::NotFound(format!("Transaction {}", id))),
        }
    }

    /// List transactions for a team, newest first, with optional filters
    pub fn list_transactions(
        &self,
        team_id: Uuid,
        filter: &TransactionFilter,
    ) -> StoreResult<Vec<Transaction>> {
        let mut sql = format!(
            "SELECT {} FROM transactions WHERE team_id = ?1 AND deleted = 0",
            TXN_COLS
        );
        let mut bind: Vec<Value> = vec![Value::Text(team_id.to_string())];

        if let Some(account_id) = filter.account_id {
            bind.push(Value::Text(account_id.to_string()));
            sql.push_str(&format!(" AND account_id = ?{}", bind.len()));
        }
        if let Some(category) = &filter.category {
            bind.push(Value::Text(category.clone()));
            sql.push_str(&format!(" AND category = ?{}", bind.len()));
        }
        if let Some(from) = filter.from {
            bind.push(Value::Text(format_date(from)));
            sql.push_str(&format!(" AND date >= ?{}", bind.len()));
        }
        if let Some(to) = filter.to {
            bind.push(Value::Text(format_date(to)));
            sql.push_str(&format!(" AND date <= ?{}", bind.len()));
        }
        if filter.unsettled_only {
            sql.push_str(" AND due_date IS NOT NULL AND settled_at IS NULL");
        }
        sql.push_str(" ORDER BY date DESC, created_at DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
            if let Some(offset) = filter.offset {
                sql.push_str(&format!(" OFFSET {}", offset));
            }
        }

        let conn = self.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(bind), row_to_txn)?;
        let mut txns = Vec::new();
        for raw in rows {
            txns.push(build_txn(raw?)?);
        }
        Ok(txns)
    }

    /// Mark an invoice as settled. Settling twice is a conflict.
    pub fn settle_transaction(&self, team_id: Uuid, id: Uuid) -> StoreResult<Transaction> {
        let txn = self.transaction_by_id(team_id, id)?;
        if txn.due_date.is_none() {
            return Err(StoreError::Conflict(format!(
                "Transaction {} has no due date",
                id
            )));
        }
        if txn.settled_at.is_some() {
            return Err(StoreError::Conflict(format!(
                "Transaction {} is already settled",
                id
            )));
        }
        {
            let conn = self.lock();
            conn.execute(
                "UPDATE transactions SET settled_at = ?1 WHERE id = ?2",
                params![format_datetime(Utc::now()), id.to_string()],
            )?;
        }
        self.transaction_by_id(team_id, id)
    }

    /// Soft delete; the row stays for the audit trail
    pub fn delete_transaction(&self, team_id: Uuid, id: Uuid) -> StoreResult<()> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE transactions SET deleted = 1 WHERE id = ?1 AND team_id = ?2 AND deleted = 0",
            params![id.to_string(), team_id.to_string()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("Transaction {}", id)));
        }
        Ok(())
    }

    /// All unsettled rows with a due date, oldest due first
    pub fn open_invoices(&self, team_id: Uuid) -> StoreResult<Vec<Transaction>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions
             WHERE team_id = ?1 AND deleted = 0
               AND due_date IS NOT NULL AND settled_at IS NULL
             ORDER BY due_date",
            TXN_COLS
        ))?;
        let rows = stmt.query_map(params![team_id.to_string()], row_to_txn)?;
        let mut txns = Vec::new();
        for raw in rows {
            txns.push(build_txn(raw?)?);
        }
        Ok(txns)
    }

    /// Income and expense totals grouped by calendar month (`YYYY-MM`),
    /// ascending. Feeds both reports and the forecast engine.
    pub fn monthly_net_flows(&self, team_id: Uuid) -> StoreResult<Vec<MonthlyFlow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT substr(date, 1, 7) AS month, entry_type, amount
             FROM transactions
             WHERE team_id = ?1 AND deleted = 0
             ORDER BY month",
        )?;
        let rows = stmt.query_map(params![team_id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut flows: Vec<MonthlyFlow> = Vec::new();
        for raw in rows {
            let (month, entry_type, amount) = raw?;
            let amount = parse_decimal(amount)?;
            if flows.last().map(|f| f.month.as_str()) != Some(month.as_str()) {
                flows.push(MonthlyFlow {
                    month,
                    income: Default::default(),
                    expense: Default::default(),
                });
            }
            let flow = flows.last_mut().ok_or_else(|| {
                StoreError::Conflict("Empty flow aggregation".to_string())
            })?;
            match entry_type.as_str() {
                "income" => flow.income += amount,
                _ => flow.expense += amount,
            }
        }
        Ok(flows)
    }
}

// ==================== Tests ====================
