//! Cashbox ledger
//!
//! Balance mutations run inside a single SQLite transaction that
//! updates the box balance, appends the ledger entry with the balance
//! at commit time, and writes the audit row. A failed withdrawal or
//! transfer leaves nothing behind.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use crate::audit::insert_audit_row;
use crate::error::{StoreError, StoreResult};
use crate::models::{Cashbox, CashboxEntry, CashboxEntryType, NewCashbox};
use crate::{format_datetime, parse_datetime, parse_decimal, parse_enum, parse_uuid, parse_uuid_opt, Database};

type CashboxRaw = (String, String, String, String, String, bool, String, String);

fn row_to_cashbox(row: &Row) -> rusqlite::Result<CashboxRaw> {
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

fn build_cashbox(raw: CashboxRaw) -> StoreResult<Cashbox> {
    Ok(Cashbox {
        id: parse_uuid(raw.0)?,
        team_id: parse_uuid(raw.1)?,
        name: raw.2,
        currency: raw.3,
        balance: parse_decimal(raw.4)?,
        archived: raw.5,
        created_at: parse_datetime(raw.6)?,
        updated_at: parse_datetime(raw.7)?,
    })
}

const CASHBOX_COLS: &str =
    "id, team_id, name, currency, balance, archived, created_at, updated_at";

type EntryRaw = (
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    String,
    String,
);

fn row_to_entry(row: &Row) -> rusqlite::Result<EntryRaw> {
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

fn build_entry(raw: EntryRaw) -> StoreResult<CashboxEntry> {
    Ok(CashboxEntry {
        id: parse_uuid(raw.0)?,
        cashbox_id: parse_uuid(raw.1)?,
        entry_type: parse_enum(raw.2)?,
        amount: parse_decimal(raw.3)?,
        balance_after: parse_decimal(raw.4)?,
        note: raw.5,
        counterpart_id: parse_uuid_opt(raw.6)?,
        created_by: parse_uuid(raw.7)?,
        created_at: parse_datetime(raw.8)?,
    })
}

/// Fetch a box inside a transaction, scoped to the team
fn fetch_cashbox(conn: &Connection, team_id: Uuid, id: Uuid) -> StoreResult<Cashbox> {
    let raw = conn
        .query_row(
            &format!(
                "SELECT {} FROM cashboxes WHERE id = ?1 AND team_id = ?2",
                CASHBOX_COLS
            ),
            params![id.to_string(), team_id.to_string()],
            row_to_cashbox,
        )
        .optional()?;
    match raw {
        Some(raw) => build_cashbox(raw),
        None => Err(StoreError::NotFound(format!("Cashbox {}", id))),
    }
}

/// Apply one balance delta and append the matching ledger entry.
/// Withdrawal-side deltas are rejected when they would go negative.
fn apply_movement(
    conn: &Connection,
    cashbox: &Cashbox,
    entry_type: CashboxEntryType,
    amount: Decimal,
    note: Option<&str>,
    counterpart_id: Option<Uuid>,
    actor_id: Uuid,
) -> StoreResult<CashboxEntry> {
    let outgoing = matches!(
        entry_type,
        CashboxEntryType::Withdrawal | CashboxEntryType::TransferOut
    );
    let balance_after = if outgoing {
        if cashbox.balance < amount {
            return Err(StoreError::InsufficientFunds {
                available: cashbox.balance,
                requested: amount,
            });
        }
        cashbox.balance - amount
    } else {
        cashbox.balance + amount
    };

    let now = Utc::now();
    conn.execute(
        "UPDATE cashboxes SET balance = ?1, updated_at = ?2 WHERE id = ?3",
        params![
            balance_after.to_string(),
            format_datetime(now),
            cashbox.id.to_string()
        ],
    )?;

    let entry = CashboxEntry {
        id: Uuid::new_v4(),
        cashbox_id: cashbox.id,
        entry_type,
        amount,
        balance_after,
        note: note.map(str::to_string),
        counterpart_id,
        created_by: actor_id,
        created_at: now,
    };
    conn.execute(
        "INSERT INTO cashbox_entries
         (id, cashbox_id, entry_type, amount, balance_after, note, counterpart_id, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            entry.id.to_string(),
            entry.cashbox_id.to_string(),
            entry.entry_type.to_string(),
            entry.amount.to_string(),
            entry.balance_after.to_string(),
            entry.note,
            entry.counterpart_id.map(|id| id.to_string()),
            entry.created_by.to_string(),
            format_datetime(entry.created_at),
        ],
    )?;
    Ok(entry)
}

impl Database {
    pub fn create_cashbox(
        &self,
        team_id: Uuid,
        new: NewCashbox,
        default_currency: &str,
    ) -> StoreResult<Cashbox> {
        let opening = new.opening_balance.unwrap_or_default();
        if opening < Decimal::ZERO {
            return Err(StoreError::Conflict(
                "Opening balance cannot be negative".to_string(),
            ));
        }
        let now = Utc::now();
        let cashbox = Cashbox {
            id: Uuid::new_v4(),
            team_id,
            name: new.name,
            currency: new.currency.unwrap_or_else(|| default_currency.to_string()),
            balance: opening,
            archived: false,
            created_at: now,
            updated_at: now,
        };

        let conn = self.lock();
        conn.execute(
            "INSERT INTO cashboxes (id, team_id, name, currency, balance, archived, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)",
            params![
                cashbox.id.to_string(),
                cashbox.team_id.to_string(),
                cashbox.name,
                cashbox.currency,
                cashbox.balance.to_string(),
                format_datetime(now),
            ],
        )?;
        Ok(cashbox)
    }

    pub fn cashbox_by_id(&self, team_id: Uuid, id: Uuid) -> StoreResult<Cashbox> {
        let conn = self.lock();
        fetch_cashbox(&conn, team_id, id)
    }

    pub fn list_cashboxes(&self, team_id: Uuid, include_archived: bool) -> StoreResult<Vec<Cashbox>> {
        let conn = self.lock();
        let sql = if include_archived {
            format!(
                "SELECT {} FROM cashboxes WHERE team_id = ?1 ORDER BY created_at",
                CASHBOX_COLS
            )
        } else {
            format!(
                "SELECT {} FROM cashboxes WHERE team_id = ?1 AND archived = 0 ORDER BY created_at",
                CASHBOX_COLS
            )
        };
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![team_id.to_string()], row_to_cashbox)?;
        let mut boxes = Vec::new();
        for raw in rows {
            boxes.push(build_cashbox(raw?)?);
        }
        Ok(boxes)
    }

    /// Archiving requires a zero balance so no money disappears
    pub fn archive_cashbox(&self, team_id: Uuid, id: Uuid) -> StoreResult<()> {
        let conn = self.lock();
        let cashbox = fetch_cashbox(&conn, team_id, id)?;
        if cashbox.balance != Decimal::ZERO {
            return Err(StoreError::Conflict(format!(
                "Cashbox {} still holds {}",
                id, cashbox.balance
            )));
        }
        conn.execute(
            "UPDATE cashboxes SET archived = 1, updated_at = ?1 WHERE id = ?2",
            params![format_datetime(Utc::now()), id.to_string()],
        )?;
        Ok(())
    }

    pub fn cashbox_deposit(
        &self,
        team_id: Uuid,
        id: Uuid,
        amount: Decimal,
        note: Option<&str>,
        actor_id: Uuid,
    ) -> StoreResult<CashboxEntry> {
        let mut guard = self.lock();
        let tx = guard.transaction()?;
        let cashbox = fetch_cashbox(&tx, team_id, id)?;
        let entry = apply_movement(
            &tx,
            &cashbox,
            CashboxEntryType::Deposit,
            amount,
            note,
            None,
            actor_id,
        )?;
        insert_audit_row(
            &tx,
            team_id,
            actor_id,
            "cashbox.deposit",
            "cashbox",
            id,
            &json!({ "amount": amount.to_string(), "balance_after": entry.balance_after.to_string() }),
        )?;
        tx.commit()?;
        Ok(entry)
    }

    pub fn cashbox_withdraw(
        &self,
        team_id: Uuid,
        id: Uuid,
        amount: Decimal,
        note: Option<&str>,
        actor_id: Uuid,
    ) -> StoreResult<CashboxEntry> {
        let mut guard = self.lock();
        let tx = guard.transaction()?;
        let cashbox = fetch_cashbox(&tx, team_id, id)?;
        let entry = apply_movement(
            &tx,
            &cashbox,
            CashboxEntryType::Withdrawal,
            amount,
            note,
            None,
            actor_id,
        )?;
        insert_audit_row(
            &tx,
            team_id,
            actor_id,
            "cashbox.withdraw",
            "cashbox",
            id,
            &json!({ "amount": amount.to_string(), "balance_after": entry.balance_after.to_string() }),
        )?;
        tx.commit()?;
        Ok(entry)
    }

    /// Move funds between two boxes of the same team. Both legs commit
    /// or neither does.
    pub fn cashbox_transfer(
        &self,
        team_id: Uuid,
        from_id: Uuid,
        to_id: Uuid,
        amount: Decimal,
        note: Option<&str>,
        actor_id: Uuid,
    ) -> StoreResult<(CashboxEntry, CashboxEntry)> {
        if from_id == to_id {
            return Err(StoreError::Conflict(
                "Cannot transfer a cashbox into itself".to_string(),
            ));
        }
        let mut guard = self.lock();
        let tx = guard.transaction()?;

        let from = fetch_cashbox(&tx, team_id, from_id)?;
        let to = fetch_cashbox(&tx, team_id, to_id)?;
        if from.currency != to.currency {
            return Err(StoreError::Conflict(format!(
                "Currency mismatch: {} vs {}",
                from.currency, to.currency
            )));
        }

        let out_entry = apply_movement(
            &tx,
            &from,
            CashboxEntryType::TransferOut,
            amount,
            note,
            None,
            actor_id,
        )?;
        let in_entry = apply_movement(
            &tx,
            &to,
            CashboxEntryType::TransferIn,
            amount,
            note,
            Some(out_entry.id),
            actor_id,
        )?;
        tx.execute(
            "UPDATE cashbox_entries SET counterpart_id = ?1 WHERE id = ?2",
            params![in_entry.id.to_string(), out_entry.id.to_string()],
        )?;
        insert_audit_row(
            &tx,
            team_id,
            actor_id,
            "cashbox.transfer",
            "cashbox",
            from_id,
            &json!({
                "to": to_id.to_string(),
                "amount": amount.to_string(),
            }),
        )?;
        tx.commit()?;

        let out_entry = CashboxEntry {
            counterpart_id: Some(in_entry.id),
            ..out_entry
        };
        Ok((out_entry, in_entry))
    }

    /// Ledger history for one box, newest first
    pub fn cashbox_history(
        &self,
        team_id: Uuid,
        id: Uuid,
        limit: usize,
    ) -> StoreResult<Vec<CashboxEntry>> {
        let conn = self.lock();
        fetch_cashbox(&conn, team_id, id)?;
        let mut stmt = conn.prepare(
            "SELECT id, cashbox_id, entry_type, amount, balance_after, note, counterpart_id,
                    created_by, created_at
             FROM cashbox_entries WHERE cashbox_id = ?1
             ORDER BY created_at DESC, id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![id.to_string(), limit as i64], row_to_entry)?;
        let mut entries = Vec::new();
        for raw in rows {
            entries.push(build_entry(raw?)?);
        }
        Ok(entries)
    }
}

// ==================== Tests ====================
