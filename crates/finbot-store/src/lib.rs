//! SQLite persistence layer for finbot
//!
//! A thin wrapper around a shared rusqlite connection plus one module
//! per domain area. All multi-row mutations (cashbox transfers, credit
//! payments, recurring runs) happen inside a single SQLite transaction.

pub mod accounts;
pub mod audit;
pub mod cashboxes;
pub mod credits;
pub mod error;
pub mod forecasts;
pub mod investments;
pub mod models;
pub mod recurring;
pub mod schema;
pub mod teams;
pub mod transactions;
pub mod users;

use chrono::{DateTime, NaiveDate, Utc};
use log::info;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub use error::{StoreError, StoreResult};

/// Shared handle to the SQLite database
#[derive(Clone)]
pub struct Database {
    pub(crate) conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl Database {
    /// Open (or create) the database at the given path and apply the schema
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        };
        db.run_migrations()?;
        info!("Database opened at {}", db.path.display());
        Ok(db)
    }

    /// In-memory database for tests
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: PathBuf::from(":memory:"),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> StoreResult<()> {
        let conn = self.lock();
        conn.execute_batch(schema::SCHEMA)?;
        conn.execute_batch(schema::INDEXES)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock the shared connection. A poisoned lock still holds a valid
    /// connection, SQLite rolled back whatever the panicking writer left open.
    pub(crate) fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

// ==================== Column helpers ====================

pub(crate) fn parse_uuid(s: String) -> StoreResult<Uuid> {
    Uuid::parse_str(&s)
        .map_err(|e| StoreError::Conflict(format!("Invalid UUID in database: {}", e)))
}

pub(crate) fn parse_uuid_opt(s: Option<String>) -> StoreResult<Option<Uuid>> {
    match s {
        Some(s) => Ok(Some(parse_uuid(s)?)),
        None => Ok(None),
    }
}

pub(crate) fn parse_datetime(s: String) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Conflict(format!("Invalid timestamp in database: {}", e)))
}

pub(crate) fn parse_datetime_opt(s: Option<String>) -> StoreResult<Option<DateTime<Utc>>> {
    match s {
        Some(s) => Ok(Some(parse_datetime(s)?)),
        None => Ok(None),
    }
}

pub(crate) fn parse_date(s: String) -> StoreResult<NaiveDate> {
    NaiveDate::parse_from_str(&s, "%Y-%m-%d")
        .map_err(|e| StoreError::Conflict(format!("Invalid date in database: {}", e)))
}

pub(crate) fn parse_date_opt(s: Option<String>) -> StoreResult<Option<NaiveDate>> {
    match s {
        Some(s) => Ok(Some(parse_date(s)?)),
        None => Ok(None),
    }
}

pub(crate) fn parse_decimal(s: String) -> StoreResult<Decimal> {
    s.parse::<Decimal>()
        .map_err(|e| StoreError::Conflict(format!("Invalid decimal in database: {}", e)))
}

pub(crate) fn parse_enum<T: std::str::FromStr<Err = String>>(s: String) -> StoreResult<T> {
    s.parse::<T>().map_err(StoreError::Conflict)
}

pub(crate) fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

pub(crate) fn format_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_applies_schema() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(count >= 14);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().unwrap();
        db.run_migrations().unwrap();
    }

    #[test]
    fn test_parse_helpers_round_trip() {
        let now = Utc::now();
        let parsed = parse_datetime(format_datetime(now)).unwrap();
        assert_eq!(parsed, now);

        let date = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        assert_eq!(parse_date(format_date(date)).unwrap(), date);

        let dec = parse_decimal("123.45".to_string()).unwrap();
        assert_eq!(dec.to_string(), "123.45");
    }

    #[test]
    fn test_parse_helpers_reject_garbage() {
        assert!(parse_uuid("not-a-uuid".to_string()).is_err());
        assert!(parse_datetime("yesterday".to_string()).is_err());
        assert!(parse_date("31/01/2025".to_string()).is_err());
        assert!(parse_decimal("one hundred".to_string()).is_err());
    }
}
