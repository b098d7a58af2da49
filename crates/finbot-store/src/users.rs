//! User and session queries

use chrono::{Duration, Utc};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{NewUser, Session, User};
use crate::{format_datetime, parse_datetime, parse_uuid, Database};

fn row_to_user(row: &Row) -> rusqlite::Result<(String, String, String, String, String, String)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn build_user(raw: (String, String, String, String, String, String)) -> StoreResult<User> {
    Ok(User {
        id: parse_uuid(raw.0)?,
        email: raw.1,
        display_name: raw.2,
        password_hash: raw.3,
        password_salt: raw.4,
        created_at: parse_datetime(raw.5)?,
    })
}

const USER_COLS: &str = "id, email, display_name, password_hash, password_salt, created_at";

impl Database {
    pub fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let user = User {
            id: Uuid::new_v4(),
            email: new.email.trim().to_lowercase(),
            display_name: new.display_name,
            password_hash: new.password_hash,
            password_salt: new.password_salt,
            created_at: Utc::now(),
        };

        let conn = self.lock();
        let result = conn.execute(
            "INSERT INTO users (id, email, display_name, password_hash, password_salt, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.id.to_string(),
                user.email,
                user.display_name,
                user.password_hash,
                user.password_salt,
                format_datetime(user.created_at),
            ],
        );

        match result {
            Ok(_) => Ok(user),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::Conflict(format!(
                    "Email already registered: {}",
                    user.email
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let conn = self.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE email = ?1", USER_COLS),
                params![email.trim().to_lowercase()],
                row_to_user,
            )
            .optional()?;
        raw.map(build_user).transpose()
    }

    pub fn user_by_id(&self, id: Uuid) -> StoreResult<User> {
        let conn = self.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
                params![id.to_string()],
                row_to_user,
            )
            .optional()?;
        match raw {
            Some(raw) => build_user(raw),
            None => Err(StoreError::NotFound(format!("User {}", id))),
        }
    }

    // ==================== Sessions ====================

    pub fn create_session(&self, user_id: Uuid, ttl_hours: i64) -> StoreResult<Session> {
        let now = Utc::now();
        let session = Session {
            token: Uuid::new_v4(),
            user_id,
            created_at: now,
            expires_at: now + Duration::hours(ttl_hours),
        };

        let conn = self.lock();
        conn.execute(
            "INSERT INTO sessions (token, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                session.token.to_string(),
                session.user_id.to_string(),
                format_datetime(session.created_at),
                format_datetime(session.expires_at),
            ],
        )?;
        Ok(session)
    }

    /// Look up a live session. Expired tokens are treated as absent.
    pub fn session_by_token(&self, token: Uuid) -> StoreResult<Option<Session>> {
        let conn = self.lock();
        let raw: Option<(String, String, String, String)> = conn
            .query_row(
                "SELECT token, user_id, created_at, expires_at FROM sessions WHERE token = ?1",
                params![token.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        let session = Session {
            token: parse_uuid(raw.0)?,
            user_id: parse_uuid(raw.1)?,
            created_at: parse_datetime(raw.2)?,
            expires_at: parse_datetime(raw.3)?,
        };
        if session.expires_at <= Utc::now() {
            return Ok(None);
        }
        Ok(Some(session))
    }

    pub fn delete_session(&self, token: Uuid) -> StoreResult<()> {
        let conn = self.lock();
        conn.execute(
            "DELETE FROM sessions WHERE token = ?1",
            params![token.to_string()],
        )?;
        Ok(())
    }

    /// Drop all expired sessions, returning how many were removed
    pub fn purge_expired_sessions(&self) -> StoreResult<usize> {
        let conn = self.lock();
        let removed = conn.execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            params![format_datetime(Utc::now())],
        )?;
        Ok(removed)
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            display_name: "Test User".to_string(),
            password_hash: "hash".to_string(),
            password_salt: "salt".to_string(),
        }
    }

    #[test]
    fn test_create_and_fetch_user() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user(test_user("a@example.com")).unwrap();

        let by_email = db.user_by_email("A@Example.COM").unwrap().unwrap();
        assert_eq!(by_email.id, user.id);

        let by_id = db.user_by_id(user.id).unwrap();
        assert_eq!(by_id.email, "a@example.com");
    }

    #[test]
    fn test_duplicate_email_conflicts() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(test_user("dup@example.com")).unwrap();
        let err = db.create_user(test_user("dup@example.com")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_session_lifecycle() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user(test_user("s@example.com")).unwrap();

        let session = db.create_session(user.id, 72).unwrap();
        let found = db.session_by_token(session.token).unwrap().unwrap();
        assert_eq!(found.user_id, user.id);

        db.delete_session(session.token).unwrap();
        assert!(db.session_by_token(session.token).unwrap().is_none());
    }

    #[test]
    fn test_expired_session_is_absent() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user(test_user("e@example.com")).unwrap();
        let session = db.create_session(user.id, -1).unwrap();
        assert!(db.session_by_token(session.token).unwrap().is_none());
        assert_eq!(db.purge_expired_sessions().unwrap(), 1);
    }
}
