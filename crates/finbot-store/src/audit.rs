//! Audit trail

use chrono::Utc;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::AuditLog;
use crate::{format_datetime, parse_datetime, parse_uuid, Database};

/// Insert an audit row on an existing connection, so callers can put
/// it inside the same transaction as the mutation it records.
pub(crate) fn insert_audit_row(
    conn: &Connection,
    team_id: Uuid,
    actor_id: Uuid,
    action: &str,
    entity: &str,
    entity_id: Uuid,
    details: &serde_json::Value,
) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO audit_logs (id, team_id, actor_id, action, entity, entity_id, details, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            Uuid::new_v4().to_string(),
            team_id.to_string(),
            actor_id.to_string(),
            action,
            entity,
            entity_id.to_string(),
            details.to_string(),
            format_datetime(Utc::now()),
        ],
    )?;
    Ok(())
}

type AuditRaw = (String, String, String, String, String, String, String, String);

fn row_to_audit(row: &Row) -> rusqlite::Result<AuditRaw> {
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

impl Database {
    /// Record a standalone audit event outside any transaction
    pub fn record_audit(
        &self,
        team_id: Uuid,
        actor_id: Uuid,
        action: &str,
        entity: &str,
        entity_id: Uuid,
        details: serde_json::Value,
    ) -> StoreResult<()> {
        let conn = self.lock();
        insert_audit_row(&conn, team_id, actor_id, action, entity, entity_id, &details)
    }

    /// Newest audit rows first, capped at `limit`
    pub fn list_audit_logs(&self, team_id: Uuid, limit: usize) -> StoreResult<Vec<AuditLog>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, team_id, actor_id, action, entity, entity_id, details, created_at
             FROM audit_logs WHERE team_id = ?1
             ORDER BY created_at DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![team_id.to_string(), limit as i64], row_to_audit)?;
        let mut logs = Vec::new();
        for raw in rows {
            let raw = raw?;
            logs.push(AuditLog {
                id: parse_uuid(raw.0)?,
                team_id: parse_uuid(raw.1)?,
                actor_id: parse_uuid(raw.2)?,
                action: raw.3,
                entity: raw.4,
                entity_id: parse_uuid(raw.5)?,
                details: serde_json::from_str(&raw.6)?,
                created_at: parse_datetime(raw.7)?,
            });
        }
        Ok(logs)
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;
    use serde_json::json;

    #[test]
    fn test_record_and_list() {
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

        let entity = Uuid::new_v4();
        db.record_audit(team.id, user.id, "account.create", "account", entity, json!({"name": "Main"}))
            .unwrap();

        let logs = db.list_audit_logs(team.id, 10).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, "account.create");
        assert_eq!(logs[0].entity_id, entity);
        assert_eq!(logs[0].details["name"], "Main");
    }
}
