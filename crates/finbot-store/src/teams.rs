//! Team and membership queries

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{Role, Team, TeamMember};
use crate::{format_datetime, parse_datetime, parse_enum, parse_uuid, Database};

fn row_to_team(row: &Row) -> rusqlite::Result<(String, String, String, String, String)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn build_team(raw: (String, String, String, String, String)) -> StoreResult<Team> {
    Ok(Team {
        id: parse_uuid(raw.0)?,
        name: raw.1,
        owner_id: parse_uuid(raw.2)?,
        default_currency: raw.3,
        created_at: parse_datetime(raw.4)?,
    })
}

impl Database {
    /// Create a team and enroll the owner as its first member
    pub fn create_team(
        &self,
        name: &str,
        owner_id: Uuid,
        default_currency: &str,
    ) -> StoreResult<Team> {
        let team = Team {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner_id,
            default_currency: default_currency.to_string(),
            created_at: Utc::now(),
        };

        let mut guard = self.lock();
        let tx = guard.transaction()?;
        tx.execute(
            "INSERT INTO teams (id, name, owner_id, default_currency, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                team.id.to_string(),
                team.name,
                team.owner_id.to_string(),
                team.default_currency,
                format_datetime(team.created_at),
            ],
        )?;
        tx.execute(
            "INSERT INTO team_members (team_id, user_id, role, joined_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                team.id.to_string(),
                owner_id.to_string(),
                Role::Owner.to_string(),
                format_datetime(team.created_at),
            ],
        )?;
        tx.commit()?;
        Ok(team)
    }

    pub fn team_by_id(&self, id: Uuid) -> StoreResult<Team> {
        let conn = self.lock();
        let raw = conn
            .query_row(
                "SELECT id, name, owner_id, default_currency, created_at
                 FROM teams WHERE id = ?1",
                params![id.to_string()],
                row_to_team,
            )
            .optional()?;
        match raw {
            Some(raw) => build_team(raw),
            None => Err(StoreError::NotFound(format!("Team {}", id))),
        }
    }

    /// All teams the user belongs to
    pub fn teams_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Team>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT t.id, t.name, t.owner_id, t.default_currency, t.created_at
             FROM teams t
             JOIN team_members m ON m.team_id = t.id
             WHERE m.user_id = ?1
             ORDER BY t.created_at",
        )?;
        let rows = stmt.query_map(params![user_id.to_string()], row_to_team)?;
        let mut teams = Vec::new();
        for raw in rows {
            teams.push(build_team(raw?)?);
        }
        Ok(teams)
    }

    /// The user's role within a team, if any
    pub fn membership(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<Option<Role>> {
        let conn = self.lock();
        let role: Option<String> = conn
            .query_row(
                "SELECT role FROM team_members WHERE team_id = ?1 AND user_id = ?2",
                params![team_id.to_string(), user_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        role.map(parse_enum::<Role>).transpose()
    }

    pub fn team_members(&self, team_id: Uuid) -> StoreResult<Vec<TeamMember>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT team_id, user_id, role, joined_at FROM team_members
             WHERE team_id = ?1 ORDER BY joined_at",
        )?;
        let rows = stmt.query_map(params![team_id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        let mut members = Vec::new();
        for raw in rows {
            let raw = raw?;
            members.push(TeamMember {
                team_id: parse_uuid(raw.0)?,
                user_id: parse_uuid(raw.1)?,
                role: parse_enum(raw.2)?,
                joined_at: parse_datetime(raw.3)?,
            });
        }
        Ok(members)
    }

    pub fn add_team_member(&self, team_id: Uuid, user_id: Uuid, role: Role) -> StoreResult<()> {
        let conn = self.lock();
        let result = conn.execute(
            "INSERT INTO team_members (team_id, user_id, role, joined_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                team_id.to_string(),
                user_id.to_string(),
                role.to_string(),
                format_datetime(Utc::now()),
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::Conflict("Already a member".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a member. The owner cannot be removed.
    pub fn remove_team_member(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<()> {
        let team = self.team_by_id(team_id)?;
        if team.owner_id == user_id {
            return Err(StoreError::Conflict(
                "The team owner cannot be removed".to_string(),
            ));
        }
        let conn = self.lock();
        let removed = conn.execute(
            "DELETE FROM team_members WHERE team_id = ?1 AND user_id = ?2",
            params![team_id.to_string(), user_id.to_string()],
        )?;
        if removed == 0 {
            return Err(StoreError::NotFound(format!(
                "Member {} of team {}",
                user_id, team_id
            )));
        }
        Ok(())
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;

    fn setup() -> (Database, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let user = db
            .create_user(NewUser {
                email: "owner@example.com".to_string(),
                display_name: "Owner".to_string(),
                password_hash: "h".to_string(),
                password_salt: "s".to_string(),
            })
            .unwrap();
        (db, user.id)
    }

    #[test]
    fn test_create_team_enrolls_owner() {
        let (db, owner) = setup();
        let team = db.create_team("Acme", owner, "TRY").unwrap();

        assert_eq!(db.membership(team.id, owner).unwrap(), Some(Role::Owner));
        assert_eq!(db.teams_for_user(owner).unwrap().len(), 1);
    }

    #[test]
    fn test_membership_and_removal() {
        let (db, owner) = setup();
        let team = db.create_team("Acme", owner, "TRY").unwrap();
        let member = db
            .create_user(NewUser {
                email: "m@example.com".to_string(),
                display_name: "M".to_string(),
                password_hash: "h".to_string(),
                password_salt: "s".to_string(),
            })
            .unwrap();

        db.add_team_member(team.id, member.id, Role::Member).unwrap();
        assert_eq!(db.team_members(team.id).unwrap().len(), 2);

        db.remove_team_member(team.id, member.id).unwrap();
        assert!(db.membership(team.id, member.id).unwrap().is_none());
    }

    #[test]
    fn test_owner_cannot_be_removed() {
        let (db, owner) = setup();
        let team = db.create_team("Acme", owner, "TRY").unwrap();
        let err = db.remove_team_member(team.id, owner).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_duplicate_member_conflicts() {
        let (db, owner) = setup();
        let team = db.create_team("Acme", owner, "TRY").unwrap();
        let err = db.add_team_member(team.id, owner, Role::Admin).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }
}
