// Savings group: the pool members contribute to

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::{parse_timestamp, record_event};
use crate::dues::group_figures;
use crate::entities::{new_id, now_rfc3339};
use crate::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
    pub total_chit_amount: f64,

    /// Per-period installment (EMI), derived from the pool and active members
    pub emi_amount: f64,
    pub max_members: i64,

    /// Active members only
    pub members_count: i64,
    pub vacancies: i64,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGroup {
    pub name: String,
    pub total_chit_amount: f64,
    pub max_members: i64,
    #[serde(default)]
    pub description: String,
}

impl NewGroup {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("Group name is required"));
        }
        if self.total_chit_amount < 0.0 {
            return Err(AppError::validation("Total chit amount cannot be negative"));
        }
        if self.max_members <= 0 {
            return Err(AppError::validation("Max members must be at least 1"));
        }
        Ok(())
    }
}

/// Partial update; absent fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupUpdate {
    pub name: Option<String>,
    pub total_chit_amount: Option<f64>,
    pub max_members: Option<i64>,
    pub description: Option<String>,
}

impl GroupUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.total_chit_amount.is_none()
            && self.max_members.is_none()
            && self.description.is_none()
    }
}

const GROUP_COLUMNS: &str = "id, name, total_chit_amount, emi_amount, max_members,
    members_count, vacancies, description, created_at";

fn group_from_row(row: &Row) -> rusqlite::Result<Group> {
    let created_at: String = row.get(8)?;

    Ok(Group {
        id: row.get(0)?,
        name: row.get(1)?,
        total_chit_amount: row.get(2)?,
        emi_amount: row.get(3)?,
        max_members: row.get(4)?,
        members_count: row.get(5)?,
        vacancies: row.get(6)?,
        description: row.get(7)?,
        created_at: parse_timestamp(8, &created_at)?,
    })
}

pub fn list_groups(conn: &Connection) -> Result<Vec<Group>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM groups ORDER BY created_at, rowid",
        GROUP_COLUMNS
    ))?;

    let groups = stmt
        .query_map([], group_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(groups)
}

pub fn find_group(conn: &Connection, id: &str) -> Result<Option<Group>> {
    let group = conn
        .query_row(
            &format!("SELECT {} FROM groups WHERE id = ?1", GROUP_COLUMNS),
            [id],
            group_from_row,
        )
        .optional()?;

    Ok(group)
}

pub fn get_group(conn: &Connection, id: &str) -> Result<Group> {
    find_group(conn, id)?.ok_or_else(|| AppError::not_found("Group"))
}

pub fn find_group_by_name(conn: &Connection, name: &str) -> Result<Option<Group>> {
    let group = conn
        .query_row(
            &format!("SELECT {} FROM groups WHERE name = ?1 ORDER BY rowid LIMIT 1", GROUP_COLUMNS),
            [name],
            group_from_row,
        )
        .optional()?;

    Ok(group)
}

pub fn create_group(conn: &Connection, new: &NewGroup) -> Result<Group> {
    new.validate()?;

    let id = new_id();
    conn.execute(
        "INSERT INTO groups (id, name, total_chit_amount, emi_amount, max_members,
            members_count, vacancies, description, created_at)
         VALUES (?1, ?2, ?3, 0, ?4, 0, ?4, ?5, ?6)",
        params![
            id,
            new.name.trim(),
            new.total_chit_amount,
            new.max_members,
            new.description,
            now_rfc3339(),
        ],
    )?;

    record_event(
        conn,
        "group_created",
        "group",
        &id,
        serde_json::json!({ "name": new.name, "totalChitAmount": new.total_chit_amount }),
    );
    tracing::info!(group_id = %id, name = %new.name, "group created");

    get_group(conn, &id)
}

pub fn update_group(conn: &Connection, id: &str, update: &GroupUpdate) -> Result<Group> {
    if update.is_empty() {
        return Err(AppError::validation("No fields to update"));
    }

    let current = get_group(conn, id)?;

    let name = update.name.clone().unwrap_or(current.name);
    if name.trim().is_empty() {
        return Err(AppError::validation("Group name is required"));
    }
    let total = update.total_chit_amount.unwrap_or(current.total_chit_amount);
    if total < 0.0 {
        return Err(AppError::validation("Total chit amount cannot be negative"));
    }
    let max_members = update.max_members.unwrap_or(current.max_members);
    if max_members <= 0 {
        return Err(AppError::validation("Max members must be at least 1"));
    }
    if max_members < current.members_count {
        return Err(AppError::validation(format!(
            "Max members cannot be below the current {} active members",
            current.members_count
        )));
    }
    let description = update.description.clone().unwrap_or(current.description);

    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "UPDATE groups
         SET name = ?1, total_chit_amount = ?2, max_members = ?3, description = ?4
         WHERE id = ?5",
        params![name.trim(), total, max_members, description, id],
    )?;

    // Derived figures depend on the pool and the seat limit
    recalc_group(&tx, id)?;

    tx.commit()?;

    record_event(conn, "group_updated", "group", id, serde_json::to_value(update)?);

    get_group(conn, id)
}

/// Delete a group together with all of its members
pub fn delete_group(conn: &Connection, id: &str) -> Result<()> {
    let tx = conn.unchecked_transaction()?;

    let deleted = tx.execute("DELETE FROM groups WHERE id = ?1", [id])?;
    if deleted == 0 {
        return Err(AppError::not_found("Group"));
    }
    let members_removed = tx.execute("DELETE FROM members WHERE group_id = ?1", [id])?;

    tx.commit()?;

    record_event(
        conn,
        "group_deleted",
        "group",
        id,
        serde_json::json!({ "membersRemoved": members_removed }),
    );
    tracing::info!(group_id = %id, members_removed, "group deleted");

    Ok(())
}

/// Recompute active member count, EMI and vacancies for a group.
/// Missing groups are ignored.
pub fn recalc_group(conn: &Connection, id: &str) -> Result<()> {
    let Some(group) = find_group(conn, id)? else {
        return Ok(());
    };

    let active: i64 = conn.query_row(
        "SELECT COUNT(*) FROM members WHERE group_id = ?1 AND status = 'active'",
        [id],
        |row| row.get(0),
    )?;

    let figures = group_figures(group.total_chit_amount, group.max_members, active);

    conn.execute(
        "UPDATE groups SET members_count = ?1, emi_amount = ?2, vacancies = ?3 WHERE id = ?4",
        params![figures.members_count, figures.emi_amount, figures.vacancies, id],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;

    fn sample(name: &str) -> NewGroup {
        NewGroup {
            name: name.to_string(),
            total_chit_amount: 500000.0,
            max_members: 25,
            description: "Premium chit fund group".to_string(),
        }
    }

    #[test]
    fn test_create_group_defaults() {
        let conn = test_connection();
        let group = create_group(&conn, &sample("ATL G1")).unwrap();

        assert_eq!(group.name, "ATL G1");
        assert_eq!(group.emi_amount, 0.0);
        assert_eq!(group.members_count, 0);
        assert_eq!(group.vacancies, 25);
        assert_eq!(list_groups(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_create_group_validation() {
        let conn = test_connection();
        let mut bad = sample(" ");
        assert!(matches!(create_group(&conn, &bad), Err(AppError::Validation(_))));

        bad = sample("ATL G2");
        bad.max_members = 0;
        assert!(matches!(create_group(&conn, &bad), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_update_requires_fields() {
        let conn = test_connection();
        let group = create_group(&conn, &sample("ATL G1")).unwrap();

        let err = update_group(&conn, &group.id, &GroupUpdate::default()).unwrap_err();
        assert_eq!(err.to_string(), "No fields to update");
    }

    #[test]
    fn test_update_missing_group() {
        let conn = test_connection();
        let update = GroupUpdate {
            name: Some("X".to_string()),
            ..Default::default()
        };
        assert!(matches!(update_group(&conn, "nope", &update), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_update_recomputes_vacancies() {
        let conn = test_connection();
        let group = create_group(&conn, &sample("ATL G1")).unwrap();

        let update = GroupUpdate {
            max_members: Some(20),
            ..Default::default()
        };
        let updated = update_group(&conn, &group.id, &update).unwrap();
        assert_eq!(updated.max_members, 20);
        assert_eq!(updated.vacancies, 20);
        assert_eq!(updated.name, "ATL G1");
    }

    #[test]
    fn test_update_rejects_zero_seats() {
        let conn = test_connection();
        let group = create_group(&conn, &sample("ATL G1")).unwrap();

        let update = GroupUpdate {
            name: Some("ATL G1 renamed".to_string()),
            max_members: Some(0),
            ..Default::default()
        };
        let err = update_group(&conn, &group.id, &update).unwrap_err();
        assert_eq!(err.to_string(), "Max members must be at least 1");

        let unchanged = get_group(&conn, &group.id).unwrap();
        assert_eq!(unchanged.name, "ATL G1");
        assert_eq!(unchanged.max_members, 25);
        assert!(unchanged.emi_amount.is_finite());
    }

    #[test]
    fn test_delete_group() {
        let conn = test_connection();
        let group = create_group(&conn, &sample("ATL G1")).unwrap();

        delete_group(&conn, &group.id).unwrap();
        assert!(find_group(&conn, &group.id).unwrap().is_none());
        assert!(matches!(delete_group(&conn, &group.id), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_find_by_name() {
        let conn = test_connection();
        create_group(&conn, &sample("ATL G1")).unwrap();
        let g2 = create_group(&conn, &sample("ATL G2")).unwrap();

        let found = find_group_by_name(&conn, "ATL G2").unwrap().unwrap();
        assert_eq!(found.id, g2.id);
        assert!(find_group_by_name(&conn, "ATL G9").unwrap().is_none());
    }
}
