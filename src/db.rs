use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Event for the audit trail: every write to the store leaves one behind
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

/// Open (or create) the database file and make sure the schema exists
pub fn open_database(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {:?}", db_path))?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery (in-memory databases report "memory")
    let _: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Groups
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS groups (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            total_chit_amount REAL NOT NULL,
            emi_amount REAL NOT NULL DEFAULT 0,
            max_members INTEGER NOT NULL,
            members_count INTEGER NOT NULL DEFAULT 0,
            vacancies INTEGER NOT NULL DEFAULT 0,
            description TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Members (bc_history is a JSON array)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS members (
            id TEXT PRIMARY KEY,
            group_id TEXT NOT NULL,
            name TEXT NOT NULL,
            phone TEXT NOT NULL,
            email TEXT NOT NULL DEFAULT '',
            address TEXT NOT NULL DEFAULT '',
            bc_holder TEXT NOT NULL,
            bc_history TEXT NOT NULL DEFAULT '[]',
            join_date TEXT NOT NULL,
            end_date TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            is_prized INTEGER NOT NULL DEFAULT 0,
            emi_paid_count INTEGER NOT NULL DEFAULT 0,
            pending_amount REAL NOT NULL DEFAULT 0 CHECK (pending_amount >= 0),
            manual_pending_override INTEGER NOT NULL DEFAULT 0,
            import_key TEXT UNIQUE,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Payments
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS payments (
            id TEXT PRIMARY KEY,
            group_id TEXT NOT NULL,
            member_id TEXT NOT NULL,
            amount REAL NOT NULL,
            emi_no INTEGER NOT NULL,
            paid_by TEXT NOT NULL,
            payment_type TEXT NOT NULL,
            payment_date TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Auctions
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS auctions (
            id TEXT PRIMARY KEY,
            sr_no INTEGER NOT NULL,
            group_no TEXT NOT NULL,
            ticket_no TEXT NOT NULL,
            customer_name TEXT NOT NULL,
            mobile_no TEXT NOT NULL,
            appui_date TEXT NOT NULL,
            inst_ongoing INTEGER NOT NULL,
            status TEXT NOT NULL,
            previous_arrear REAL NOT NULL,
            current_amount REAL NOT NULL,
            cum_share REAL NOT NULL,
            to_be_collected REAL NOT NULL,
            unclaimed_amt REAL NOT NULL,
            agent_code TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Expense ledger (business / personal scopes)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS ledger_entries (
            id TEXT PRIMARY KEY,
            scope TEXT NOT NULL,
            direction TEXT NOT NULL,
            amount REAL NOT NULL CHECK (amount > 0),
            bc_holder TEXT,
            description TEXT NOT NULL DEFAULT '',
            entry_date TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Scheduled reminders (recorded only, never delivered)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS reminders (
            id TEXT PRIMARY KEY,
            member_id TEXT NOT NULL,
            channel TEXT NOT NULL,
            message TEXT NOT NULL,
            schedule_date TEXT NOT NULL,
            schedule_time TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_members_group ON members(group_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_payments_member ON payments(member_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_auctions_group ON auctions(group_no)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_ledger_scope ON ledger_entries(scope)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp)",
        [],
    )?;

    Ok(())
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> rusqlite::Result<()> {
    let data_json = event.data.to_string();

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Append to the audit trail. A failed audit write never fails the caller.
pub fn record_event(
    conn: &Connection,
    event_type: &str,
    entity_type: &str,
    entity_id: &str,
    data: serde_json::Value,
) {
    let event = Event::new(event_type, entity_type, entity_id, data, "api");
    if let Err(e) = insert_event(conn, &event) {
        tracing::warn!(event_type, entity_id, error = %e, "failed to record audit event");
    }
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> rusqlite::Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: parse_timestamp(1, &timestamp_str)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

/// Row counts per table, for the CLI status line
pub fn table_count(conn: &Connection, table: &str) -> rusqlite::Result<i64> {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
}

// ============================================================================
// Column conversion helpers
// ============================================================================

pub(crate) fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

pub(crate) fn parse_date(idx: usize, value: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub(crate) fn date_to_sql(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
pub(crate) fn test_connection() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    setup_database(&conn).unwrap();
    conn
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        setup_database(&conn).unwrap();

        for table in ["groups", "members", "payments", "auctions", "ledger_entries", "reminders", "events"] {
            assert_eq!(table_count(&conn, table).unwrap(), 0, "{} should start empty", table);
        }
    }

    #[test]
    fn test_event_log() {
        let conn = test_connection();

        let event = Event::new(
            "group_created",
            "group",
            "test_id_123",
            serde_json::json!({"name": "ATL G1"}),
            "test_actor",
        );

        insert_event(&conn, &event).unwrap();

        let events = get_events_for_entity(&conn, "group", "test_id_123").unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "group_created");
        assert_eq!(events[0].actor, "test_actor");
        assert_eq!(events[0].data["name"], "ATL G1");
    }

    #[test]
    fn test_record_event_uses_api_actor() {
        let conn = test_connection();
        record_event(&conn, "member_deleted", "member", "m-1", serde_json::json!({}));

        let events = get_events_for_entity(&conn, "member", "m-1").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].actor, "api");
    }

    #[test]
    fn test_pending_amount_check_constraint() {
        let conn = test_connection();
        let result = conn.execute(
            "INSERT INTO members (id, group_id, name, phone, bc_holder, join_date, pending_amount, created_at, updated_at)
             VALUES ('m', 'g', 'n', 'p', 'b', '2026-01-01', -1, 'x', 'x')",
            [],
        );
        assert!(result.is_err());
    }
}
