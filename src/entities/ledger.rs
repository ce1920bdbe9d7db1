// Expense ledger: money received and sent, kept in two independent scopes

use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::{date_to_sql, parse_date, record_event};
use crate::entities::{flexible_date, new_id, now_rfc3339};
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerScope {
    Business,
    Personal,
}

impl LedgerScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerScope::Business => "business",
            LedgerScope::Personal => "personal",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "business" => Some(LedgerScope::Business),
            "personal" => Some(LedgerScope::Personal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Received,
    Sent,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Received => "received",
            Direction::Sent => "sent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "received" => Some(Direction::Received),
            "sent" => Some(Direction::Sent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: String,
    pub scope: LedgerScope,
    #[serde(rename = "type")]
    pub direction: Direction,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bc_holder: Option<String>,
    pub description: String,
    #[serde(with = "flexible_date")]
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLedgerEntry {
    #[serde(rename = "type")]
    pub direction: Direction,
    pub amount: f64,
    #[serde(default)]
    pub bc_holder: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(with = "flexible_date")]
    pub date: NaiveDate,
}

/// Running totals of one scope
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerTotals {
    pub total_received: f64,
    pub total_sent: f64,
    pub balance: f64,
}

impl LedgerTotals {
    pub fn from_entries(entries: &[LedgerEntry]) -> Self {
        let mut totals = LedgerTotals::default();
        for entry in entries {
            match entry.direction {
                Direction::Received => totals.total_received += entry.amount,
                Direction::Sent => totals.total_sent += entry.amount,
            }
        }
        totals.balance = totals.total_received - totals.total_sent;
        totals
    }
}

/// A scope's entries together with its totals, as the expenses view shows them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerView {
    pub scope: LedgerScope,
    #[serde(flatten)]
    pub totals: LedgerTotals,
    pub transactions: Vec<LedgerEntry>,
}

fn entry_from_row(row: &Row) -> rusqlite::Result<LedgerEntry> {
    let scope: String = row.get(1)?;
    let direction: String = row.get(2)?;
    let date: String = row.get(6)?;

    let bad_text = |idx: usize, value: &str| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unexpected value: {}", value).into(),
        )
    };

    Ok(LedgerEntry {
        id: row.get(0)?,
        scope: LedgerScope::parse(&scope).ok_or_else(|| bad_text(1, &scope))?,
        direction: Direction::parse(&direction).ok_or_else(|| bad_text(2, &direction))?,
        amount: row.get(3)?,
        bc_holder: row.get(4)?,
        description: row.get(5)?,
        date: parse_date(6, &date)?,
    })
}

pub fn list_entries(conn: &Connection, scope: LedgerScope) -> Result<Vec<LedgerEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, scope, direction, amount, bc_holder, description, entry_date
         FROM ledger_entries
         WHERE scope = ?1
         ORDER BY entry_date, created_at, rowid",
    )?;

    let entries = stmt
        .query_map([scope.as_str()], entry_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(entries)
}

pub fn ledger_view(conn: &Connection, scope: LedgerScope) -> Result<LedgerView> {
    let transactions = list_entries(conn, scope)?;
    Ok(LedgerView {
        scope,
        totals: LedgerTotals::from_entries(&transactions),
        transactions,
    })
}

pub fn create_entry(conn: &Connection, scope: LedgerScope, new: &NewLedgerEntry) -> Result<LedgerEntry> {
    if !(new.amount > 0.0) || !new.amount.is_finite() {
        return Err(AppError::validation("Amount must be greater than zero"));
    }

    let bc_holder = new
        .bc_holder
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let entry = LedgerEntry {
        id: new_id(),
        scope,
        direction: new.direction,
        amount: new.amount,
        bc_holder,
        description: new.description.trim().to_string(),
        date: new.date,
    };

    conn.execute(
        "INSERT INTO ledger_entries (id, scope, direction, amount, bc_holder, description, entry_date, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            entry.id,
            scope.as_str(),
            entry.direction.as_str(),
            entry.amount,
            entry.bc_holder,
            entry.description,
            date_to_sql(entry.date),
            now_rfc3339(),
        ],
    )?;

    record_event(
        conn,
        "ledger_entry_created",
        "ledger",
        &entry.id,
        serde_json::json!({
            "scope": scope.as_str(),
            "type": entry.direction.as_str(),
            "amount": entry.amount,
        }),
    );

    Ok(entry)
}

pub fn delete_entry(conn: &Connection, scope: LedgerScope, id: &str) -> Result<()> {
    let deleted = conn.execute(
        "DELETE FROM ledger_entries WHERE id = ?1 AND scope = ?2",
        params![id, scope.as_str()],
    )?;
    if deleted == 0 {
        return Err(AppError::not_found("Ledger entry"));
    }

    record_event(conn, "ledger_entry_deleted", "ledger", id, serde_json::json!({ "scope": scope.as_str() }));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;

    fn entry(direction: Direction, amount: f64, day: u32) -> NewLedgerEntry {
        NewLedgerEntry {
            direction,
            amount,
            bc_holder: None,
            description: "EMI Collection".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 12, day).unwrap(),
        }
    }

    #[test]
    fn test_totals_per_scope() {
        let conn = test_connection();
        create_entry(&conn, LedgerScope::Business, &entry(Direction::Received, 50000.0, 20)).unwrap();
        create_entry(&conn, LedgerScope::Business, &entry(Direction::Sent, 20000.0, 22)).unwrap();
        create_entry(&conn, LedgerScope::Business, &entry(Direction::Received, 30000.0, 24)).unwrap();
        create_entry(&conn, LedgerScope::Personal, &entry(Direction::Sent, 5000.0, 18)).unwrap();

        let business = ledger_view(&conn, LedgerScope::Business).unwrap();
        assert_eq!(business.transactions.len(), 3);
        assert_eq!(business.totals.total_received, 80000.0);
        assert_eq!(business.totals.total_sent, 20000.0);
        assert_eq!(business.totals.balance, 60000.0);

        let personal = ledger_view(&conn, LedgerScope::Personal).unwrap();
        assert_eq!(personal.totals.balance, -5000.0);
    }

    #[test]
    fn test_rejects_non_positive_amount() {
        let conn = test_connection();
        let err = create_entry(&conn, LedgerScope::Business, &entry(Direction::Sent, 0.0, 1)).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_delete_is_scoped() {
        let conn = test_connection();
        let e = create_entry(&conn, LedgerScope::Personal, &entry(Direction::Received, 10000.0, 23)).unwrap();

        assert!(matches!(
            delete_entry(&conn, LedgerScope::Business, &e.id),
            Err(AppError::NotFound(_))
        ));
        delete_entry(&conn, LedgerScope::Personal, &e.id).unwrap();
        assert!(list_entries(&conn, LedgerScope::Personal).unwrap().is_empty());
    }

    #[test]
    fn test_blank_bc_holder_is_dropped() {
        let conn = test_connection();
        let mut new = entry(Direction::Sent, 3000.0, 21);
        new.bc_holder = Some("  ".to_string());
        let e = create_entry(&conn, LedgerScope::Business, &new).unwrap();
        assert!(e.bc_holder.is_none());
    }

    #[test]
    fn test_view_json_is_flat() {
        let view = LedgerView {
            scope: LedgerScope::Business,
            totals: LedgerTotals { total_received: 10.0, total_sent: 4.0, balance: 6.0 },
            transactions: vec![],
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["totalReceived"], 10.0);
        assert_eq!(json["balance"], 6.0);
        assert_eq!(json["scope"], "business");
    }
}
