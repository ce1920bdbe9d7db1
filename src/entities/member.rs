// Member: one participant of one group

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::{date_to_sql, parse_date, parse_timestamp, record_event};
use crate::dues::calculate_pending;
use crate::entities::group::{find_group, recalc_group};
use crate::entities::{flexible_date, new_id, now_rfc3339};
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    #[default]
    Active,
    Inactive,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Active => "active",
            MemberStatus::Inactive => "inactive",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(MemberStatus::Active),
            "inactive" => Some(MemberStatus::Inactive),
            _ => None,
        }
    }
}

/// A previous BC holder and the date the member moved away from them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BcHistoryEntry {
    pub bc_name: String,
    #[serde(with = "flexible_date")]
    pub transferred_at: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: String,
    pub group_id: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,

    /// Collection agent responsible for this member
    pub bc_holder: String,
    pub bc_history: Vec<BcHistoryEntry>,

    #[serde(with = "flexible_date")]
    pub join_date: NaiveDate,
    #[serde(default, with = "flexible_date::option")]
    pub end_date: Option<NaiveDate>,
    pub status: MemberStatus,

    /// Feeds the penalty rate
    pub is_prized: bool,
    pub emi_paid_count: i64,
    pub pending_amount: f64,

    /// Set once the pending amount is edited by hand; stops recomputation
    pub manual_pending_override: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMember {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub address: String,
    pub group_id: String,
    pub bc_holder: String,
    #[serde(with = "flexible_date")]
    pub join_date: NaiveDate,
    #[serde(default, with = "flexible_date::option")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: MemberStatus,
    #[serde(default)]
    pub is_prized: bool,
}

impl NewMember {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("Member name is required"));
        }
        if self.phone.trim().is_empty() {
            return Err(AppError::validation("Phone number is required"));
        }
        if self.bc_holder.trim().is_empty() {
            return Err(AppError::validation("BC holder is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub bc_holder: Option<String>,
    pub status: Option<MemberStatus>,
    pub is_prized: Option<bool>,
    #[serde(default, with = "flexible_date::option")]
    pub end_date: Option<NaiveDate>,

    /// Removes a stored end date; wins over `end_date`
    #[serde(default)]
    pub clear_end_date: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BcTransfer {
    pub member_id: String,
    pub new_bc: String,
    #[serde(with = "flexible_date")]
    pub transfer_date: NaiveDate,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEdit {
    pub member_id: String,
    pub pending_amount: f64,
}

const MEMBER_COLUMNS: &str = "id, group_id, name, phone, email, address, bc_holder, bc_history,
    join_date, end_date, status, is_prized, emi_paid_count, pending_amount,
    manual_pending_override, created_at, updated_at";

fn member_from_row(row: &Row) -> rusqlite::Result<Member> {
    let bc_history_json: String = row.get(7)?;
    let join_date: String = row.get(8)?;
    let end_date: Option<String> = row.get(9)?;
    let status: String = row.get(10)?;
    let created_at: String = row.get(15)?;
    let updated_at: String = row.get(16)?;

    let bc_history = serde_json::from_str(&bc_history_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Member {
        id: row.get(0)?,
        group_id: row.get(1)?,
        name: row.get(2)?,
        phone: row.get(3)?,
        email: row.get(4)?,
        address: row.get(5)?,
        bc_holder: row.get(6)?,
        bc_history,
        join_date: parse_date(8, &join_date)?,
        end_date: end_date.map(|d| parse_date(9, &d)).transpose()?,
        status: MemberStatus::parse(&status).unwrap_or(MemberStatus::Inactive),
        is_prized: row.get(11)?,
        emi_paid_count: row.get(12)?,
        pending_amount: row.get(13)?,
        manual_pending_override: row.get(14)?,
        created_at: parse_timestamp(15, &created_at)?,
        updated_at: parse_timestamp(16, &updated_at)?,
    })
}

fn query_members(conn: &Connection, filter: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<Member>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM members {} ORDER BY created_at, rowid",
        MEMBER_COLUMNS, filter
    ))?;

    let members = stmt
        .query_map(args, member_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(members)
}

pub fn list_members(conn: &Connection) -> Result<Vec<Member>> {
    query_members(conn, "", &[])
}

pub fn list_members_by_group(conn: &Connection, group_id: &str) -> Result<Vec<Member>> {
    query_members(conn, "WHERE group_id = ?1", &[&group_id])
}

pub fn find_member(conn: &Connection, id: &str) -> Result<Option<Member>> {
    let member = conn
        .query_row(
            &format!("SELECT {} FROM members WHERE id = ?1", MEMBER_COLUMNS),
            [id],
            member_from_row,
        )
        .optional()?;

    Ok(member)
}

pub fn get_member(conn: &Connection, id: &str) -> Result<Member> {
    find_member(conn, id)?.ok_or_else(|| AppError::not_found("Member"))
}

fn ensure_seat_available(conn: &Connection, group_id: &str) -> Result<()> {
    let group = find_group(conn, group_id)?.ok_or_else(|| AppError::validation("Invalid group"))?;
    if group.members_count >= group.max_members {
        return Err(AppError::validation(format!(
            "Group {} is full ({} of {} members)",
            group.name, group.members_count, group.max_members
        )));
    }
    Ok(())
}

/// Pending amount for a member under the group's current EMI
fn fresh_pending(conn: &Connection, group_id: &str, join_date: NaiveDate, paid: i64, today: NaiveDate) -> Result<f64> {
    let emi = find_group(conn, group_id)?.map(|g| g.emi_amount).unwrap_or(0.0);
    Ok(calculate_pending(join_date, emi, paid, today))
}

fn insert_member(conn: &Connection, new: &NewMember, today: NaiveDate, import_key: Option<&str>) -> Result<String> {
    new.validate()?;

    if find_group(conn, &new.group_id)?.is_none() {
        return Err(AppError::validation("Invalid group"));
    }
    if new.status == MemberStatus::Active {
        ensure_seat_available(conn, &new.group_id)?;
    }

    let id = new_id();
    let now = now_rfc3339();

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO members (id, group_id, name, phone, email, address, bc_holder, bc_history,
            join_date, end_date, status, is_prized, emi_paid_count, pending_amount,
            manual_pending_override, import_key, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, '[]', ?8, ?9, ?10, ?11, 0, 0, 0, ?12, ?13, ?13)",
        params![
            id,
            new.group_id,
            new.name.trim(),
            new.phone.trim(),
            new.email,
            new.address,
            new.bc_holder,
            date_to_sql(new.join_date),
            new.end_date.map(date_to_sql),
            new.status.as_str(),
            new.is_prized,
            import_key,
            now,
        ],
    )?;

    recalc_group(&tx, &new.group_id)?;

    // Pending is computed against the EMI that includes this member
    let pending = fresh_pending(&tx, &new.group_id, new.join_date, 0, today)?;
    tx.execute(
        "UPDATE members SET pending_amount = ?1 WHERE id = ?2",
        params![pending, id],
    )?;
    tx.commit()?;

    record_event(
        conn,
        "member_created",
        "member",
        &id,
        serde_json::json!({ "groupId": new.group_id, "name": new.name, "pendingAmount": pending }),
    );
    tracing::info!(member_id = %id, group_id = %new.group_id, "member created");

    Ok(id)
}

pub fn create_member(conn: &Connection, new: &NewMember, today: NaiveDate) -> Result<Member> {
    let id = insert_member(conn, new, today, None)?;
    get_member(conn, &id)
}

/// Insert a member keyed by an import hash. Returns `false` when a member with
/// the same key already exists.
pub fn import_member(conn: &Connection, new: &NewMember, today: NaiveDate, import_key: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM members WHERE import_key = ?1",
        [import_key],
        |row| row.get(0),
    )?;
    if exists {
        return Ok(false);
    }

    insert_member(conn, new, today, Some(import_key))?;
    Ok(true)
}

pub fn update_member(conn: &Connection, id: &str, update: &MemberUpdate, today: NaiveDate) -> Result<Member> {
    let current = get_member(conn, id)?;

    let status = update.status.unwrap_or(current.status);
    let reactivating = current.status == MemberStatus::Inactive && status == MemberStatus::Active;
    if reactivating {
        ensure_seat_available(conn, &current.group_id)?;
    }

    let name = update.name.clone().unwrap_or(current.name);
    if name.trim().is_empty() {
        return Err(AppError::validation("Member name is required"));
    }

    let end_date = if update.clear_end_date {
        None
    } else {
        update.end_date.or(current.end_date)
    };

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE members
         SET name = ?1, phone = ?2, email = ?3, address = ?4, bc_holder = ?5,
             status = ?6, is_prized = ?7, end_date = ?8, updated_at = ?9
         WHERE id = ?10",
        params![
            name.trim(),
            update.phone.clone().unwrap_or(current.phone),
            update.email.clone().unwrap_or(current.email),
            update.address.clone().unwrap_or(current.address),
            update.bc_holder.clone().unwrap_or(current.bc_holder),
            status.as_str(),
            update.is_prized.unwrap_or(current.is_prized),
            end_date.map(date_to_sql),
            now_rfc3339(),
            id,
        ],
    )?;

    if status != current.status {
        recalc_group(&tx, &current.group_id)?;
    }

    if !current.manual_pending_override {
        let pending = fresh_pending(&tx, &current.group_id, current.join_date, current.emi_paid_count, today)?;
        tx.execute("UPDATE members SET pending_amount = ?1 WHERE id = ?2", params![pending, id])?;
    }
    tx.commit()?;

    record_event(conn, "member_updated", "member", id, serde_json::to_value(update)?);

    get_member(conn, id)
}

pub fn delete_member(conn: &Connection, id: &str) -> Result<()> {
    let member = get_member(conn, id)?;

    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM members WHERE id = ?1", [id])?;
    recalc_group(&tx, &member.group_id)?;
    tx.commit()?;

    record_event(
        conn,
        "member_deleted",
        "member",
        id,
        serde_json::json!({ "groupId": member.group_id, "name": member.name }),
    );

    Ok(())
}

/// Move a member to a new BC holder, keeping the old one in the history
pub fn transfer_bc(conn: &Connection, transfer: &BcTransfer) -> Result<Member> {
    if transfer.new_bc.trim().is_empty() {
        return Err(AppError::validation("New BC holder is required"));
    }

    let member = get_member(conn, &transfer.member_id)?;

    let mut history = member.bc_history.clone();
    history.push(BcHistoryEntry {
        bc_name: member.bc_holder.clone(),
        transferred_at: transfer.transfer_date,
    });

    conn.execute(
        "UPDATE members SET bc_holder = ?1, bc_history = ?2, updated_at = ?3 WHERE id = ?4",
        params![
            transfer.new_bc.trim(),
            serde_json::to_string(&history)?,
            now_rfc3339(),
            transfer.member_id,
        ],
    )?;

    record_event(
        conn,
        "member_bc_transferred",
        "member",
        &transfer.member_id,
        serde_json::json!({
            "from": member.bc_holder,
            "to": transfer.new_bc,
            "notes": transfer.notes,
        }),
    );

    get_member(conn, &transfer.member_id)
}

/// Set the pending amount by hand; later payments stop recomputing it
pub fn edit_pending(conn: &Connection, edit: &PendingEdit) -> Result<Member> {
    if edit.pending_amount < 0.0 || !edit.pending_amount.is_finite() {
        return Err(AppError::validation("Pending amount cannot be negative"));
    }

    let member = get_member(conn, &edit.member_id)?;

    conn.execute(
        "UPDATE members SET pending_amount = ?1, manual_pending_override = 1, updated_at = ?2
         WHERE id = ?3",
        params![edit.pending_amount, now_rfc3339(), edit.member_id],
    )?;

    record_event(
        conn,
        "member_pending_edited",
        "member",
        &edit.member_id,
        serde_json::json!({ "from": member.pending_amount, "to": edit.pending_amount }),
    );

    get_member(conn, &edit.member_id)
}

/// Shift the paid installment count by `delta` (never below zero) and
/// recompute the pending amount unless it was overridden by hand
pub(crate) fn adjust_paid_count(conn: &Connection, member_id: &str, delta: i64, today: NaiveDate) -> Result<()> {
    let Some(member) = find_member(conn, member_id)? else {
        return Ok(());
    };

    let paid = (member.emi_paid_count + delta).max(0);
    if paid == member.emi_paid_count {
        return Ok(());
    }

    let pending = if member.manual_pending_override {
        member.pending_amount
    } else {
        match find_group(conn, &member.group_id)? {
            Some(group) => calculate_pending(member.join_date, group.emi_amount, paid, today),
            None => member.pending_amount,
        }
    };

    conn.execute(
        "UPDATE members SET emi_paid_count = ?1, pending_amount = ?2, updated_at = ?3 WHERE id = ?4",
        params![paid, pending, now_rfc3339(), member_id],
    )?;

    Ok(())
}
