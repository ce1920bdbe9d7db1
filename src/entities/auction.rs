// Auction register: one row per ticket per group
//
// At most one auction of a group may be Prized. Every write that can make an
// auction Prized runs in a single SQLite transaction together with demoting
// the rest of the group, so the store never holds two Prized rows.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::{parse_timestamp, record_event};
use crate::entities::{new_id, now_rfc3339};
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AuctionStatus {
    #[serde(rename = "Prized")]
    Prized,
    #[default]
    #[serde(rename = "Non-Prx")]
    NonPrized,
}

impl AuctionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionStatus::Prized => "Prized",
            AuctionStatus::NonPrized => "Non-Prx",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Prized" => Some(AuctionStatus::Prized),
            "Non-Prx" => Some(AuctionStatus::NonPrized),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Auction {
    pub id: String,
    pub sr_no: i64,

    /// Name of the owning group
    pub group_no: String,
    pub ticket_no: String,
    pub customer_name: String,
    pub mobile_no: String,
    pub appui_date: String,

    /// Installment index the auction belongs to
    pub inst_ongoing: i64,
    pub status: AuctionStatus,
    pub previous_arrear: f64,
    pub current_amount: f64,
    pub cum_share: f64,
    pub to_be_collected: f64,
    pub unclaimed_amt: f64,
    pub agent_code: String,
    pub created_at: DateTime<Utc>,
}

/// Payload for create and full update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionInput {
    pub group_no: String,
    pub ticket_no: String,
    pub customer_name: String,
    pub mobile_no: String,
    #[serde(default)]
    pub appui_date: String,
    pub inst_ongoing: i64,
    #[serde(default)]
    pub status: AuctionStatus,
    #[serde(default)]
    pub previous_arrear: f64,
    #[serde(default)]
    pub current_amount: f64,
    #[serde(default)]
    pub cum_share: f64,
    #[serde(default)]
    pub to_be_collected: f64,
    #[serde(default)]
    pub unclaimed_amt: f64,
    #[serde(default)]
    pub agent_code: String,
}

impl AuctionInput {
    pub fn validate(&self) -> Result<()> {
        if self.group_no.trim().is_empty() {
            return Err(AppError::validation("Group is required"));
        }
        if self.ticket_no.trim().is_empty() {
            return Err(AppError::validation("Ticket number is required"));
        }
        if self.customer_name.trim().is_empty() {
            return Err(AppError::validation("Customer name is required"));
        }
        Ok(())
    }
}

const AUCTION_COLUMNS: &str = "id, sr_no, group_no, ticket_no, customer_name, mobile_no, appui_date,
    inst_ongoing, status, previous_arrear, current_amount, cum_share, to_be_collected,
    unclaimed_amt, agent_code, created_at";

fn auction_from_row(row: &Row) -> rusqlite::Result<Auction> {
    let status: String = row.get(8)?;
    let created_at: String = row.get(15)?;

    Ok(Auction {
        id: row.get(0)?,
        sr_no: row.get(1)?,
        group_no: row.get(2)?,
        ticket_no: row.get(3)?,
        customer_name: row.get(4)?,
        mobile_no: row.get(5)?,
        appui_date: row.get(6)?,
        inst_ongoing: row.get(7)?,
        status: AuctionStatus::parse(&status).unwrap_or_default(),
        previous_arrear: row.get(9)?,
        current_amount: row.get(10)?,
        cum_share: row.get(11)?,
        to_be_collected: row.get(12)?,
        unclaimed_amt: row.get(13)?,
        agent_code: row.get(14)?,
        created_at: parse_timestamp(15, &created_at)?,
    })
}

/// All auctions ordered by serial number, optionally for one group
pub fn list_auctions(conn: &Connection, group_no: Option<&str>) -> Result<Vec<Auction>> {
    let auctions = match group_no {
        Some(group) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM auctions WHERE group_no = ?1 ORDER BY sr_no",
                AUCTION_COLUMNS
            ))?;
            let rows = stmt
                .query_map([group], auction_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM auctions ORDER BY sr_no",
                AUCTION_COLUMNS
            ))?;
            let rows = stmt
                .query_map([], auction_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
    };

    Ok(auctions)
}

pub fn find_auction(conn: &Connection, id: &str) -> Result<Option<Auction>> {
    let auction = conn
        .query_row(
            &format!("SELECT {} FROM auctions WHERE id = ?1", AUCTION_COLUMNS),
            [id],
            auction_from_row,
        )
        .optional()?;

    Ok(auction)
}

pub fn get_auction(conn: &Connection, id: &str) -> Result<Auction> {
    find_auction(conn, id)?.ok_or_else(|| AppError::not_found("Auction"))
}

/// Demote every other auction of the group that is not already Non-Prx
fn demote_others(conn: &Connection, group_no: &str, keep_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE auctions SET status = 'Non-Prx'
         WHERE group_no = ?1 AND id != ?2 AND status != 'Non-Prx'",
        params![group_no, keep_id],
    )
}

pub fn create_auction(conn: &Connection, input: &AuctionInput) -> Result<Auction> {
    input.validate()?;

    let id = new_id();
    let tx = conn.unchecked_transaction()?;

    let sr_no: i64 = tx.query_row("SELECT COALESCE(MAX(sr_no), 0) + 1 FROM auctions", [], |row| row.get(0))?;

    tx.execute(
        &format!(
            "INSERT INTO auctions ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            AUCTION_COLUMNS
        ),
        params![
            id,
            sr_no,
            input.group_no,
            input.ticket_no,
            input.customer_name,
            input.mobile_no,
            input.appui_date,
            input.inst_ongoing,
            input.status.as_str(),
            input.previous_arrear,
            input.current_amount,
            input.cum_share,
            input.to_be_collected,
            input.unclaimed_amt,
            input.agent_code,
            now_rfc3339(),
        ],
    )?;

    if input.status == AuctionStatus::Prized {
        demote_others(&tx, &input.group_no, &id)?;
    }
    tx.commit()?;

    record_event(
        conn,
        "auction_created",
        "auction",
        &id,
        serde_json::json!({ "groupNo": input.group_no, "srNo": sr_no, "status": input.status.as_str() }),
    );

    get_auction(conn, &id)
}

/// Replace every editable field of an auction
pub fn update_auction(conn: &Connection, id: &str, input: &AuctionInput) -> Result<Auction> {
    input.validate()?;

    let tx = conn.unchecked_transaction()?;
    let changed = tx.execute(
        "UPDATE auctions
         SET group_no = ?1, ticket_no = ?2, customer_name = ?3, mobile_no = ?4, appui_date = ?5,
             inst_ongoing = ?6, status = ?7, previous_arrear = ?8, current_amount = ?9,
             cum_share = ?10, to_be_collected = ?11, unclaimed_amt = ?12, agent_code = ?13
         WHERE id = ?14",
        params![
            input.group_no,
            input.ticket_no,
            input.customer_name,
            input.mobile_no,
            input.appui_date,
            input.inst_ongoing,
            input.status.as_str(),
            input.previous_arrear,
            input.current_amount,
            input.cum_share,
            input.to_be_collected,
            input.unclaimed_amt,
            input.agent_code,
            id,
        ],
    )?;
    if changed == 0 {
        return Err(AppError::not_found("Auction"));
    }

    if input.status == AuctionStatus::Prized {
        demote_others(&tx, &input.group_no, id)?;
    }
    tx.commit()?;

    record_event(conn, "auction_updated", "auction", id, serde_json::to_value(input)?);

    get_auction(conn, id)
}

/// Mark one auction Prized and every other auction of its group Non-Prx,
/// atomically. Returns the auctions of the group after the change.
pub fn mark_prized(conn: &Connection, id: &str) -> Result<Vec<Auction>> {
    let tx = conn.unchecked_transaction()?;

    let auction = find_auction(&tx, id)?.ok_or_else(|| AppError::not_found("Auction"))?;

    tx.execute("UPDATE auctions SET status = 'Prized' WHERE id = ?1", [id])?;
    let demoted = demote_others(&tx, &auction.group_no, id)?;

    tx.commit()?;

    record_event(
        conn,
        "auction_prized",
        "auction",
        id,
        serde_json::json!({ "groupNo": auction.group_no, "demoted": demoted }),
    );
    tracing::info!(auction_id = %id, group_no = %auction.group_no, demoted, "auction marked prized");

    list_auctions(conn, Some(&auction.group_no))
}

pub fn delete_auction(conn: &Connection, id: &str) -> Result<()> {
    let deleted = conn.execute("DELETE FROM auctions WHERE id = ?1", [id])?;
    if deleted == 0 {
        return Err(AppError::not_found("Auction"));
    }

    record_event(conn, "auction_deleted", "auction", id, serde_json::json!({}));
    Ok(())
}
