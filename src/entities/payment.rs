// Installment payments

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::{parse_timestamp, record_event};
use crate::entities::member::{adjust_paid_count, find_member};
use crate::entities::{new_id, now_rfc3339};
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PaymentType {
    /// Installment collected from a member
    #[default]
    #[serde(rename = "COLLECTION")]
    Collection,

    /// Pool paid out to the prized member
    #[serde(rename = "BC_GIVEN")]
    BcGiven,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Collection => "COLLECTION",
            PaymentType::BcGiven => "BC_GIVEN",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "COLLECTION" => Some(PaymentType::Collection),
            "BC_GIVEN" => Some(PaymentType::BcGiven),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub group_id: String,
    pub member_id: String,
    pub amount: f64,
    pub emi_no: i64,
    pub paid_by: String,
    #[serde(rename = "type")]
    pub payment_type: PaymentType,
    pub payment_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayment {
    pub group_id: String,
    pub member_id: String,
    pub amount: f64,
    pub emi_no: i64,
    pub paid_by: String,
    #[serde(rename = "type", default)]
    pub payment_type: PaymentType,
}

const PAYMENT_COLUMNS: &str = "id, group_id, member_id, amount, emi_no, paid_by, payment_type, payment_date";

fn payment_from_row(row: &Row) -> rusqlite::Result<Payment> {
    let payment_type: String = row.get(6)?;
    let payment_date: String = row.get(7)?;

    Ok(Payment {
        id: row.get(0)?,
        group_id: row.get(1)?,
        member_id: row.get(2)?,
        amount: row.get(3)?,
        emi_no: row.get(4)?,
        paid_by: row.get(5)?,
        payment_type: PaymentType::parse(&payment_type).unwrap_or_default(),
        payment_date: parse_timestamp(7, &payment_date)?,
    })
}

pub fn list_payments(conn: &Connection) -> Result<Vec<Payment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM payments ORDER BY payment_date, rowid",
        PAYMENT_COLUMNS
    ))?;

    let payments = stmt
        .query_map([], payment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(payments)
}

pub fn list_payments_by_member(conn: &Connection, member_id: &str) -> Result<Vec<Payment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM payments WHERE member_id = ?1 ORDER BY payment_date, rowid",
        PAYMENT_COLUMNS
    ))?;

    let payments = stmt
        .query_map([member_id], payment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(payments)
}

pub fn find_payment(conn: &Connection, id: &str) -> Result<Option<Payment>> {
    let payment = conn
        .query_row(
            &format!("SELECT {} FROM payments WHERE id = ?1", PAYMENT_COLUMNS),
            [id],
            payment_from_row,
        )
        .optional()?;

    Ok(payment)
}

/// Record a payment and count it against the member's installments
pub fn create_payment(conn: &Connection, new: &NewPayment, today: NaiveDate) -> Result<Payment> {
    if !(new.amount > 0.0) {
        return Err(AppError::validation("Payment amount must be positive"));
    }
    if new.emi_no < 1 {
        return Err(AppError::validation("EMI number must be at least 1"));
    }
    match find_member(conn, &new.member_id)? {
        None => return Err(AppError::validation(format!("Unknown member: {}", new.member_id))),
        Some(member) if member.group_id != new.group_id => {
            return Err(AppError::validation("Member does not belong to this group"));
        }
        Some(_) => {}
    }

    let id = new_id();
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO payments (id, group_id, member_id, amount, emi_no, paid_by, payment_type, payment_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id,
            new.group_id,
            new.member_id,
            new.amount,
            new.emi_no,
            new.paid_by,
            new.payment_type.as_str(),
            now_rfc3339(),
        ],
    )?;
    adjust_paid_count(&tx, &new.member_id, 1, today)?;
    tx.commit()?;

    record_event(
        conn,
        "payment_recorded",
        "member",
        &new.member_id,
        serde_json::json!({ "paymentId": id, "amount": new.amount, "emiNo": new.emi_no }),
    );
    tracing::info!(payment_id = %id, member_id = %new.member_id, amount = new.amount, "payment recorded");

    find_payment(conn, &id)?.ok_or_else(|| AppError::not_found("Payment"))
}

pub fn delete_payment(conn: &Connection, id: &str, today: NaiveDate) -> Result<()> {
    let payment = find_payment(conn, id)?.ok_or_else(|| AppError::not_found("Payment"))?;

    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM payments WHERE id = ?1", [id])?;
    adjust_paid_count(&tx, &payment.member_id, -1, today)?;
    tx.commit()?;

    record_event(
        conn,
        "payment_deleted",
        "member",
        &payment.member_id,
        serde_json::json!({ "paymentId": id, "amount": payment.amount }),
    );

    Ok(())
}
