// Payment reminders
//
// The composer produces the default text an operator starts from. Scheduling
// only records the chosen channel and time; no message is ever delivered.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::{date_to_sql, parse_date, parse_timestamp, record_event};
use crate::entities::member::get_member;
use crate::entities::{flexible_date, new_id, now_rfc3339};
use crate::error::{AppError, Result};
use crate::format::format_amount;
use crate::tally::TallyRow;

pub const DEFAULT_SCHEDULE_TIME: &str = "10:00";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReminderChannel {
    #[default]
    Sms,
    Whatsapp,
    Email,
}

impl ReminderChannel {
    pub const ALL: [ReminderChannel; 3] = [ReminderChannel::Sms, ReminderChannel::Whatsapp, ReminderChannel::Email];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderChannel::Sms => "sms",
            ReminderChannel::Whatsapp => "whatsapp",
            ReminderChannel::Email => "email",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReminderChannel::Sms => "SMS",
            ReminderChannel::Whatsapp => "WhatsApp",
            ReminderChannel::Email => "Email",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "sms" => Some(ReminderChannel::Sms),
            "whatsapp" => Some(ReminderChannel::Whatsapp),
            "email" => Some(ReminderChannel::Email),
            _ => None,
        }
    }

    pub fn next(&self) -> Self {
        match self {
            ReminderChannel::Sms => ReminderChannel::Whatsapp,
            ReminderChannel::Whatsapp => ReminderChannel::Email,
            ReminderChannel::Email => ReminderChannel::Sms,
        }
    }
}

/// Default reminder text for a tally row. Penalty and total-due lines only
/// appear when a penalty applies.
pub fn compose_message(row: &TallyRow, business_name: &str) -> String {
    let mut lines = vec![
        format!("Dear {},", row.name),
        String::new(),
        format!("This is a reminder for your installment payment for {}.", row.group_name),
        String::new(),
        format!("Pending Amount: ₹{}", format_amount(row.pending_amount)),
    ];

    if row.penalty > 0.0 {
        lines.push(format!("Penalty (Late Payment): ₹{}", format_amount(row.penalty)));
        lines.push(format!("Total Due: ₹{}", format_amount(row.pending_amount + row.penalty)));
    }

    lines.push(format!("EMI Amount: ₹{}", format_amount(row.group_emi)));
    lines.push(format!("EMI Paid: {}", row.emi_paid_count));
    lines.push(String::new());
    lines.push("Please make the payment at your earliest convenience.".to_string());
    lines.push(String::new());
    lines.push("Thank you,".to_string());
    lines.push(business_name.to_string());

    lines.join("\n")
}

// ============================================================================
// SCHEDULING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderRequest {
    pub member_id: String,
    #[serde(alias = "mode", default)]
    pub channel: ReminderChannel,
    pub message: String,
    #[serde(with = "flexible_date")]
    pub schedule_date: NaiveDate,
    #[serde(default = "default_schedule_time")]
    pub schedule_time: String,
}

fn default_schedule_time() -> String {
    DEFAULT_SCHEDULE_TIME.to_string()
}

impl ReminderRequest {
    /// The default request the reminder dialog opens with
    pub fn draft(row: &TallyRow, business_name: &str, today: NaiveDate) -> Self {
        ReminderRequest {
            member_id: row.member_id.clone(),
            channel: ReminderChannel::Sms,
            message: compose_message(row, business_name),
            schedule_date: today,
            schedule_time: default_schedule_time(),
        }
    }

    pub fn validate(&self) -> Result<NaiveTime> {
        if self.message.trim().is_empty() {
            return Err(AppError::validation("Reminder message is required"));
        }
        NaiveTime::parse_from_str(&self.schedule_time, "%H:%M")
            .map_err(|_| AppError::validation(format!("Invalid schedule time: {}", self.schedule_time)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: String,
    pub member_id: String,
    pub channel: ReminderChannel,
    pub message: String,
    #[serde(with = "flexible_date")]
    pub schedule_date: NaiveDate,
    pub schedule_time: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// What the operator sees after scheduling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderAck {
    pub reminder: Reminder,
    pub acknowledgment: String,
}

fn reminder_from_row(row: &Row) -> rusqlite::Result<Reminder> {
    let channel: String = row.get(2)?;
    let schedule_date: String = row.get(4)?;
    let created_at: String = row.get(7)?;

    Ok(Reminder {
        id: row.get(0)?,
        member_id: row.get(1)?,
        channel: ReminderChannel::parse(&channel).unwrap_or_default(),
        message: row.get(3)?,
        schedule_date: parse_date(4, &schedule_date)?,
        schedule_time: row.get(5)?,
        status: row.get(6)?,
        created_at: parse_timestamp(7, &created_at)?,
    })
}

/// Record a reminder for later. Nothing is sent.
pub fn schedule_reminder(conn: &Connection, request: &ReminderRequest) -> Result<ReminderAck> {
    let time = request.validate()?;
    let member = get_member(conn, &request.member_id)?;

    let id = new_id();
    let schedule_time = time.format("%H:%M").to_string();

    conn.execute(
        "INSERT INTO reminders (id, member_id, channel, message, schedule_date, schedule_time, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'scheduled', ?7)",
        params![
            id,
            request.member_id,
            request.channel.as_str(),
            request.message,
            date_to_sql(request.schedule_date),
            schedule_time,
            now_rfc3339(),
        ],
    )?;

    record_event(
        conn,
        "reminder_scheduled",
        "member",
        &request.member_id,
        serde_json::json!({ "reminderId": id, "channel": request.channel.as_str() }),
    );
    tracing::info!(
        member_id = %request.member_id,
        channel = request.channel.as_str(),
        date = %request.schedule_date,
        "reminder scheduled (not delivered)"
    );

    let acknowledgment = format!(
        "Reminder scheduled!\n\nMode: {}\nTo: {} ({})\nDate: {} at {}\n\nMessage will be sent via {}.",
        request.channel.label().to_uppercase(),
        member.name,
        member.phone,
        date_to_sql(request.schedule_date),
        schedule_time,
        request.channel.label().to_uppercase(),
    );

    let reminder = conn.query_row(
        "SELECT id, member_id, channel, message, schedule_date, schedule_time, status, created_at
         FROM reminders WHERE id = ?1",
        [&id],
        reminder_from_row,
    )?;

    Ok(ReminderAck { reminder, acknowledgment })
}

pub fn list_reminders(conn: &Connection, member_id: Option<&str>) -> Result<Vec<Reminder>> {
    let sql = "SELECT id, member_id, channel, message, schedule_date, schedule_time, status, created_at
               FROM reminders";

    let reminders = match member_id {
        Some(id) => {
            let mut stmt = conn.prepare(&format!("{} WHERE member_id = ?1 ORDER BY schedule_date, schedule_time", sql))?;
            let rows = stmt.query_map([id], reminder_from_row)?.collect::<Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let mut stmt = conn.prepare(&format!("{} ORDER BY schedule_date, schedule_time", sql))?;
            let rows = stmt.query_map([], reminder_from_row)?.collect::<Result<Vec<_>, _>>()?;
            rows
        }
    };

    Ok(reminders)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;
    use crate::entities::member::create_member;
    use crate::entities::member::tests::{new_group, new_member};
    use crate::tally::tests::{date, group, member};
    use crate::tally::build_rows;

    fn row(pending: f64, paid: i64) -> TallyRow {
        let groups = vec![group("g1", "ATL G1", 20000.0)];
        let members = vec![member("m1", "g1", "Raj Sharma", pending, paid)];
        build_rows(&members, &groups, date(2026, 10, 17)).remove(0)
    }

    #[test]
    fn test_message_without_penalty() {
        let message = compose_message(&row(20000.0, 9), "KA Associates");

        assert!(message.starts_with("Dear Raj Sharma,\n\n"));
        assert!(message.contains("installment payment for ATL G1."));
        assert!(message.contains("Pending Amount: ₹20,000\nEMI Amount: ₹20,000\nEMI Paid: 9"));
        assert!(!message.contains("Penalty"));
        assert!(!message.contains("Total Due"));
        assert!(message.ends_with("Thank you,\nKA Associates"));
    }

    #[test]
    fn test_message_with_penalty() {
        // behind by several months: 3% of 40000 = 1200
        let message = compose_message(&row(40000.0, 2), "KA Associates");

        assert!(message.contains(
            "Pending Amount: ₹40,000\nPenalty (Late Payment): ₹1,200\nTotal Due: ₹41,200\nEMI Amount: ₹20,000"
        ));
    }

    #[test]
    fn test_draft_defaults() {
        let r = row(20000.0, 9);
        let draft = ReminderRequest::draft(&r, "KA Associates", date(2026, 10, 17));
        assert_eq!(draft.channel, ReminderChannel::Sms);
        assert_eq!(draft.schedule_time, "10:00");
        assert_eq!(draft.schedule_date, date(2026, 10, 17));
        assert_eq!(draft.message, compose_message(&r, "KA Associates"));
    }

    #[test]
    fn test_schedule_records_without_sending() {
        let conn = test_connection();
        let gid = new_group(&conn, "ATL G1", 500000.0, 25);
        let today = date(2026, 10, 17);
        let m = create_member(&conn, &new_member(&gid, "Raj Sharma", today), today).unwrap();

        let request = ReminderRequest {
            member_id: m.id.clone(),
            channel: ReminderChannel::Whatsapp,
            message: "Please pay".to_string(),
            schedule_date: today,
            schedule_time: "09:30".to_string(),
        };
        let ack = schedule_reminder(&conn, &request).unwrap();

        assert_eq!(ack.reminder.status, "scheduled");
        assert_eq!(ack.reminder.channel, ReminderChannel::Whatsapp);
        assert!(ack.acknowledgment.contains("Mode: WHATSAPP"));
        assert!(ack.acknowledgment.contains("To: Raj Sharma (9876543210)"));
        assert!(ack.acknowledgment.contains("Date: 2026-10-17 at 09:30"));

        assert_eq!(list_reminders(&conn, Some(&m.id)).unwrap().len(), 1);
        assert_eq!(list_reminders(&conn, None).unwrap().len(), 1);
    }

    #[test]
    fn test_schedule_validation() {
        let conn = test_connection();
        let mut request = ReminderRequest {
            member_id: "missing".to_string(),
            channel: ReminderChannel::Sms,
            message: "hi".to_string(),
            schedule_date: date(2026, 10, 17),
            schedule_time: "25:99".to_string(),
        };
        assert!(matches!(schedule_reminder(&conn, &request), Err(AppError::Validation(_))));

        request.schedule_time = "10:00".to_string();
        assert!(matches!(schedule_reminder(&conn, &request), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_channel_accepts_mode_alias() {
        let json = serde_json::json!({
            "memberId": "m1",
            "mode": "email",
            "message": "hello",
            "scheduleDate": "2026-10-20"
        });
        let request: ReminderRequest = serde_json::from_value(json).unwrap();
        assert_eq!(request.channel, ReminderChannel::Email);
        assert_eq!(request.schedule_time, "10:00");
    }
}
