// CSV member import, tally export and sample data

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::entities::auction::create_auction;
use crate::entities::group::{create_group, find_group_by_name};
use crate::entities::ledger::create_entry;
use crate::entities::member::{create_member, import_member};
use crate::entities::{AuctionInput, AuctionStatus, Direction, LedgerScope, MemberStatus, NewGroup, NewLedgerEntry, NewMember};
use crate::format::{format_date, parse_iso_date};
use crate::tally::TallyRow;

// ============================================================================
// MEMBER IMPORT
// ============================================================================

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MemberRecord {
    #[serde(rename = "Group")]
    pub group: String,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Phone")]
    pub phone: String,

    #[serde(rename = "Email", default)]
    pub email: String,

    #[serde(rename = "Address", default)]
    pub address: String,

    #[serde(rename = "BC Holder")]
    pub bc_holder: String,

    #[serde(rename = "Join Date")]
    pub join_date: String,
}

impl MemberRecord {
    /// Idempotency key for re-imports: same group, name and phone = same member
    pub fn import_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}|{}|{}",
            self.group.trim().to_lowercase(),
            self.name.trim().to_lowercase(),
            self.phone.trim()
        ));
        format!("{:x}", hasher.finalize())
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ImportReport {
    pub inserted: usize,
    pub duplicates: usize,
    /// Line number and reason for every rejected row
    pub rejected: Vec<(usize, String)>,
}

pub fn load_member_csv(csv_path: &Path) -> Result<Vec<MemberRecord>> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open CSV file {:?}", csv_path))?;

    let mut records = Vec::new();
    for result in rdr.deserialize() {
        let record: MemberRecord = result.context("Failed to deserialize member row")?;
        records.push(record);
    }

    Ok(records)
}

/// Import members; rows already imported are skipped, invalid rows are reported
pub fn import_members(conn: &Connection, records: &[MemberRecord], today: NaiveDate) -> Result<ImportReport> {
    let mut report = ImportReport::default();

    for (idx, record) in records.iter().enumerate() {
        // header is line 1
        let line = idx + 2;

        let Some(group) = find_group_by_name(conn, record.group.trim())? else {
            tracing::warn!(line, group = %record.group, "unknown group, row skipped");
            report.rejected.push((line, format!("Unknown group: {}", record.group)));
            continue;
        };

        let Some(join_date) = parse_iso_date(&record.join_date) else {
            report.rejected.push((line, format!("Invalid join date: {}", record.join_date)));
            continue;
        };

        let new = NewMember {
            name: record.name.clone(),
            phone: record.phone.clone(),
            email: record.email.clone(),
            address: record.address.clone(),
            group_id: group.id,
            bc_holder: record.bc_holder.clone(),
            join_date,
            end_date: None,
            status: MemberStatus::Active,
            is_prized: false,
        };

        match import_member(conn, &new, today, &record.import_key()) {
            Ok(true) => report.inserted += 1,
            Ok(false) => report.duplicates += 1,
            Err(e) if e.is_client_error() => report.rejected.push((line, e.to_string())),
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!(
        inserted = report.inserted,
        duplicates = report.duplicates,
        rejected = report.rejected.len(),
        "member import finished"
    );

    Ok(report)
}

// ============================================================================
// TALLY EXPORT
// ============================================================================

#[derive(Debug, Serialize)]
struct TallyRecord<'a> {
    #[serde(rename = "Member")]
    member: &'a str,
    #[serde(rename = "Phone")]
    phone: &'a str,
    #[serde(rename = "Group")]
    group: &'a str,
    #[serde(rename = "BC Holder")]
    bc_holder: &'a str,
    #[serde(rename = "Join Date")]
    join_date: String,
    #[serde(rename = "EMI")]
    emi: f64,
    #[serde(rename = "EMI Paid")]
    emi_paid: i64,
    #[serde(rename = "Pending")]
    pending: f64,
    #[serde(rename = "Penalty")]
    penalty: f64,
    #[serde(rename = "Total Due")]
    total_due: f64,
    #[serde(rename = "Status")]
    status: &'static str,
}

pub fn export_tally_csv(rows: &[TallyRow], csv_path: &Path) -> Result<usize> {
    let mut wtr = csv::Writer::from_path(csv_path)
        .with_context(|| format!("Failed to create CSV file {:?}", csv_path))?;

    for row in rows {
        wtr.serialize(TallyRecord {
            member: &row.name,
            phone: &row.phone,
            group: &row.group_name,
            bc_holder: &row.bc_holder,
            join_date: format_date(&row.join_date.to_string()),
            emi: row.group_emi,
            emi_paid: row.emi_paid_count,
            pending: row.pending_amount,
            penalty: row.penalty,
            total_due: row.total_due,
            status: row.status.as_str(),
        })?;
    }
    wtr.flush()?;

    Ok(rows.len())
}

// ============================================================================
// SAMPLE DATA
// ============================================================================

const SAMPLE_GROUPS: [(&str, f64, i64, &str); 3] = [
    ("ATL G1", 500000.0, 25, "Premium chit fund group"),
    ("ATL G2", 250000.0, 25, "Medium-term savings group"),
    ("ATL G3", 100000.0, 25, "Short-term chit for daily income earners"),
];

const SAMPLE_NAMES: [&str; 15] = [
    "Raj Sharma", "Priya Patel", "Amit Kumar", "Sneha Singh", "Vikram Reddy",
    "Anjali Verma", "Karthik Joshi", "Divya Desai", "Rahul Mehta", "Pooja Choudhary",
    "Suresh Iyer", "Meera Nair", "Arun Menon", "Lakshmi Pillai", "Manoj Rao",
];

pub const BC_CONTROLLERS: [&str; 4] = [
    "KALYMAN_SADAMANO JAMARKAR (N08553)",
    "RAJESH PATEL (N08554)",
    "PRIYA SHARMA (N08555)",
    "AMIT KUMAR (N08556)",
];

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SeedReport {
    pub groups: usize,
    pub members: usize,
    pub auctions: usize,
    pub ledger_entries: usize,
}

/// Populate an empty database with demo groups, members, auctions and ledger entries
pub fn seed_sample_data(conn: &Connection, today: NaiveDate) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    for (i, (name, total, max, description)) in SAMPLE_GROUPS.iter().enumerate() {
        let group = create_group(
            conn,
            &NewGroup {
                name: name.to_string(),
                total_chit_amount: *total,
                max_members: *max,
                description: description.to_string(),
            },
        )?;
        report.groups += 1;

        for j in 0..5usize {
            let member_name = SAMPLE_NAMES[(i * 5 + j) % SAMPLE_NAMES.len()];
            let new = NewMember {
                name: member_name.to_string(),
                phone: format!("9{:09}", 800000000 + i * 10000 + j),
                email: format!("{}@example.com", member_name.to_lowercase().replace(' ', ".")),
                address: format!("{} Street, Mumbai", j + 1),
                group_id: group.id.clone(),
                bc_holder: BC_CONTROLLERS[j % BC_CONTROLLERS.len()].to_string(),
                join_date: today - Duration::days(30 * j as i64),
                end_date: None,
                status: MemberStatus::Active,
                is_prized: false,
            };
            create_member(conn, &new, today)?;
            report.members += 1;
        }
    }

    let auctions = [
        ("67661 2", "PRITT C UNADECZOO", "9430538549", AuctionStatus::NonPrized, 0.0, 9998.0, 416859.0, 9998.0),
        ("67661 3", "SURG J W HENAE", "9521513530", AuctionStatus::Prized, 50464.0, 10000.0, 365284.0, 60464.0),
    ];
    for (ticket, customer, mobile, status, arrear, current, cum_share, collect) in auctions {
        create_auction(
            conn,
            &AuctionInput {
                group_no: "ATL G1".to_string(),
                ticket_no: ticket.to_string(),
                customer_name: customer.to_string(),
                mobile_no: mobile.to_string(),
                appui_date: "06-12-2021".to_string(),
                inst_ongoing: 48,
                status,
                previous_arrear: arrear,
                current_amount: current,
                cum_share,
                to_be_collected: collect,
                unclaimed_amt: 0.0,
                agent_code: "N08553".to_string(),
            },
        )?;
        report.auctions += 1;
    }

    let ledger = [
        (LedgerScope::Business, Direction::Received, 50000.0, Some(BC_CONTROLLERS[0]), "EMI Collection", 20),
        (LedgerScope::Business, Direction::Sent, 20000.0, Some(BC_CONTROLLERS[1]), "Commission Payment", 22),
        (LedgerScope::Business, Direction::Received, 30000.0, Some(BC_CONTROLLERS[2]), "EMI Collection", 24),
        (LedgerScope::Personal, Direction::Sent, 5000.0, None, "Office Supplies", 18),
        (LedgerScope::Personal, Direction::Sent, 3000.0, None, "Travel Expenses", 21),
        (LedgerScope::Personal, Direction::Received, 10000.0, None, "Personal Income", 23),
    ];
    for (scope, direction, amount, bc_holder, description, day) in ledger {
        let date = NaiveDate::from_ymd_opt(2025, 12, day).context("invalid sample date")?;
        create_entry(
            conn,
            scope,
            &NewLedgerEntry {
                direction,
                amount,
                bc_holder: bc_holder.map(str::to_string),
                description: description.to_string(),
                date,
            },
        )?;
        report.ledger_entries += 1;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;
    use crate::entities::group::list_groups;
    use crate::entities::member::list_members;
    use crate::entities::member::tests::new_group;
    use crate::tally::{build_rows, tests::date};
    use std::io::Write;

    fn record(group: &str, name: &str, phone: &str) -> MemberRecord {
        MemberRecord {
            group: group.to_string(),
            name: name.to_string(),
            phone: phone.to_string(),
            email: String::new(),
            address: String::new(),
            bc_holder: "AMIT KUMAR (N08556)".to_string(),
            join_date: "2026-09-01".to_string(),
        }
    }

    #[test]
    fn test_import_key_is_stable_and_normalized() {
        let a = record("ATL G1", "Raj Sharma", "9800000000");
        let b = record("atl g1 ", " RAJ SHARMA", "9800000000");
        assert_eq!(a.import_key(), b.import_key());
        assert_eq!(a.import_key().len(), 64);
        assert_ne!(a.import_key(), record("ATL G1", "Raj Sharma", "9800000001").import_key());
    }

    #[test]
    fn test_import_twice_inserts_once() {
        let conn = test_connection();
        new_group(&conn, "ATL G1", 500000.0, 25);
        let records = vec![
            record("ATL G1", "Raj Sharma", "9800000000"),
            record("ATL G1", "Priya Patel", "9800000001"),
            record("ATL G9", "Nobody", "9800000002"),
        ];
        let today = date(2026, 10, 17);

        let first = import_members(&conn, &records, today).unwrap();
        assert_eq!(first.inserted, 2);
        assert_eq!(first.rejected.len(), 1);
        assert_eq!(first.rejected[0].0, 4);

        let second = import_members(&conn, &records, today).unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 2);
        assert_eq!(list_members(&conn).unwrap().len(), 2);
    }

    #[test]
    fn test_load_member_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Group,Name,Phone,Email,Address,BC Holder,Join Date").unwrap();
        writeln!(file, "ATL G1,Raj Sharma,9800000000,,Mumbai,RAJESH PATEL (N08554),2026-01-15").unwrap();

        let records = load_member_csv(file.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].bc_holder, "RAJESH PATEL (N08554)");
        assert_eq!(records[0].address, "Mumbai");
    }

    #[test]
    fn test_export_tally_csv() {
        let conn = test_connection();
        let today = date(2026, 10, 17);
        seed_sample_data(&conn, today).unwrap();

        let rows = build_rows(&list_members(&conn).unwrap(), &list_groups(&conn).unwrap(), today);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tally.csv");

        let written = export_tally_csv(&rows, &path).unwrap();
        assert_eq!(written, 15);

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Member,Phone,Group,BC Holder,Join Date,EMI,EMI Paid,Pending,Penalty,Total Due,Status"
        );
        assert_eq!(content.lines().count(), 16);
    }

    #[test]
    fn test_seed_sample_data() {
        let conn = test_connection();
        let report = seed_sample_data(&conn, date(2026, 10, 17)).unwrap();

        assert_eq!(report, SeedReport { groups: 3, members: 15, auctions: 2, ledger_entries: 6 });

        let groups = list_groups(&conn).unwrap();
        assert!(groups.iter().all(|g| g.members_count == 5));
        assert_eq!(groups[0].emi_amount, 100000.0);
    }
}
