// 📒 Tally Sheet - every member's dues across all groups
// Joins members with their groups, classifies payment status and totals the
// filtered rows (pending + penalty = grand total).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entities::{Group, Member};
use crate::penalty::{calculate_penalty, PenaltyInput};

pub const UNKNOWN_GROUP: &str = "Unknown";

// ============================================================================
// STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Paid,
    Pending,
    Overdue,
}

impl PaymentStatus {
    /// Overdue means more than two installments behind
    pub fn classify(pending_amount: f64, group_emi: f64) -> Self {
        if pending_amount == 0.0 {
            PaymentStatus::Paid
        } else if pending_amount > 2.0 * group_emi {
            PaymentStatus::Overdue
        } else {
            PaymentStatus::Pending
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "Paid",
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Overdue => "Overdue",
        }
    }
}

// ============================================================================
// ROW
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyRow {
    pub member_id: String,
    pub name: String,
    pub phone: String,
    pub group_id: String,
    pub group_name: String,
    pub group_emi: f64,
    pub bc_holder: String,
    pub join_date: NaiveDate,
    pub emi_paid_count: i64,
    pub pending_amount: f64,
    pub is_prized: bool,
    pub penalty: f64,
    pub total_due: f64,
    pub status: PaymentStatus,
}

impl TallyRow {
    pub fn penalty_input(&self) -> PenaltyInput {
        PenaltyInput {
            pending_amount: self.pending_amount,
            join_date: self.join_date,
            emi_paid_count: self.emi_paid_count,
            is_prized: self.is_prized,
        }
    }
}

/// One enriched row per member, in member order. A member whose group no
/// longer exists gets group name "Unknown" and EMI 0.
pub fn build_rows(members: &[Member], groups: &[Group], as_of: NaiveDate) -> Vec<TallyRow> {
    let by_id: HashMap<&str, &Group> = groups.iter().map(|g| (g.id.as_str(), g)).collect();

    members
        .iter()
        .map(|m| {
            let group = by_id.get(m.group_id.as_str());
            let group_name = group.map(|g| g.name.clone()).unwrap_or_else(|| UNKNOWN_GROUP.to_string());
            let group_emi = group.map(|g| g.emi_amount).unwrap_or(0.0);

            let penalty = calculate_penalty(
                &PenaltyInput {
                    pending_amount: m.pending_amount,
                    join_date: m.join_date,
                    emi_paid_count: m.emi_paid_count,
                    is_prized: m.is_prized,
                },
                as_of,
            );

            TallyRow {
                member_id: m.id.clone(),
                name: m.name.clone(),
                phone: m.phone.clone(),
                group_id: m.group_id.clone(),
                group_name,
                group_emi,
                bc_holder: m.bc_holder.clone(),
                join_date: m.join_date,
                emi_paid_count: m.emi_paid_count,
                pending_amount: m.pending_amount,
                is_prized: m.is_prized,
                penalty,
                total_due: m.pending_amount + penalty,
                status: PaymentStatus::classify(m.pending_amount, group_emi),
            }
        })
        .collect()
}

// ============================================================================
// FILTER
// ============================================================================

/// Exact group-name match AND case-insensitive name substring.
/// Empty values do not filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TallyFilter {
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl TallyFilter {
    pub fn new(group: Option<&str>, name: Option<&str>) -> Self {
        TallyFilter {
            group: group.map(str::to_string),
            name: name.map(str::to_string),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.group_value().is_none() && self.name_value().is_none()
    }

    fn group_value(&self) -> Option<&str> {
        self.group.as_deref().filter(|g| !g.is_empty())
    }

    fn name_value(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }

    pub fn matches(&self, row: &TallyRow) -> bool {
        if let Some(group) = self.group_value() {
            if row.group_name != group {
                return false;
            }
        }

        if let Some(name) = self.name_value() {
            if !row.name.to_lowercase().contains(&name.to_lowercase()) {
                return false;
            }
        }

        true
    }

    /// Order-preserving filter
    pub fn apply<'a>(&self, rows: &'a [TallyRow]) -> Vec<&'a TallyRow> {
        rows.iter().filter(|row| self.matches(row)).collect()
    }
}

// ============================================================================
// SUMMARY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TallySummary {
    pub member_count: usize,
    pub total_pending: f64,
    pub total_penalty: f64,
    pub grand_total: f64,
}

pub fn summarize<'a, I>(rows: I) -> TallySummary
where
    I: IntoIterator<Item = &'a TallyRow>,
{
    let mut summary = TallySummary::default();
    for row in rows {
        summary.member_count += 1;
        summary.total_pending += row.pending_amount;
        summary.total_penalty += row.penalty;
    }
    summary.grand_total = summary.total_pending + summary.total_penalty;
    summary
}

/// Filtered rows plus their totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TallySheet {
    pub rows: Vec<TallyRow>,
    pub summary: TallySummary,
}

pub fn tally_sheet(members: &[Member], groups: &[Group], filter: &TallyFilter, as_of: NaiveDate) -> TallySheet {
    let all = build_rows(members, groups, as_of);
    let rows: Vec<TallyRow> = filter.apply(&all).into_iter().cloned().collect();
    let summary = summarize(&rows);

    TallySheet { rows, summary }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::entities::MemberStatus;
    use chrono::Utc;

    pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub(crate) fn group(id: &str, name: &str, emi: f64) -> Group {
        Group {
            id: id.to_string(),
            name: name.to_string(),
            total_chit_amount: emi * 25.0,
            emi_amount: emi,
            max_members: 25,
            members_count: 1,
            vacancies: 24,
            description: String::new(),
            created_at: Utc::now(),
        }
    }

    pub(crate) fn member(id: &str, group_id: &str, name: &str, pending: f64, paid: i64) -> Member {
        Member {
            id: id.to_string(),
            group_id: group_id.to_string(),
            name: name.to_string(),
            phone: "9876543210".to_string(),
            email: String::new(),
            address: String::new(),
            bc_holder: "RAJESH PATEL (N08554)".to_string(),
            bc_history: vec![],
            join_date: date(2026, 1, 5),
            end_date: None,
            status: MemberStatus::Active,
            is_prized: false,
            emi_paid_count: paid,
            pending_amount: pending,
            manual_pending_override: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    const TODAY: (i32, u32, u32) = (2026, 10, 17);

    fn today() -> NaiveDate {
        date(TODAY.0, TODAY.1, TODAY.2)
    }

    #[test]
    fn test_rows_join_group() {
        let groups = vec![group("g1", "Alpha", 1000.0)];
        let members = vec![member("m1", "g1", "Anand", 1000.0, 9)];

        let rows = build_rows(&members, &groups, today());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].group_name, "Alpha");
        assert_eq!(rows[0].group_emi, 1000.0);
        assert_eq!(rows[0].penalty, 0.0);
        assert_eq!(rows[0].total_due, 1000.0);
    }

    #[test]
    fn test_dangling_group_reference() {
        let members = vec![member("m1", "gone", "Anand", 500.0, 0)];

        let rows = build_rows(&members, &[], today());
        assert_eq!(rows[0].group_name, UNKNOWN_GROUP);
        assert_eq!(rows[0].group_emi, 0.0);
        assert_eq!(rows[0].status, PaymentStatus::Overdue);
    }

    #[test]
    fn test_totals() {
        let groups = vec![group("g1", "Alpha", 1000.0)];
        let members = vec![
            // 9 months elapsed, 9 paid: no penalty
            member("m1", "g1", "A", 500.0, 9),
            member("m2", "g1", "B", 0.0, 3),
            // behind, unprized: 3% of 1200
            member("m3", "g1", "C", 1200.0, 2),
        ];

        let sheet = tally_sheet(&members, &groups, &TallyFilter::default(), today());
        let penalties: Vec<f64> = sheet.rows.iter().map(|r| r.penalty).collect();
        assert_eq!(penalties, vec![0.0, 0.0, 36.0]);

        assert_eq!(sheet.summary.member_count, 3);
        assert_eq!(sheet.summary.total_pending, 1700.0);
        assert_eq!(sheet.summary.total_penalty, 36.0);
        assert_eq!(sheet.summary.grand_total, 1736.0);
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(PaymentStatus::classify(2500.0, 1000.0), PaymentStatus::Overdue);
        assert_eq!(PaymentStatus::classify(2000.0, 1000.0), PaymentStatus::Pending);
        assert_eq!(PaymentStatus::classify(1000.0, 1000.0), PaymentStatus::Pending);
        assert_eq!(PaymentStatus::classify(0.0, 1000.0), PaymentStatus::Paid);
    }

    #[test]
    fn test_filter_composes_and_preserves_order() {
        let groups = vec![group("g1", "Alpha", 1000.0), group("g2", "Beta", 1000.0)];
        let members = vec![
            member("m1", "g1", "Anand", 0.0, 0),
            member("m2", "g2", "Anand Rao", 0.0, 0),
            member("m3", "g1", "Bob", 0.0, 0),
            member("m4", "g1", "Shanti", 0.0, 0),
            member("m5", "g1", "DIANA", 0.0, 0),
        ];

        let filter = TallyFilter::new(Some("Alpha"), Some("an"));
        let sheet = tally_sheet(&members, &groups, &filter, today());
        let ids: Vec<&str> = sheet.rows.iter().map(|r| r.member_id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m4", "m5"]);
    }

    #[test]
    fn test_group_filter_is_exact() {
        let groups = vec![group("g1", "Alpha", 1000.0), group("g2", "Alpha 2", 1000.0)];
        let members = vec![member("m1", "g1", "A", 0.0, 0), member("m2", "g2", "B", 0.0, 0)];

        let filter = TallyFilter::new(Some("Alpha"), None);
        let sheet = tally_sheet(&members, &groups, &filter, today());
        assert_eq!(sheet.rows.len(), 1);
        assert_eq!(sheet.rows[0].member_id, "m1");
    }

    #[test]
    fn test_empty_filter_values_pass_everything() {
        let filter = TallyFilter::new(Some(""), Some(""));
        assert!(filter.is_empty());

        let groups = vec![group("g1", "Alpha", 1000.0)];
        let members = vec![member("m1", "g1", "A", 0.0, 0), member("m2", "g1", "B", 0.0, 0)];
        assert_eq!(tally_sheet(&members, &groups, &filter, today()).rows.len(), 2);
    }

    #[test]
    fn test_summary_of_filtered_rows_only() {
        let groups = vec![group("g1", "Alpha", 1000.0), group("g2", "Beta", 1000.0)];
        let members = vec![member("m1", "g1", "A", 300.0, 20), member("m2", "g2", "B", 700.0, 20)];

        let sheet = tally_sheet(&members, &groups, &TallyFilter::new(Some("Beta"), None), today());
        assert_eq!(sheet.summary.total_pending, 700.0);
        assert_eq!(sheet.summary.grand_total, 700.0);
    }
}
