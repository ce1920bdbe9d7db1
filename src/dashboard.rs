// Dashboard statistics

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entities::group::list_groups;
use crate::entities::member::list_members;
use crate::entities::payment::list_payments;
use crate::entities::{Group, Member, MemberStatus, Payment};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_groups: i64,
    pub active_groups: i64,
    pub closed_groups: i64,
    pub total_members: i64,
    pub active_members: i64,
    pub inactive_members: i64,
    pub total_collection: f64,

    /// Payments of the last 30 days
    pub monthly_collection: f64,
    pub total_pending: f64,

    /// Pending of members more than two EMIs behind
    pub overdue_pending: f64,
}

pub fn compute_stats(groups: &[Group], members: &[Member], payments: &[Payment], now: DateTime<Utc>) -> DashboardStats {
    let total_groups = groups.len() as i64;
    let active_groups = groups.iter().filter(|g| g.members_count > 0).count() as i64;

    let total_members = members.len() as i64;
    let active_members = members.iter().filter(|m| m.status == MemberStatus::Active).count() as i64;

    let total_collection: f64 = payments.iter().map(|p| p.amount).sum();
    let cutoff = now - Duration::days(30);
    let monthly_collection: f64 = payments
        .iter()
        .filter(|p| p.payment_date > cutoff)
        .map(|p| p.amount)
        .sum();

    let emi_by_group: HashMap<&str, f64> = groups.iter().map(|g| (g.id.as_str(), g.emi_amount)).collect();

    let mut total_pending = 0.0;
    let mut overdue_pending = 0.0;
    for member in members {
        total_pending += member.pending_amount;

        // Members of a deleted group never count as overdue
        if let Some(emi) = emi_by_group.get(member.group_id.as_str()) {
            if member.pending_amount > emi * 2.0 {
                overdue_pending += member.pending_amount;
            }
        }
    }

    DashboardStats {
        total_groups,
        active_groups,
        closed_groups: total_groups - active_groups,
        total_members,
        active_members,
        inactive_members: total_members - active_members,
        total_collection,
        monthly_collection,
        total_pending,
        overdue_pending,
    }
}

pub fn dashboard_stats(conn: &Connection) -> Result<DashboardStats> {
    let groups = list_groups(conn)?;
    let members = list_members(conn)?;
    let payments = list_payments(conn)?;

    Ok(compute_stats(&groups, &members, &payments, Utc::now()))
}
