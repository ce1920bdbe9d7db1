// Installment arithmetic: elapsed months, pending dues, group EMI

use chrono::{Datelike, NaiveDate};

/// Whole calendar months between two dates, ignoring day-of-month.
/// Negative when `to` is before `from`.
pub fn elapsed_months(from: NaiveDate, to: NaiveDate) -> i64 {
    let years = to.year() as i64 - from.year() as i64;
    let months = to.month() as i64 - from.month() as i64;
    years * 12 + months
}

/// Pending amount owed as of `today`.
///
/// The joining month is itself due, so a member who joined this month
/// already owes one installment.
pub fn calculate_pending(join_date: NaiveDate, emi_amount: f64, emi_paid: i64, today: NaiveDate) -> f64 {
    if emi_amount <= 0.0 {
        return 0.0;
    }

    let months_due = elapsed_months(join_date, today) + 1;
    let total_due = months_due as f64 * emi_amount;
    let paid = emi_paid as f64 * emi_amount;

    (total_due - paid).max(0.0)
}

/// Per-period installment for a pool split across the active members
pub fn emi_amount(total_chit_amount: f64, members_count: i64) -> f64 {
    if members_count > 0 {
        (total_chit_amount / members_count as f64).round()
    } else {
        0.0
    }
}

/// Derived group figures after membership changes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupFigures {
    pub members_count: i64,
    pub emi_amount: f64,
    pub vacancies: i64,
}

pub fn group_figures(total_chit_amount: f64, max_members: i64, active_members: i64) -> GroupFigures {
    GroupFigures {
        members_count: active_members,
        emi_amount: emi_amount(total_chit_amount, active_members),
        vacancies: max_members - active_members,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_elapsed_months_ignores_day() {
        assert_eq!(elapsed_months(date(2025, 1, 31), date(2025, 2, 1)), 1);
        assert_eq!(elapsed_months(date(2025, 1, 1), date(2025, 1, 31)), 0);
        assert_eq!(elapsed_months(date(2024, 11, 15), date(2026, 2, 3)), 15);
        assert_eq!(elapsed_months(date(2026, 3, 1), date(2026, 1, 1)), -2);
    }

    #[test]
    fn test_pending_counts_joining_month() {
        let join = date(2026, 10, 5);
        assert_eq!(calculate_pending(join, 1000.0, 0, date(2026, 10, 17)), 1000.0);
        assert_eq!(calculate_pending(join, 1000.0, 0, date(2027, 1, 1)), 4000.0);
        assert_eq!(calculate_pending(join, 1000.0, 3, date(2027, 1, 1)), 1000.0);
    }

    #[test]
    fn test_pending_never_negative() {
        let join = date(2026, 10, 5);
        assert_eq!(calculate_pending(join, 1000.0, 12, date(2026, 12, 1)), 0.0);
        assert_eq!(calculate_pending(join, 0.0, 0, date(2027, 12, 1)), 0.0);
    }

    #[test]
    fn test_emi_amount_rounds() {
        assert_eq!(emi_amount(500000.0, 25), 20000.0);
        assert_eq!(emi_amount(100000.0, 3), 33333.0);
        assert_eq!(emi_amount(100000.0, 0), 0.0);
    }

    #[test]
    fn test_group_figures() {
        let figures = group_figures(250000.0, 25, 10);
        assert_eq!(figures.members_count, 10);
        assert_eq!(figures.emi_amount, 25000.0);
        assert_eq!(figures.vacancies, 15);
    }
}
