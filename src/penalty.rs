// Late-payment penalty
//
// Rates are the business's current working policy: 6% of the pending amount
// for prized members, 3% for everyone else, charged once the member is behind
// on installments.

use chrono::NaiveDate;

use crate::dues::elapsed_months;

pub const PRIZED_RATE: f64 = 0.06;
pub const UNPRIZED_RATE: f64 = 0.03;

/// Everything the penalty depends on, detached from any stored record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PenaltyInput {
    pub pending_amount: f64,
    pub join_date: NaiveDate,
    pub emi_paid_count: i64,
    pub is_prized: bool,
}

impl PenaltyInput {
    pub fn rate(&self) -> f64 {
        if self.is_prized {
            PRIZED_RATE
        } else {
            UNPRIZED_RATE
        }
    }
}

/// Penalty owed as of `as_of`, in whole currency units. Never negative.
pub fn calculate_penalty(input: &PenaltyInput, as_of: NaiveDate) -> f64 {
    if input.pending_amount <= 0.0 {
        return 0.0;
    }

    let months = elapsed_months(input.join_date, as_of);
    if months <= input.emi_paid_count {
        return 0.0;
    }

    // pending > 0 here, so round() is round-half-up
    (input.pending_amount * input.rate()).round()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn input(pending: f64, paid: i64, prized: bool) -> PenaltyInput {
        PenaltyInput {
            pending_amount: pending,
            join_date: date(2026, 1, 10),
            emi_paid_count: paid,
            is_prized: prized,
        }
    }

    #[test]
    fn test_no_penalty_without_pending() {
        let today = date(2026, 10, 17);
        assert_eq!(calculate_penalty(&input(0.0, 0, true), today), 0.0);
        assert_eq!(calculate_penalty(&input(-250.0, 0, false), today), 0.0);
    }

    #[test]
    fn test_no_penalty_when_current() {
        // 9 months elapsed, 9 installments paid
        let today = date(2026, 10, 17);
        assert_eq!(calculate_penalty(&input(1000.0, 9, true), today), 0.0);
        assert_eq!(calculate_penalty(&input(1000.0, 12, false), today), 0.0);
    }

    #[test]
    fn test_prized_rate() {
        let today = date(2026, 10, 17);
        assert_eq!(calculate_penalty(&input(1000.0, 3, true), today), 60.0);
    }

    #[test]
    fn test_unprized_rate() {
        let today = date(2026, 10, 17);
        assert_eq!(calculate_penalty(&input(1000.0, 3, false), today), 30.0);
    }

    #[test]
    fn test_rounds_half_up() {
        let today = date(2026, 10, 17);
        // 3% of 1250 = 37.5
        assert_eq!(calculate_penalty(&input(1250.0, 0, false), today), 38.0);
        // 3% of 1210 = 36.3
        assert_eq!(calculate_penalty(&input(1210.0, 0, false), today), 36.0);
    }

    #[test]
    fn test_day_of_month_ignored() {
        let inp = PenaltyInput {
            pending_amount: 1000.0,
            join_date: date(2026, 9, 30),
            emi_paid_count: 0,
            is_prized: false,
        };
        // one calendar month even though only a day has passed
        assert_eq!(calculate_penalty(&inp, date(2026, 10, 1)), 30.0);
        assert_eq!(calculate_penalty(&inp, date(2026, 9, 30)), 0.0);
    }
}
