// Display formatting for rupee amounts and ISO dates (en-IN conventions)

use chrono::{DateTime, NaiveDate, NaiveDateTime};

pub const RUPEE: &str = "₹";

/// Group an integer's digits the Indian way: last three, then pairs.
/// 1234567 -> "12,34,567"
fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }

    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut end = head.len();
    while end > 0 {
        let start = end.saturating_sub(2);
        groups.push(&head[start..end]);
        end = start;
    }
    groups.reverse();

    format!("{},{}", groups.join(","), tail)
}

/// Currency string with no fraction digits, e.g. `₹1,23,457`
pub fn format_inr(amount: f64) -> String {
    let rounded = amount.round();
    let sign = if rounded < 0.0 { "-" } else { "" };
    let whole = format!("{:.0}", rounded.abs());
    format!("{}{}{}", sign, RUPEE, group_indian(&whole))
}

/// Plain grouped number with up to two fraction digits, e.g. `1,234.5`
pub fn format_amount(amount: f64) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    let fixed = format!("{:.2}", amount.abs());
    let (whole, frac) = fixed.split_once('.').unwrap_or((&fixed, "00"));
    let frac = frac.trim_end_matches('0');

    if frac.is_empty() {
        format!("{}{}", sign, group_indian(whole))
    } else {
        format!("{}{}.{}", sign, group_indian(whole), frac)
    }
}

/// Parse the date part of an ISO-8601 string.
/// Accepts `2025-01-15`, `2025-01-15T10:30:00`, with fraction or offset.
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.date());
    }

    // Fall back to the leading YYYY-MM-DD
    value
        .get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

/// Short display date, e.g. `17 Oct 2026`. Unparseable input is returned as-is.
pub fn format_date(value: &str) -> String {
    match parse_iso_date(value) {
        Some(date) => date.format("%-d %b %Y").to_string(),
        None => value.to_string(),
    }
}

/// Numeric display date, e.g. `17-10-2026`. Unparseable input is returned as-is.
pub fn format_date_dmy(value: &str) -> String {
    match parse_iso_date(value) {
        Some(date) => date.format("%d-%m-%Y").to_string(),
        None => value.to_string(),
    }
}
