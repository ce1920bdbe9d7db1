// Entity Models
// Each entity module holds the record type, its request payloads and the
// SQLite functions that read and write it.

pub mod group;
pub mod member;
pub mod payment;
pub mod auction;
pub mod ledger;

pub use group::{Group, NewGroup, GroupUpdate};
pub use member::{Member, MemberStatus, NewMember, MemberUpdate, BcHistoryEntry, BcTransfer, PendingEdit};
pub use payment::{Payment, PaymentType, NewPayment};
pub use auction::{Auction, AuctionStatus, AuctionInput};
pub use ledger::{LedgerEntry, LedgerScope, Direction, NewLedgerEntry, LedgerTotals, LedgerView};

/// Serde adapters for calendar dates sent by browsers either as
/// `2025-01-15` or as a full ISO timestamp
pub(crate) mod flexible_date {
    use chrono::NaiveDate;
    use serde::{de, Deserialize, Deserializer, Serializer};

    use crate::format::parse_iso_date;

    pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&date.format("%Y-%m-%d").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(d)?;
        parse_iso_date(&raw).ok_or_else(|| de::Error::custom(format!("invalid date: {}", raw)))
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
            match date {
                Some(d) => super::serialize(d, s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
            let raw: Option<String> = Option::deserialize(d)?;
            match raw {
                None => Ok(None),
                Some(s) if s.trim().is_empty() => Ok(None),
                Some(s) => parse_iso_date(&s)
                    .map(Some)
                    .ok_or_else(|| de::Error::custom(format!("invalid date: {}", s))),
            }
        }
    }
}

/// Current timestamp in the storage format
pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
