// Chit Fund Manager - Core Library
// Exposes all modules for use in the CLI, the API server and tests

pub mod config;
pub mod error;
pub mod format;
pub mod db;
pub mod dues;
pub mod penalty;
pub mod entities;
pub mod tally;
pub mod reminder;
pub mod dashboard;
pub mod import;
pub mod forms;

#[cfg(feature = "tui")]
pub mod ui;

#[cfg(feature = "server")]
pub mod api;

#[cfg(feature = "client")]
pub mod client;

// Re-export commonly used types
pub use config::{init_logging, Settings};
pub use error::{AppError, Result};
pub use db::{open_database, setup_database, insert_event, record_event, get_events_for_entity, Event};
pub use penalty::{calculate_penalty, PenaltyInput};
pub use tally::{build_rows, summarize, tally_sheet, PaymentStatus, TallyFilter, TallyRow, TallySheet, TallySummary};
pub use reminder::{compose_message, Reminder, ReminderAck, ReminderChannel, ReminderRequest};
pub use dashboard::DashboardStats;
pub use entities::{
    Group, NewGroup, GroupUpdate,
    Member, MemberStatus, NewMember, MemberUpdate, BcHistoryEntry, BcTransfer, PendingEdit,
    Payment, PaymentType, NewPayment,
    Auction, AuctionStatus, AuctionInput,
    LedgerEntry, LedgerScope, Direction, NewLedgerEntry, LedgerTotals, LedgerView,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
