// Form state for the interactive views
//
// Every view keeps its editable state in one value and changes it only
// through `reduce(state, action)`. Submitting validates the state into the
// typed request the store accepts.

use chrono::NaiveDate;

use crate::entities::{Direction, NewLedgerEntry};
use crate::error::{AppError, Result};
use crate::format::parse_iso_date;
use crate::reminder::{ReminderChannel, ReminderRequest};
use crate::tally::{summarize, TallyFilter, TallyRow, TallySummary};

// ============================================================================
// TALLY SHEET
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReminderField {
    #[default]
    Message,
    Date,
    Time,
}

impl ReminderField {
    pub fn next(&self) -> Self {
        match self {
            ReminderField::Message => ReminderField::Date,
            ReminderField::Date => ReminderField::Time,
            ReminderField::Time => ReminderField::Message,
        }
    }
}

/// The reminder dialog. Date and time stay as typed text until submit.
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderForm {
    pub member_id: String,
    pub member_name: String,
    pub channel: ReminderChannel,
    pub message: String,
    pub date: String,
    pub time: String,
    pub field: ReminderField,
}

impl ReminderForm {
    pub fn from_draft(draft: ReminderRequest, member_name: &str) -> Self {
        ReminderForm {
            member_id: draft.member_id,
            member_name: member_name.to_string(),
            channel: draft.channel,
            message: draft.message,
            date: draft.schedule_date.format("%Y-%m-%d").to_string(),
            time: draft.schedule_time,
            field: ReminderField::Message,
        }
    }

    fn field_mut(&mut self) -> &mut String {
        match self.field {
            ReminderField::Message => &mut self.message,
            ReminderField::Date => &mut self.date,
            ReminderField::Time => &mut self.time,
        }
    }

    pub fn submit(&self) -> Result<ReminderRequest> {
        let schedule_date = parse_iso_date(&self.date)
            .ok_or_else(|| AppError::validation(format!("Invalid schedule date: {}", self.date)))?;

        let request = ReminderRequest {
            member_id: self.member_id.clone(),
            channel: self.channel,
            message: self.message.clone(),
            schedule_date,
            schedule_time: self.time.trim().to_string(),
        };
        request.validate()?;
        Ok(request)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TallyViewState {
    pub rows: Vec<TallyRow>,
    pub group_names: Vec<String>,
    pub filter: TallyFilter,
    pub editing_name: bool,
    /// Index into the visible rows
    pub selected: Option<usize>,
    pub reminder: Option<ReminderForm>,
    pub notice: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TallyAction {
    Loaded { rows: Vec<TallyRow>, group_names: Vec<String> },
    NextGroup,
    ClearFilters,
    StartNameFilter,
    StopNameFilter,
    Input(char),
    Backspace,
    SelectNext,
    SelectPrevious,
    OpenReminder { business_name: String, today: NaiveDate },
    CloseReminder,
    NextField,
    CycleChannel,
    Newline,
    Scheduled(String),
    Failed(String),
}

impl TallyViewState {
    pub fn visible(&self) -> Vec<&TallyRow> {
        self.filter.apply(&self.rows)
    }

    pub fn summary(&self) -> TallySummary {
        summarize(self.visible())
    }

    pub fn selected_row(&self) -> Option<&TallyRow> {
        self.selected.and_then(|i| self.visible().get(i).copied())
    }

    pub fn group_label(&self) -> &str {
        self.filter.group.as_deref().unwrap_or("All Groups")
    }

    fn reset_selection(mut self) -> Self {
        self.selected = if self.visible().is_empty() { None } else { Some(0) };
        self
    }
}

pub fn reduce_tally(mut state: TallyViewState, action: TallyAction) -> TallyViewState {
    // The dialog captures text input while open
    if let Some(mut form) = state.reminder.take() {
        match action {
            TallyAction::CloseReminder => {}
            TallyAction::Input(c) => {
                form.field_mut().push(c);
                state.reminder = Some(form);
            }
            TallyAction::Backspace => {
                form.field_mut().pop();
                state.reminder = Some(form);
            }
            TallyAction::Newline => {
                if form.field == ReminderField::Message {
                    form.message.push('\n');
                }
                state.reminder = Some(form);
            }
            TallyAction::NextField => {
                form.field = form.field.next();
                state.reminder = Some(form);
            }
            TallyAction::CycleChannel => {
                form.channel = form.channel.next();
                state.reminder = Some(form);
            }
            TallyAction::Scheduled(ack) => state.notice = Some(ack),
            TallyAction::Failed(msg) => {
                state.notice = Some(msg);
                state.reminder = Some(form);
            }
            _ => state.reminder = Some(form),
        }
        return state;
    }

    match action {
        TallyAction::Loaded { rows, group_names } => {
            state.rows = rows;
            state.group_names = group_names;
            // a group that disappeared no longer filters
            if let Some(group) = &state.filter.group {
                if !state.group_names.contains(group) {
                    state.filter.group = None;
                }
            }
            state.reset_selection()
        }
        TallyAction::NextGroup => {
            state.filter.group = match &state.filter.group {
                None => state.group_names.first().cloned(),
                Some(current) => {
                    let pos = state.group_names.iter().position(|g| g == current);
                    pos.and_then(|i| state.group_names.get(i + 1)).cloned()
                }
            };
            state.reset_selection()
        }
        TallyAction::ClearFilters => {
            state.filter = TallyFilter::default();
            state.editing_name = false;
            state.reset_selection()
        }
        TallyAction::StartNameFilter => {
            state.editing_name = true;
            state
        }
        TallyAction::StopNameFilter => {
            state.editing_name = false;
            state
        }
        TallyAction::Input(c) if state.editing_name => {
            state.filter.name.get_or_insert_with(String::new).push(c);
            state.reset_selection()
        }
        TallyAction::Backspace if state.editing_name => {
            if let Some(name) = state.filter.name.as_mut() {
                name.pop();
                if name.is_empty() {
                    state.filter.name = None;
                }
            }
            state.reset_selection()
        }
        TallyAction::SelectNext => {
            let len = state.visible().len();
            if len > 0 {
                state.selected = Some(match state.selected {
                    Some(i) if i + 1 < len => i + 1,
                    _ => 0,
                });
            }
            state
        }
        TallyAction::SelectPrevious => {
            let len = state.visible().len();
            if len > 0 {
                state.selected = Some(match state.selected {
                    Some(0) | None => len - 1,
                    Some(i) => i - 1,
                });
            }
            state
        }
        TallyAction::OpenReminder { business_name, today } => {
            if let Some(row) = state.selected_row() {
                let draft = ReminderRequest::draft(row, &business_name, today);
                let form = ReminderForm::from_draft(draft, &row.name);
                state.reminder = Some(form);
                state.notice = None;
            }
            state
        }
        TallyAction::Scheduled(msg) | TallyAction::Failed(msg) => {
            state.notice = Some(msg);
            state
        }
        _ => state,
    }
}

// ============================================================================
// LEDGER ENTRY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LedgerField {
    #[default]
    Amount,
    BcHolder,
    Description,
    Date,
}

impl LedgerField {
    pub fn next(&self) -> Self {
        match self {
            LedgerField::Amount => LedgerField::BcHolder,
            LedgerField::BcHolder => LedgerField::Description,
            LedgerField::Description => LedgerField::Date,
            LedgerField::Date => LedgerField::Amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerForm {
    pub direction: Direction,
    pub amount: String,
    pub bc_holder: String,
    pub description: String,
    pub date: String,
    pub field: LedgerField,
}

impl LedgerForm {
    pub fn new(today: NaiveDate) -> Self {
        LedgerForm {
            direction: Direction::Received,
            amount: String::new(),
            bc_holder: String::new(),
            description: String::new(),
            date: today.format("%Y-%m-%d").to_string(),
            field: LedgerField::Amount,
        }
    }

    fn field_mut(&mut self) -> &mut String {
        match self.field {
            LedgerField::Amount => &mut self.amount,
            LedgerField::BcHolder => &mut self.bc_holder,
            LedgerField::Description => &mut self.description,
            LedgerField::Date => &mut self.date,
        }
    }

    pub fn submit(&self) -> Result<NewLedgerEntry> {
        let amount: f64 = self
            .amount
            .trim()
            .replace(',', "")
            .parse()
            .map_err(|_| AppError::validation("Please enter a valid amount"))?;
        if !(amount > 0.0) || !amount.is_finite() {
            return Err(AppError::validation("Please enter a valid amount"));
        }

        let date = parse_iso_date(&self.date)
            .ok_or_else(|| AppError::validation(format!("Invalid date: {}", self.date)))?;

        let bc_holder = Some(self.bc_holder.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(NewLedgerEntry {
            direction: self.direction,
            amount,
            bc_holder,
            description: self.description.trim().to_string(),
            date,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerAction {
    ToggleDirection,
    NextField,
    Input(char),
    Backspace,
    Reset(NaiveDate),
}

pub fn reduce_ledger(mut form: LedgerForm, action: LedgerAction) -> LedgerForm {
    match action {
        LedgerAction::ToggleDirection => {
            form.direction = match form.direction {
                Direction::Received => Direction::Sent,
                Direction::Sent => Direction::Received,
            };
        }
        LedgerAction::NextField => form.field = form.field.next(),
        LedgerAction::Input(c) => {
            if form.field == LedgerField::Amount && !(c.is_ascii_digit() || c == '.' || c == ',') {
                return form;
            }
            form.field_mut().push(c);
        }
        LedgerAction::Backspace => {
            form.field_mut().pop();
        }
        LedgerAction::Reset(today) => return LedgerForm::new(today),
    }
    form
}
