use crate::entities::ledger::{create_entry, delete_entry, ledger_view};
use crate::entities::{Direction as EntryDirection, LedgerScope, LedgerView};
use crate::forms::{
    reduce_ledger, reduce_tally, LedgerAction, LedgerField, LedgerForm, ReminderField, ReminderForm, TallyAction,
    TallyViewState,
};
use crate::format::{format_date, format_inr};
use crate::reminder::schedule_reminder;
use crate::tally::{build_rows, PaymentStatus};
use crate::entities::group::list_groups;
use crate::entities::member::list_members;
use anyhow::Result;
use chrono::NaiveDate;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use rusqlite::Connection;
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    TallySheet,
    Ledger,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::TallySheet => Page::Ledger,
            Page::Ledger => Page::TallySheet,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::TallySheet => "Tally Sheet",
            Page::Ledger => "Expenses",
        }
    }
}

/// What a key press asks the app to do
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Quit,
    NextPage,
    Reload,
    Tally(TallyAction),
    SubmitReminder,
    ToggleScope,
    LedgerNext,
    LedgerPrevious,
    OpenLedgerForm,
    CloseLedgerForm,
    Ledger(LedgerAction),
    SubmitLedger,
    DeleteLedgerEntry,
}

pub struct App {
    conn: Connection,
    pub business_name: String,
    pub today: NaiveDate,
    pub current_page: Page,
    pub tally: TallyViewState,
    pub tally_table: TableState,
    pub scope: LedgerScope,
    pub ledger: LedgerView,
    pub ledger_table: TableState,
    pub ledger_form: Option<LedgerForm>,
    pub notice: Option<String>,
}

impl App {
    pub fn new(conn: Connection, business_name: &str, today: NaiveDate) -> Result<Self> {
        let ledger = ledger_view(&conn, LedgerScope::Business)?;
        let mut app = Self {
            conn,
            business_name: business_name.to_string(),
            today,
            current_page: Page::TallySheet,
            tally: TallyViewState::default(),
            tally_table: TableState::default(),
            scope: LedgerScope::Business,
            ledger,
            ledger_table: TableState::default(),
            ledger_form: None,
            notice: None,
        };
        app.reload()?;
        Ok(app)
    }

    pub fn reload(&mut self) -> Result<()> {
        let groups = list_groups(&self.conn)?;
        let members = list_members(&self.conn)?;
        let rows = build_rows(&members, &groups, self.today);
        let group_names = groups.into_iter().map(|g| g.name).collect();
        self.dispatch(TallyAction::Loaded { rows, group_names });
        self.reload_ledger()
    }

    fn reload_ledger(&mut self) -> Result<()> {
        self.ledger = ledger_view(&self.conn, self.scope)?;
        let selected = match self.ledger_table.selected() {
            _ if self.ledger.transactions.is_empty() => None,
            Some(i) => Some(i.min(self.ledger.transactions.len() - 1)),
            None => Some(0),
        };
        self.ledger_table.select(selected);
        Ok(())
    }

    fn dispatch(&mut self, action: TallyAction) {
        self.tally = reduce_tally(std::mem::take(&mut self.tally), action);
    }

    /// Map a key press to a command given the current page and open dialogs
    pub fn command_for(&self, key: KeyEvent) -> Option<Command> {
        // Some terminals also report releases and repeats
        if key.kind != KeyEventKind::Press {
            return None;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        if self.tally.reminder.is_some() {
            return match key.code {
                KeyCode::Esc => Some(Command::Tally(TallyAction::CloseReminder)),
                KeyCode::Char('s') if ctrl => Some(Command::SubmitReminder),
                KeyCode::Tab => Some(Command::Tally(TallyAction::NextField)),
                KeyCode::F(2) => Some(Command::Tally(TallyAction::CycleChannel)),
                KeyCode::Enter => Some(Command::Tally(TallyAction::Newline)),
                KeyCode::Backspace => Some(Command::Tally(TallyAction::Backspace)),
                KeyCode::Char(c) => Some(Command::Tally(TallyAction::Input(c))),
                _ => None,
            };
        }

        if self.ledger_form.is_some() {
            return match key.code {
                KeyCode::Esc => Some(Command::CloseLedgerForm),
                KeyCode::Enter => Some(Command::SubmitLedger),
                KeyCode::Tab => Some(Command::Ledger(LedgerAction::NextField)),
                KeyCode::F(2) => Some(Command::Ledger(LedgerAction::ToggleDirection)),
                KeyCode::Backspace => Some(Command::Ledger(LedgerAction::Backspace)),
                KeyCode::Char(c) => Some(Command::Ledger(LedgerAction::Input(c))),
                _ => None,
            };
        }

        if self.tally.editing_name {
            return match key.code {
                KeyCode::Esc | KeyCode::Enter => Some(Command::Tally(TallyAction::StopNameFilter)),
                KeyCode::Backspace => Some(Command::Tally(TallyAction::Backspace)),
                KeyCode::Char(c) => Some(Command::Tally(TallyAction::Input(c))),
                _ => None,
            };
        }

        match (self.current_page, key.code) {
            (_, KeyCode::Char('q')) | (_, KeyCode::Esc) => Some(Command::Quit),
            (_, KeyCode::Tab) => Some(Command::NextPage),
            (_, KeyCode::F(5)) => Some(Command::Reload),
            (Page::TallySheet, KeyCode::Down) | (Page::TallySheet, KeyCode::Char('j')) => {
                Some(Command::Tally(TallyAction::SelectNext))
            }
            (Page::TallySheet, KeyCode::Up) | (Page::TallySheet, KeyCode::Char('k')) => {
                Some(Command::Tally(TallyAction::SelectPrevious))
            }
            (Page::TallySheet, KeyCode::Char('g')) => Some(Command::Tally(TallyAction::NextGroup)),
            (Page::TallySheet, KeyCode::Char('/')) => Some(Command::Tally(TallyAction::StartNameFilter)),
            (Page::TallySheet, KeyCode::Char('c')) => Some(Command::Tally(TallyAction::ClearFilters)),
            (Page::TallySheet, KeyCode::Char('r')) | (Page::TallySheet, KeyCode::Enter) => {
                Some(Command::Tally(TallyAction::OpenReminder {
                    business_name: self.business_name.clone(),
                    today: self.today,
                }))
            }
            (Page::Ledger, KeyCode::Down) | (Page::Ledger, KeyCode::Char('j')) => Some(Command::LedgerNext),
            (Page::Ledger, KeyCode::Up) | (Page::Ledger, KeyCode::Char('k')) => Some(Command::LedgerPrevious),
            (Page::Ledger, KeyCode::Char('s')) => Some(Command::ToggleScope),
            (Page::Ledger, KeyCode::Char('n')) => Some(Command::OpenLedgerForm),
            (Page::Ledger, KeyCode::Char('d')) => Some(Command::DeleteLedgerEntry),
            _ => None,
        }
    }

    /// Apply a command. Returns false when the app should exit.
    pub fn apply(&mut self, command: Command) -> Result<bool> {
        match command {
            Command::Quit => return Ok(false),
            Command::NextPage => self.current_page = self.current_page.next(),
            Command::Reload => {
                self.reload()?;
                self.notice = Some("Reloaded".to_string());
            }
            Command::Tally(action) => self.dispatch(action),
            Command::SubmitReminder => self.submit_reminder(),
            Command::ToggleScope => {
                self.scope = match self.scope {
                    LedgerScope::Business => LedgerScope::Personal,
                    LedgerScope::Personal => LedgerScope::Business,
                };
                self.ledger_table.select(None);
                self.reload_ledger()?;
            }
            Command::LedgerNext => self.move_ledger_selection(1),
            Command::LedgerPrevious => self.move_ledger_selection(-1),
            Command::OpenLedgerForm => self.ledger_form = Some(LedgerForm::new(self.today)),
            Command::CloseLedgerForm => self.ledger_form = None,
            Command::Ledger(action) => {
                self.ledger_form = self.ledger_form.take().map(|form| reduce_ledger(form, action));
            }
            Command::SubmitLedger => self.submit_ledger()?,
            Command::DeleteLedgerEntry => {
                if let Some(entry) = self.ledger_table.selected().and_then(|i| self.ledger.transactions.get(i)) {
                    let id = entry.id.clone();
                    match delete_entry(&self.conn, self.scope, &id) {
                        Ok(()) => self.notice = Some("Entry deleted".to_string()),
                        Err(e) => self.notice = Some(e.to_string()),
                    }
                    self.reload_ledger()?;
                }
            }
        }
        Ok(true)
    }

    fn submit_reminder(&mut self) {
        let Some(form) = self.tally.reminder.as_ref() else {
            return;
        };

        let outcome = form
            .submit()
            .and_then(|request| schedule_reminder(&self.conn, &request));

        let action = match outcome {
            Ok(ack) => TallyAction::Scheduled(ack.acknowledgment.replace('\n', " ")),
            Err(e) => TallyAction::Failed(e.to_string()),
        };
        self.dispatch(action);
    }

    fn submit_ledger(&mut self) -> Result<()> {
        let Some(form) = self.ledger_form.as_ref() else {
            return Ok(());
        };

        match form.submit().and_then(|entry| create_entry(&self.conn, self.scope, &entry)) {
            Ok(_) => {
                self.ledger_form = None;
                self.notice = Some("Transaction added".to_string());
                self.reload_ledger()?;
            }
            Err(e) => self.notice = Some(e.to_string()),
        }
        Ok(())
    }

    fn move_ledger_selection(&mut self, delta: isize) {
        let len = self.ledger.transactions.len() as isize;
        if len == 0 {
            return;
        }
        let current = self.ledger_table.selected().unwrap_or(0) as isize;
        let next = (current + delta).rem_euclid(len);
        self.ledger_table.select(Some(next as usize));
    }

    fn status_message(&self) -> Option<&str> {
        self.tally.notice.as_deref().or(self.notice.as_deref())
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if let Some(command) = app.command_for(key) {
                if !app.apply(command)? {
                    return Ok(());
                }
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::TallySheet => render_tally(f, chunks[1], app),
        Page::Ledger => render_ledger(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);

    if let Some(form) = &app.tally.reminder {
        render_reminder_dialog(f, form);
    }
    if let Some(form) = &app.ledger_form {
        render_ledger_dialog(f, form, app.scope);
    }
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![];
    for (i, page) in [Page::TallySheet, Page::Ledger].iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" │ "));
        }
        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(page.title().to_string(), style));
    }

    spans.push(Span::raw("  |  "));
    match app.current_page {
        Page::TallySheet => {
            let summary = app.tally.summary();
            spans.push(Span::raw(format!("Members: {}  ", summary.member_count)));
            spans.push(Span::styled(
                format!("Pending: {}  ", format_inr(summary.total_pending)),
                Style::default().fg(Color::Yellow),
            ));
            spans.push(Span::styled(
                format!("Penalty: {}  ", format_inr(summary.total_penalty)),
                Style::default().fg(Color::Red),
            ));
            spans.push(Span::styled(
                format!("Grand Total: {}", format_inr(summary.grand_total)),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ));
        }
        Page::Ledger => {
            let totals = &app.ledger.totals;
            spans.push(Span::styled(
                format!("Received: {}  ", format_inr(totals.total_received)),
                Style::default().fg(Color::Green),
            ));
            spans.push(Span::styled(
                format!("Sent: {}  ", format_inr(totals.total_sent)),
                Style::default().fg(Color::Red),
            ));
            spans.push(Span::styled(
                format!("Balance: {}", format_inr(totals.balance)),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ));
        }
    }

    let header = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));
    f.render_widget(header, area);
}

fn status_color(status: PaymentStatus) -> Color {
    match status {
        PaymentStatus::Paid => Color::Green,
        PaymentStatus::Pending => Color::Yellow,
        PaymentStatus::Overdue => Color::Red,
    }
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    let cells = titles.iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    Row::new(cells).height(1).bottom_margin(1)
}

fn render_tally(f: &mut Frame, area: Rect, app: &mut App) {
    let rows: Vec<Row> = app
        .tally
        .visible()
        .into_iter()
        .map(|row| {
            let penalty_style = if row.penalty > 0.0 {
                Style::default().fg(Color::Red)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            Row::new(vec![
                Cell::from(truncate(&row.name, 22)),
                Cell::from(row.group_name.clone()),
                Cell::from(truncate(&row.bc_holder, 24)),
                Cell::from(format_inr(row.group_emi)),
                Cell::from(row.emi_paid_count.to_string()),
                Cell::from(format_inr(row.pending_amount)),
                Cell::from(format_inr(row.penalty)).style(penalty_style),
                Cell::from(format_inr(row.total_due)),
                Cell::from(row.status.as_str()).style(Style::default().fg(status_color(row.status))),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(22),
        Constraint::Length(10),
        Constraint::Length(24),
        Constraint::Length(11),
        Constraint::Length(5),
        Constraint::Length(12),
        Constraint::Length(10),
        Constraint::Length(12),
        Constraint::Length(8),
    ];

    let title = format!(" {} · {} ", app.tally.group_label(), app.today.format("%d %b %Y"));
    let table = Table::new(rows, widths)
        .header(header_row(&[
            "Member", "Group", "BC Holder", "EMI", "Paid", "Pending", "Penalty", "Total Due", "Status",
        ]))
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("▶ ");

    app.tally_table.select(app.tally.selected);
    f.render_stateful_widget(table, area, &mut app.tally_table);
}

fn render_ledger(f: &mut Frame, area: Rect, app: &mut App) {
    let rows: Vec<Row> = app
        .ledger
        .transactions
        .iter()
        .map(|entry| {
            let (label, color) = match entry.direction {
                EntryDirection::Received => ("Received", Color::Green),
                EntryDirection::Sent => ("Sent", Color::Red),
            };
            Row::new(vec![
                Cell::from(format_date(&entry.date.to_string())),
                Cell::from(label).style(Style::default().fg(color)),
                Cell::from(format_inr(entry.amount)),
                Cell::from(entry.bc_holder.clone().unwrap_or_else(|| "-".to_string())),
                Cell::from(entry.description.clone()),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(12),
        Constraint::Length(9),
        Constraint::Length(12),
        Constraint::Length(36),
        Constraint::Min(20),
    ];

    let title = match app.scope {
        LedgerScope::Business => " Business Expenses ",
        LedgerScope::Personal => " Personal Expenses ",
    };
    let table = Table::new(rows, widths)
        .header(header_row(&["Date", "Type", "Amount", "BC Holder", "Description"]))
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("▶ ");

    f.render_stateful_widget(table, area, &mut app.ledger_table);
}

fn key_hint(spans: &mut Vec<Span<'static>>, key: &'static str, label: &'static str) {
    spans.push(Span::styled(key, Style::default().fg(Color::Yellow)));
    spans.push(Span::raw(format!(" {} | ", label)));
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut spans: Vec<Span<'static>> = vec![];

    if let Some(message) = app.status_message() {
        spans.push(Span::styled(format!(" {} ", truncate(message, 80)), Style::default().fg(Color::Green)));
        spans.push(Span::raw("| "));
    }

    match app.current_page {
        Page::TallySheet if app.tally.editing_name => {
            let name = app.tally.filter.name.clone().unwrap_or_default();
            spans.push(Span::styled(format!(" Search: {}_ ", name), Style::default().fg(Color::Cyan)));
            key_hint(&mut spans, "Enter", "Done");
        }
        Page::TallySheet => {
            key_hint(&mut spans, "g", "Group");
            key_hint(&mut spans, "/", "Search");
            key_hint(&mut spans, "c", "Clear");
            key_hint(&mut spans, "r", "Remind");
        }
        Page::Ledger => {
            key_hint(&mut spans, "n", "New");
            key_hint(&mut spans, "d", "Delete");
            key_hint(&mut spans, "s", "Scope");
        }
    }
    key_hint(&mut spans, "Tab", "Page");
    spans.push(Span::styled("q", Style::default().fg(Color::Yellow)));
    spans.push(Span::raw(" Quit"));

    let status = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(status, area);
}

fn field_style(active: bool) -> Style {
    if active {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    }
}

fn render_reminder_dialog(f: &mut Frame, form: &ReminderForm) {
    let area = centered_rect(70, 80, f.size());
    f.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(vec![
            Span::raw("To: "),
            Span::styled(form.member_name.clone(), Style::default().add_modifier(Modifier::BOLD)),
        ]),
        Line::from(vec![
            Span::raw("Mode (F2): "),
            Span::styled(form.channel.label(), Style::default().fg(Color::Cyan)),
        ]),
        Line::from(vec![
            Span::styled("Date: ", field_style(form.field == ReminderField::Date)),
            Span::raw(form.date.clone()),
            Span::raw("   "),
            Span::styled("Time: ", field_style(form.field == ReminderField::Time)),
            Span::raw(form.time.clone()),
        ]),
        Line::from(""),
        Line::from(Span::styled("Message:", field_style(form.field == ReminderField::Message))),
    ];
    lines.extend(form.message.lines().map(|l| Line::from(l.to_string())));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Tab field · Ctrl+S schedule · Esc cancel",
        Style::default().fg(Color::DarkGray),
    )));

    let dialog = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(" Send Payment Reminder "));
    f.render_widget(dialog, area);
}

fn render_ledger_dialog(f: &mut Frame, form: &LedgerForm, scope: LedgerScope) {
    let area = centered_rect(50, 40, f.size());
    f.render_widget(Clear, area);

    let direction = match form.direction {
        EntryDirection::Received => "Money Received",
        EntryDirection::Sent => "Money Sent",
    };
    let lines = vec![
        Line::from(vec![Span::raw("Type (F2): "), Span::styled(direction, Style::default().fg(Color::Cyan))]),
        Line::from(vec![
            Span::styled("Amount: ", field_style(form.field == LedgerField::Amount)),
            Span::raw(form.amount.clone()),
        ]),
        Line::from(vec![
            Span::styled("BC Holder: ", field_style(form.field == LedgerField::BcHolder)),
            Span::raw(form.bc_holder.clone()),
        ]),
        Line::from(vec![
            Span::styled("Description: ", field_style(form.field == LedgerField::Description)),
            Span::raw(form.description.clone()),
        ]),
        Line::from(vec![
            Span::styled("Date: ", field_style(form.field == LedgerField::Date)),
            Span::raw(form.date.clone()),
        ]),
        Line::from(""),
        Line::from(Span::styled("Tab field · Enter save · Esc cancel", Style::default().fg(Color::DarkGray))),
    ];

    let title = format!(" Add {} Transaction ", scope.as_str());
    let dialog = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(dialog, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;
    use crate::import::seed_sample_data;
    use crate::reminder::list_reminders;
    use ratatui::backend::TestBackend;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app() -> App {
        let conn = test_connection();
        let today = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        seed_sample_data(&conn, today).unwrap();
        App::new(conn, "KA Associates", today).unwrap()
    }

    fn press(app: &mut App, code: KeyCode) -> bool {
        match app.command_for(key(code)) {
            Some(command) => app.apply(command).unwrap(),
            None => true,
        }
    }

    #[test]
    fn test_loads_seeded_rows() {
        let app = app();
        assert_eq!(app.tally.rows.len(), 15);
        assert_eq!(app.tally.group_names, vec!["ATL G1", "ATL G2", "ATL G3"]);
        assert_eq!(app.ledger.transactions.len(), 3);
        assert_eq!(app.ledger.totals.balance, 60000.0);
    }

    #[test]
    fn test_key_release_is_ignored() {
        let mut app = app();
        press(&mut app, KeyCode::Char('/'));

        let mut release = key(KeyCode::Char('7'));
        release.kind = KeyEventKind::Release;
        assert!(app.command_for(release).is_none());

        press(&mut app, KeyCode::Char('7'));
        assert_eq!(app.tally.filter.name.as_deref(), Some("7"));
    }

    #[test]
    fn test_quit_keys() {
        let mut app = app();
        assert!(!press(&mut app, KeyCode::Char('q')));
    }

    #[test]
    fn test_typing_in_search_does_not_quit() {
        let mut app = app();
        press(&mut app, KeyCode::Char('/'));
        assert!(press(&mut app, KeyCode::Char('q')));
        assert_eq!(app.tally.filter.name.as_deref(), Some("q"));
        press(&mut app, KeyCode::Enter);
        assert!(!app.tally.editing_name);
    }

    #[test]
    fn test_schedule_reminder_from_dialog() {
        let mut app = app();
        press(&mut app, KeyCode::Char('r'));
        assert!(app.tally.reminder.is_some());

        let member_id = app.tally.reminder.as_ref().unwrap().member_id.clone();
        let mut ctrl_s = KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL);
        ctrl_s.kind = KeyEventKind::Press;
        let command = app.command_for(ctrl_s).unwrap();
        assert_eq!(command, Command::SubmitReminder);
        app.apply(command).unwrap();

        assert!(app.tally.reminder.is_none());
        assert!(app.status_message().unwrap().starts_with("Reminder scheduled!"));
        assert_eq!(list_reminders(&app.conn, Some(&member_id)).unwrap().len(), 1);
    }

    #[test]
    fn test_add_ledger_entry() {
        let mut app = app();
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Char('s'));
        assert_eq!(app.scope, LedgerScope::Personal);

        press(&mut app, KeyCode::Char('n'));
        for c in "2500".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        press(&mut app, KeyCode::Enter);

        assert!(app.ledger_form.is_none());
        assert_eq!(app.ledger.transactions.len(), 4);
        assert_eq!(app.ledger.totals.total_received, 12500.0);
    }

    #[test]
    fn test_renders_tally_and_dialog() {
        let mut app = app();
        let mut terminal = Terminal::new(TestBackend::new(140, 40)).unwrap();
        terminal.draw(|f| ui(f, &mut app)).unwrap();

        press(&mut app, KeyCode::Char('r'));
        terminal.draw(|f| ui(f, &mut app)).unwrap();

        let buffer = terminal.backend().buffer();
        let text: String = buffer.content().iter().map(|cell| cell.symbol()).collect();
        assert!(text.contains("Send Payment Reminder"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Raj Sharma", 20), "Raj Sharma");
        assert_eq!(truncate("KALYMAN_SADAMANO JAMARKAR", 8), "KALYMAN…");
    }
}
