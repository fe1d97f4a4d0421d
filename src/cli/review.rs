use std::path::PathBuf;

use crossterm::event::KeyCode;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    text::{Line, Span},
    widgets::{Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use crate::app::{dispatch_message, AppState};
use crate::cli::{gemini_client, open_app, sheet_client};
use crate::error::{FinError, Result};
use crate::fmt::truncate;
use crate::models::CategoryType;
use crate::review::{Dispatch, FieldEdit};
use crate::settings::{shellexpand_path, Settings};
use crate::tui::{
    money_span, run_view, View, ViewAction, FOOTER_STYLE, HEADER_STYLE, OFFICE_STYLE,
    SELECTED_STYLE, STATUS_STYLE,
};

// ---------------------------------------------------------------------------
// Blocking work
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Job {
    Upload(PathBuf),
    Sync,
    Reload,
}

impl Job {
    fn label(&self) -> &'static str {
        match self {
            Job::Upload(_) => "Extracting transactions...",
            Job::Sync => "Syncing approved transactions...",
            Job::Reload => "Loading history from the sheet...",
        }
    }
}

pub(crate) struct JobDone {
    pub message: String,
    /// A sync emptied the review list.
    pub synced_all: bool,
}

fn run_job(job: Job, app: &mut AppState, settings: &Settings) -> Result<JobDone> {
    match job {
        Job::Upload(path) => {
            let outcome = app.upload(&path, false, || gemini_client(settings))?;
            Ok(JobDone {
                message: format!("Extracted {} transaction(s) for review.", outcome.extracted),
                synced_all: false,
            })
        }
        Job::Sync => {
            let client = sheet_client(app)?;
            let result = app.sync_approved(&client)?;
            Ok(JobDone {
                message: dispatch_message(&result),
                synced_all: matches!(result, Dispatch::Sent(_)) && app.working_set.is_empty(),
            })
        }
        Job::Reload => {
            let snapshot = sheet_client(app)?.fetch_remote()?;
            let count = app.apply_remote(snapshot)?;
            Ok(JobDone {
                message: format!("Loaded {count} transaction(s) from the sheet."),
                synced_all: false,
            })
        }
    }
}

/// The single status slot plus the in-flight guard shared by every screen.
#[derive(Default)]
pub(crate) struct Activity {
    pub status: Option<String>,
    pub in_flight: bool,
    pending: Option<Job>,
}

impl Activity {
    pub fn begin(&mut self, job: Job) {
        self.status = Some(job.label().to_string());
        self.in_flight = true;
        self.pending = Some(job);
    }

    /// Run the queued job. Returns true when a sync emptied the review list.
    pub fn finish(&mut self, app: &mut AppState, settings: &Settings) -> bool {
        let Some(job) = self.pending.take() else {
            self.in_flight = false;
            return false;
        };
        let synced_all = match run_job(job, app, settings) {
            Ok(done) => {
                self.status = Some(done.message);
                done.synced_all
            }
            Err(e) => {
                tracing::warn!("{e}");
                self.status = Some(format!("Error: {e}"));
                false
            }
        };
        self.in_flight = false;
        synced_all
    }
}

pub(crate) enum PaneAction {
    Continue,
    Close,
    Message(String),
    Start(Job),
}

// ---------------------------------------------------------------------------
// Review table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum EditField {
    Date,
    Bank,
    Description,
    Amount,
}

impl EditField {
    fn label(self) -> &'static str {
        match self {
            EditField::Date => "Date",
            EditField::Bank => "Bank",
            EditField::Description => "Description",
            EditField::Amount => "Amount",
        }
    }

    fn next(self) -> Self {
        match self {
            EditField::Date => EditField::Bank,
            EditField::Bank => EditField::Description,
            EditField::Description => EditField::Amount,
            EditField::Amount => EditField::Date,
        }
    }

    fn to_edit(self, input: &str) -> Result<FieldEdit> {
        Ok(match self {
            EditField::Date => FieldEdit::Date(input.to_string()),
            EditField::Bank => FieldEdit::BankName(input.to_string()),
            EditField::Description => FieldEdit::Description(input.to_string()),
            EditField::Amount => {
                let cleaned = input.trim().replace(',', "");
                let amount = cleaned
                    .parse::<f64>()
                    .map_err(|_| FinError::InvalidEdit(format!("'{input}' is not a number")))?;
                FieldEdit::Amount(amount)
            }
        })
    }
}

enum Mode {
    Browse,
    Edit { field: EditField, input: String },
    UploadPath { input: String },
}

pub(crate) struct ReviewTable {
    selection: usize,
    mode: Mode,
}

impl ReviewTable {
    pub fn new() -> Self {
        Self {
            selection: 0,
            mode: Mode::Browse,
        }
    }

    /// True while a text prompt owns the keyboard.
    pub fn is_typing(&self) -> bool {
        !matches!(self.mode, Mode::Browse)
    }

    fn clamp(&mut self, app: &AppState) {
        self.selection = self.selection.min(app.working_set.len().saturating_sub(1));
    }

    fn selected_id(&self, app: &AppState) -> Option<String> {
        app.working_set
            .records()
            .get(self.selection)
            .map(|t| t.id.clone())
    }

    fn field_value(app: &AppState, id: &str, field: EditField) -> String {
        let Some(t) = app.working_set.get(id) else {
            return String::new();
        };
        match field {
            EditField::Date => t.date.clone(),
            EditField::Bank => t.bank_name.clone(),
            EditField::Description => t.description.clone(),
            EditField::Amount => format!("{:.2}", t.amount),
        }
    }

    pub fn draw(&self, frame: &mut Frame, area: Rect, app: &AppState, settings: &Settings, status: Option<&str>) {
        let [title_area, table_area, prompt_area, hints_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Fill(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(area);

        let ws = &app.working_set;
        frame.render_widget(
            Paragraph::new(format!(
                " Pending review: {} of {} approved",
                ws.approved_count(),
                ws.len()
            ))
            .style(HEADER_STYLE),
            title_area,
        );

        if ws.is_empty() {
            frame.render_widget(
                Paragraph::new(" No pending transactions. Press u to upload a PDF statement.")
                    .style(FOOTER_STYLE),
                table_area,
            );
        } else {
            let symbol = settings.currency_symbol.as_str();
            let rows: Vec<Row> = ws
                .records()
                .iter()
                .map(|t| {
                    let mark = if t.is_approved() { "[x]" } else { "[ ]" };
                    let type_cell = match t.category {
                        CategoryType::Office => Cell::from(Span::styled(t.category.as_str(), OFFICE_STYLE)),
                        CategoryType::Personal => Cell::from(t.category.as_str()),
                    };
                    Row::new(vec![
                        Cell::from(mark),
                        Cell::from(t.date.clone()),
                        Cell::from(truncate(&t.bank_name, 16)),
                        Cell::from(t.description.clone()),
                        Cell::from(Line::from(money_span(t.amount, t.direction, symbol)).right_aligned()),
                        Cell::from(t.direction.as_str()),
                        type_cell,
                        Cell::from(t.tag_or_default().to_string()),
                    ])
                })
                .collect();

            let widths = [
                Constraint::Length(3),
                Constraint::Length(10),
                Constraint::Length(16),
                Constraint::Fill(1),
                Constraint::Length(14),
                Constraint::Length(8),
                Constraint::Length(8),
                Constraint::Length(16),
            ];
            let header = Row::new(vec!["", "Date", "Bank", "Description", "Amount", "Dir", "Type", "Tag"])
                .style(HEADER_STYLE);
            let table = Table::new(rows, widths)
                .header(header)
                .row_highlight_style(SELECTED_STYLE);
            let mut state = TableState::default().with_selected(Some(self.selection));
            frame.render_stateful_widget(table, table_area, &mut state);
        }

        let prompt = match &self.mode {
            Mode::Browse => String::new(),
            Mode::Edit { field, input } => format!(" {}: {input}\u{2588}", field.label()),
            Mode::UploadPath { input } => format!(" PDF statement path: {input}\u{2588}"),
        };
        frame.render_widget(Paragraph::new(prompt), prompt_area);

        if let Some(msg) = status {
            frame.render_widget(Paragraph::new(format!(" {msg}")).style(STATUS_STYLE), hints_area);
        } else {
            let hints = match self.mode {
                Mode::Browse => {
                    " space=approve  a=all  e=edit  g=tag  t=type  r=direction  d=delete  u=upload  s=sync  q=quit"
                }
                Mode::Edit { .. } => " Enter=save  Tab=next field  Esc=cancel",
                Mode::UploadPath { .. } => " Enter=extract  Esc=cancel",
            };
            frame.render_widget(Paragraph::new(hints).style(FOOTER_STYLE), hints_area);
        }
    }

    pub fn handle_key(&mut self, code: KeyCode, app: &mut AppState) -> PaneAction {
        match std::mem::replace(&mut self.mode, Mode::Browse) {
            Mode::Browse => self.handle_browse_key(code, app),
            Mode::Edit { field, mut input } => match code {
                KeyCode::Esc => PaneAction::Continue,
                KeyCode::Enter => {
                    let Some(id) = self.selected_id(app) else {
                        return PaneAction::Continue;
                    };
                    match field.to_edit(&input).and_then(|edit| app.edit_pending(&id, edit)) {
                        Ok(()) => PaneAction::Message(format!("{} updated.", field.label())),
                        Err(e) => {
                            self.mode = Mode::Edit { field, input };
                            PaneAction::Message(e.to_string())
                        }
                    }
                }
                KeyCode::Tab => {
                    let next = field.next();
                    let input = self
                        .selected_id(app)
                        .map(|id| Self::field_value(app, &id, next))
                        .unwrap_or_default();
                    self.mode = Mode::Edit { field: next, input };
                    PaneAction::Continue
                }
                KeyCode::Backspace => {
                    input.pop();
                    self.mode = Mode::Edit { field, input };
                    PaneAction::Continue
                }
                KeyCode::Char(c) => {
                    input.push(c);
                    self.mode = Mode::Edit { field, input };
                    PaneAction::Continue
                }
                _ => {
                    self.mode = Mode::Edit { field, input };
                    PaneAction::Continue
                }
            },
            Mode::UploadPath { mut input } => match code {
                KeyCode::Esc => PaneAction::Continue,
                KeyCode::Enter => {
                    let trimmed = input.trim();
                    if trimmed.is_empty() {
                        return PaneAction::Continue;
                    }
                    PaneAction::Start(Job::Upload(PathBuf::from(shellexpand_path(trimmed))))
                }
                KeyCode::Backspace => {
                    input.pop();
                    self.mode = Mode::UploadPath { input };
                    PaneAction::Continue
                }
                KeyCode::Char(c) => {
                    input.push(c);
                    self.mode = Mode::UploadPath { input };
                    PaneAction::Continue
                }
                _ => {
                    self.mode = Mode::UploadPath { input };
                    PaneAction::Continue
                }
            },
        }
    }

    fn handle_browse_key(&mut self, code: KeyCode, app: &mut AppState) -> PaneAction {
        let len = app.working_set.len();
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return PaneAction::Close,
            KeyCode::Up | KeyCode::Char('k') => {
                self.selection = self.selection.saturating_sub(1);
                return PaneAction::Continue;
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selection + 1 < len {
                    self.selection += 1;
                }
                return PaneAction::Continue;
            }
            KeyCode::Char('u') => {
                self.mode = Mode::UploadPath { input: String::new() };
                return PaneAction::Continue;
            }
            KeyCode::Char('s') => {
                if app.working_set.approved_count() == 0 {
                    return PaneAction::Message(dispatch_message(&Dispatch::NothingApproved));
                }
                return PaneAction::Start(Job::Sync);
            }
            KeyCode::Char('a') => {
                return match app.toggle_all() {
                    Ok(_) => PaneAction::Continue,
                    Err(e) => PaneAction::Message(e.to_string()),
                };
            }
            _ => {}
        }

        let Some(id) = self.selected_id(app) else {
            return PaneAction::Continue;
        };
        let Some(current) = app.working_set.get(&id).cloned() else {
            return PaneAction::Continue;
        };
        let result = match code {
            KeyCode::Char(' ') | KeyCode::Enter => app.toggle(&id).map(|_| ()),
            KeyCode::Char('t') => app.edit_pending(&id, FieldEdit::Type(current.category.flipped())),
            KeyCode::Char('r') => app.edit_pending(&id, FieldEdit::Direction(current.direction.flipped())),
            KeyCode::Char('g') => {
                let next = app.next_tag(current.tag_or_default());
                app.edit_pending(&id, FieldEdit::Tag(next))
            }
            KeyCode::Char('e') => {
                let field = EditField::Description;
                self.mode = Mode::Edit {
                    field,
                    input: Self::field_value(app, &id, field),
                };
                Ok(())
            }
            KeyCode::Char('d') => app.delete(&id).map(|removed| {
                self.clamp(app);
                tracing::debug!(id = %removed.id, "deleted pending transaction");
            }),
            _ => Ok(()),
        };
        match result {
            Ok(()) => PaneAction::Continue,
            Err(e) => PaneAction::Message(e.to_string()),
        }
    }

    /// Called after blocking work; the list may have shrunk or been replaced.
    pub fn refresh(&mut self, app: &AppState) {
        self.clamp(app);
    }
}

// ---------------------------------------------------------------------------
// Standalone screen
// ---------------------------------------------------------------------------

struct ReviewScreen {
    app: AppState,
    settings: Settings,
    table: ReviewTable,
    activity: Activity,
}

impl View for ReviewScreen {
    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        self.table
            .draw(frame, area, &self.app, &self.settings, self.activity.status.as_deref());
    }

    fn handle_key(&mut self, code: KeyCode) -> ViewAction {
        self.activity.status = None;
        if self.activity.in_flight {
            return ViewAction::Continue;
        }
        match self.table.handle_key(code, &mut self.app) {
            PaneAction::Continue => ViewAction::Continue,
            PaneAction::Close => ViewAction::Close,
            PaneAction::Message(msg) => {
                self.activity.status = Some(msg);
                ViewAction::Continue
            }
            PaneAction::Start(job) => {
                self.activity.begin(job);
                ViewAction::Busy
            }
        }
    }

    fn run_pending(&mut self) {
        self.activity.finish(&mut self.app, &self.settings);
        self.table.refresh(&self.app);
    }
}

pub fn run() -> Result<()> {
    let (settings, app) = open_app()?;
    let pending = app.working_set.len();
    let mut screen = ReviewScreen {
        app,
        settings,
        table: ReviewTable::new(),
        activity: Activity::default(),
    };
    run_view(&mut screen)?;

    let remaining = screen.app.working_set.len();
    println!("Review closed: {remaining} pending ({pending} at start).");
    Ok(())
}
