use crossterm::event::KeyCode;
use ratatui::{
    layout::{Constraint, Direction as Axis, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Paragraph, Tabs},
    Frame,
};

use crate::analytics::{analyze, available_banks, available_months, expense_mix, AnalyticsFilter};
use crate::app::AppState;
use crate::cli::open_app;
use crate::cli::review::{Activity, Job, PaneAction, ReviewTable};
use crate::error::Result;
use crate::fmt::{money, truncate};
use crate::settings::Settings;
use crate::tui::{
    format_k, run_view, View, ViewAction, FOOTER_STYLE, HEADER_STYLE, OFFICE_STYLE, RECEIVED_STYLE,
    SPENT_STYLE, STATUS_STYLE,
};

const TAB_TITLES: [&str; 2] = ["Review", "Dashboard"];

/// Step through `len + 1` choices where 0 is "All".
fn cycle(idx: usize, len: usize, forward: bool) -> usize {
    let total = len + 1;
    if forward {
        (idx + 1) % total
    } else {
        (idx + total - 1) % total
    }
}

/// Move a selection through `options`, with `None` standing for "All".
fn step(current: Option<&str>, options: &[String], forward: bool) -> Option<String> {
    let idx = current
        .and_then(|c| options.iter().position(|o| o == c))
        .map_or(0, |i| i + 1);
    cycle(idx, options.len(), forward)
        .checked_sub(1)
        .map(|i| options[i].clone())
}

fn bar_value(amount: f64) -> u64 {
    amount.max(0.0).round() as u64
}

// ---------------------------------------------------------------------------
// Dashboard panel
// ---------------------------------------------------------------------------

/// The selected month and bank are kept by key so new history does not
/// shift them.
#[derive(Default)]
pub(crate) struct DashboardPanel {
    month: Option<String>,
    bank: Option<String>,
}

impl DashboardPanel {
    fn filter(&self) -> AnalyticsFilter {
        AnalyticsFilter::new(self.month.clone(), self.bank.clone())
    }

    /// History can shrink after a reload; a vanished key falls back to "All".
    fn refresh(&mut self, app: &AppState) {
        if let Some(month) = &self.month {
            if !available_months(&app.history).contains(month) {
                self.month = None;
            }
        }
        if let Some(bank) = &self.bank {
            if !available_banks(&app.history).contains(bank) {
                self.bank = None;
            }
        }
    }

    fn handle_key(&mut self, code: KeyCode, app: &AppState) -> PaneAction {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => PaneAction::Close,
            KeyCode::Char('m') | KeyCode::Right => {
                self.month = step(self.month.as_deref(), &available_months(&app.history), true);
                PaneAction::Continue
            }
            KeyCode::Char('M') | KeyCode::Left => {
                self.month = step(self.month.as_deref(), &available_months(&app.history), false);
                PaneAction::Continue
            }
            KeyCode::Char('b') | KeyCode::Down => {
                self.bank = step(self.bank.as_deref(), &available_banks(&app.history), true);
                PaneAction::Continue
            }
            KeyCode::Char('B') | KeyCode::Up => {
                self.bank = step(self.bank.as_deref(), &available_banks(&app.history), false);
                PaneAction::Continue
            }
            KeyCode::Char('r') => PaneAction::Start(Job::Reload),
            _ => PaneAction::Continue,
        }
    }

    fn draw(&self, frame: &mut Frame, area: Rect, app: &AppState, settings: &Settings, status: Option<&str>) {
        let sym = settings.currency_symbol.as_str();
        let filter = self.filter();
        let report = analyze(&app.history, &filter);

        let [filter_area, cards_area, mix_area, trend_area, bottom_area, hints_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Fill(1),
            Constraint::Fill(1),
            Constraint::Length(1),
        ])
        .areas(area);

        let label = |v: &Option<String>| v.clone().unwrap_or_else(|| "All".to_string());
        frame.render_widget(
            Paragraph::new(format!(
                " Month: {}   Bank: {}   ({} transactions)",
                label(&filter.month),
                label(&filter.bank),
                report.summary.count
            ))
            .style(HEADER_STYLE),
            filter_area,
        );

        // Summary cards
        let s = report.summary;
        let cards = [
            ("Total Spent", s.total_spent, SPENT_STYLE),
            ("Total Received", s.total_received, RECEIVED_STYLE),
            ("Personal", s.personal_spending, Style::default()),
            ("Office", s.office_spending, OFFICE_STYLE),
        ];
        let card_areas = Layout::horizontal([Constraint::Ratio(1, 4); 4]).split(cards_area);
        for ((title, value, style), card_area) in cards.iter().zip(card_areas.iter()) {
            frame.render_widget(
                Paragraph::new(Span::styled(money(*value, sym), *style))
                    .block(Block::default().borders(Borders::ALL).title(*title)),
                *card_area,
            );
        }

        let [personal, office] = expense_mix(&s);
        let share = |v: f64| {
            if s.total_spent > 0.0 {
                v / s.total_spent * 100.0
            } else {
                0.0
            }
        };
        frame.render_widget(
            Paragraph::new(format!(
                " Expense mix: {} {:.0}%   {} {:.0}%",
                personal.name,
                share(personal.value),
                office.name,
                share(office.value)
            ))
            .style(FOOTER_STYLE),
            mix_area,
        );

        // Spent vs received over time
        let groups: Vec<BarGroup> = report
            .trend
            .iter()
            .map(|bucket| {
                let label = if filter.month.is_some() {
                    bucket.key.get(8..).unwrap_or(&bucket.key).to_string()
                } else {
                    bucket.key.clone()
                };
                let bars = vec![
                    Bar::default()
                        .value(bar_value(bucket.spent))
                        .text_value(format_k(bucket.spent))
                        .style(SPENT_STYLE),
                    Bar::default()
                        .value(bar_value(bucket.received))
                        .text_value(format_k(bucket.received))
                        .style(RECEIVED_STYLE),
                ];
                BarGroup::default().label(Line::from(label)).bars(&bars)
            })
            .collect();
        let trend_title = if filter.month.is_some() { "Daily flow" } else { "Monthly flow" };
        let mut trend_chart = BarChart::default()
            .block(
                Block::default()
                    .title(trend_title)
                    .title_style(Style::default().add_modifier(Modifier::BOLD))
                    .borders(Borders::TOP),
            )
            .bar_width(5)
            .bar_gap(0)
            .group_gap(2);
        for group in groups {
            trend_chart = trend_chart.data(group);
        }
        frame.render_widget(trend_chart, trend_area);

        let [tags_area, banks_area] =
            Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(bottom_area);

        // Spending by tag
        let tag_bars: Vec<Bar> = report
            .tags
            .iter()
            .map(|t| {
                Bar::default()
                    .label(Line::from(truncate(&t.name, 14)))
                    .value(bar_value(t.value))
                    .text_value(money(t.value, sym))
                    .style(SPENT_STYLE)
            })
            .collect();
        let tag_chart = BarChart::default()
            .block(
                Block::default()
                    .title("Spending by tag")
                    .title_style(Style::default().add_modifier(Modifier::BOLD))
                    .borders(Borders::TOP),
            )
            .direction(Axis::Horizontal)
            .bar_width(1)
            .bar_gap(0)
            .data(BarGroup::default().bars(&tag_bars));
        frame.render_widget(tag_chart, tags_area);

        // Per bank
        let mut bank_chart = BarChart::default()
            .block(
                Block::default()
                    .title("By bank")
                    .title_style(Style::default().add_modifier(Modifier::BOLD))
                    .borders(Borders::TOP),
            )
            .bar_width(5)
            .bar_gap(0)
            .group_gap(2);
        for bucket in &report.banks {
            let bars = vec![
                Bar::default()
                    .value(bar_value(bucket.spent))
                    .text_value(format_k(bucket.spent))
                    .style(SPENT_STYLE),
                Bar::default()
                    .value(bar_value(bucket.received))
                    .text_value(format_k(bucket.received))
                    .style(RECEIVED_STYLE),
            ];
            bank_chart = bank_chart.data(
                BarGroup::default()
                    .label(Line::from(truncate(&bucket.key, 11)))
                    .bars(&bars),
            );
        }
        frame.render_widget(bank_chart, banks_area);

        if let Some(msg) = status {
            frame.render_widget(Paragraph::new(format!(" {msg}")).style(STATUS_STYLE), hints_area);
        } else if app.history.is_empty() {
            frame.render_widget(
                Paragraph::new(" No synced history yet. Sync approved transactions or press r to load from the sheet.")
                    .style(FOOTER_STYLE),
                hints_area,
            );
        } else {
            frame.render_widget(
                Paragraph::new(" m/M=month  b/B=bank  r=reload from sheet  Tab=switch  q=quit").style(FOOTER_STYLE),
                hints_area,
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tabbed shell
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum Tab {
    Review,
    Dashboard,
}

struct Shell {
    app: AppState,
    settings: Settings,
    tab: Tab,
    review: ReviewTable,
    panel: DashboardPanel,
    activity: Activity,
}

impl Shell {
    fn new(app: AppState, settings: Settings) -> Self {
        let tab = if app.working_set.is_empty() && !app.history.is_empty() {
            Tab::Dashboard
        } else {
            Tab::Review
        };
        Self {
            app,
            settings,
            tab,
            review: ReviewTable::new(),
            panel: DashboardPanel::default(),
            activity: Activity::default(),
        }
    }
}

impl View for Shell {
    fn draw(&mut self, frame: &mut Frame) {
        let [tabs_area, body_area] =
            Layout::vertical([Constraint::Length(1), Constraint::Fill(1)]).areas(frame.area());

        let titles: Vec<String> = TAB_TITLES
            .iter()
            .map(|t| match *t {
                "Review" if !self.app.working_set.is_empty() => {
                    format!("{t} ({})", self.app.working_set.len())
                }
                _ => t.to_string(),
            })
            .collect();
        let selected = match self.tab {
            Tab::Review => 0,
            Tab::Dashboard => 1,
        };
        frame.render_widget(
            Tabs::new(titles)
                .select(selected)
                .highlight_style(HEADER_STYLE)
                .style(FOOTER_STYLE),
            tabs_area,
        );

        let status = self.activity.status.as_deref();
        match self.tab {
            Tab::Review => self.review.draw(frame, body_area, &self.app, &self.settings, status),
            Tab::Dashboard => self.panel.draw(frame, body_area, &self.app, &self.settings, status),
        }
    }

    fn handle_key(&mut self, code: KeyCode) -> ViewAction {
        self.activity.status = None;
        if self.activity.in_flight {
            return ViewAction::Continue;
        }

        let typing = self.tab == Tab::Review && self.review.is_typing();
        if !typing {
            match code {
                KeyCode::Tab | KeyCode::BackTab => {
                    self.tab = match self.tab {
                        Tab::Review => Tab::Dashboard,
                        Tab::Dashboard => Tab::Review,
                    };
                    return ViewAction::Continue;
                }
                KeyCode::Char('1') => {
                    self.tab = Tab::Review;
                    return ViewAction::Continue;
                }
                KeyCode::Char('2') => {
                    self.tab = Tab::Dashboard;
                    return ViewAction::Continue;
                }
                _ => {}
            }
        }

        let action = match self.tab {
            Tab::Review => self.review.handle_key(code, &mut self.app),
            Tab::Dashboard => self.panel.handle_key(code, &self.app),
        };
        match action {
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
        let synced_all = self.activity.finish(&mut self.app, &self.settings);
        self.review.refresh(&self.app);
        self.panel.refresh(&self.app);
        if synced_all {
            self.tab = Tab::Dashboard;
        }
    }
}

pub fn run() -> Result<()> {
    let (settings, app) = open_app()?;
    let mut shell = Shell::new(app, settings);
    run_view(&mut shell)
}

#[cfg(test)]
mod tests {
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    use super::*;
    use crate::db::test_db;
    use crate::models::{sample, Direction, Status};
    use crate::review::WorkingSet;

    fn shell() -> (tempfile::TempDir, Shell) {
        let (dir, conn) = test_db();
        let mut app = AppState::load(conn).unwrap();
        app.history = vec![
            sample("a", "2024-01-05", 100.0, Direction::Spent),
            sample("b", "2024-02-10", 50.0, Direction::Received),
        ];
        let mut pending = sample("p", "2024-03-01", 5.0, Direction::Spent);
        pending.status = Status::Pending;
        app.working_set = WorkingSet::new(vec![pending]);
        (dir, Shell::new(app, Settings::default()))
    }

    #[test]
    fn test_cycle_wraps_through_all() {
        assert_eq!(cycle(0, 2, true), 1);
        assert_eq!(cycle(2, 2, true), 0);
        assert_eq!(cycle(0, 2, false), 2);
        assert_eq!(cycle(0, 0, true), 0);
    }

    #[test]
    fn test_step_moves_by_key() {
        let months = vec!["2024-02".to_string(), "2024-01".to_string()];
        assert_eq!(step(None, &months, true).as_deref(), Some("2024-02"));
        assert_eq!(step(Some("2024-01"), &months, true), None);
        assert_eq!(step(None, &months, false).as_deref(), Some("2024-01"));
        assert_eq!(step(Some("2023-12"), &months, true).as_deref(), Some("2024-02"));
    }

    #[test]
    fn test_panel_filter_follows_selection() {
        let (_dir, shell) = shell();
        let mut panel = DashboardPanel::default();
        assert_eq!(panel.filter(), AnalyticsFilter::default());
        panel.handle_key(KeyCode::Char('m'), &shell.app);
        assert_eq!(panel.filter().month.as_deref(), Some("2024-02"));
        panel.handle_key(KeyCode::Char('b'), &shell.app);
        assert_eq!(panel.filter().bank.as_deref(), Some("HDFC Bank"));
    }

    #[test]
    fn test_selected_month_survives_newer_history() {
        let (_dir, mut shell) = shell();
        let mut panel = DashboardPanel::default();
        panel.handle_key(KeyCode::Char('m'), &shell.app);
        panel.handle_key(KeyCode::Char('m'), &shell.app);
        assert_eq!(panel.filter().month.as_deref(), Some("2024-01"));

        shell
            .app
            .history
            .push(sample("c", "2024-04-02", 20.0, Direction::Spent));
        panel.refresh(&shell.app);
        assert_eq!(panel.filter().month.as_deref(), Some("2024-01"));

        shell.app.history.retain(|t| t.id == "c");
        panel.refresh(&shell.app);
        assert_eq!(panel.filter().month, None);
    }

    #[test]
    fn test_tab_switching_and_starting_in_review() {
        let (_dir, mut shell) = shell();
        assert_eq!(shell.tab, Tab::Review);
        shell.handle_key(KeyCode::Tab);
        assert_eq!(shell.tab, Tab::Dashboard);
        shell.handle_key(KeyCode::Char('1'));
        assert_eq!(shell.tab, Tab::Review);
    }

    #[test]
    fn test_tab_key_goes_to_edit_prompt_while_typing() {
        let (_dir, mut shell) = shell();
        shell.handle_key(KeyCode::Char('e'));
        shell.handle_key(KeyCode::Tab);
        assert_eq!(shell.tab, Tab::Review);
        assert!(shell.review.is_typing());
    }

    #[test]
    fn test_keys_ignored_while_in_flight() {
        let (_dir, mut shell) = shell();
        shell.activity.in_flight = true;
        shell.handle_key(KeyCode::Char(' '));
        assert_eq!(shell.app.working_set.approved_count(), 0);
    }

    #[test]
    fn test_message_clears_on_next_key() {
        let (_dir, mut shell) = shell();
        shell.handle_key(KeyCode::Char('s'));
        assert!(shell.activity.status.is_some());
        shell.handle_key(KeyCode::Down);
        assert!(shell.activity.status.is_none());
    }

    #[test]
    fn test_dashboard_draws_totals() {
        let (_dir, mut shell) = shell();
        shell.tab = Tab::Dashboard;
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|f| shell.draw(f)).unwrap();
        let text: String = terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(text.contains("₹100.00"));
        assert!(text.contains("₹50.00"));
        assert!(text.contains("Monthly flow"));
    }
}
