use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Span;
use ratatui::Frame;

use crate::error::Result;
use crate::fmt::money;
use crate::models::Direction;

pub const HEADER_STYLE: Style = Style::new()
    .fg(Color::Yellow)
    .add_modifier(Modifier::BOLD);

pub const FOOTER_STYLE: Style = Style::new().fg(Color::DarkGray);

pub const STATUS_STYLE: Style = Style::new().fg(Color::Yellow);

pub const RECEIVED_STYLE: Style = Style::new().fg(Color::Rgb(80, 220, 100));
pub const SPENT_STYLE: Style = Style::new().fg(Color::Red);
pub const OFFICE_STYLE: Style = Style::new().fg(Color::Cyan);

pub const SELECTED_STYLE: Style = Style::new()
    .bg(Color::Rgb(40, 40, 60))
    .add_modifier(Modifier::BOLD);

/// Amount colored by direction: green for money received, red for spent.
pub fn money_span(amount: f64, direction: Direction, symbol: &str) -> Span<'static> {
    let style = match direction {
        Direction::Received => RECEIVED_STYLE,
        Direction::Spent => SPENT_STYLE,
    };
    Span::styled(money(amount, symbol), style)
}

/// Compact axis label: 1.2k, 3M.
pub fn format_k(val: f64) -> String {
    if val >= 1_000_000.0 {
        format!("{:.1}M", val / 1_000_000.0)
    } else if val >= 1000.0 {
        format!("{:.1}k", val / 1000.0)
    } else {
        format!("{}", val.round() as u64)
    }
}

// ---------------------------------------------------------------------------
// View loop
// ---------------------------------------------------------------------------

pub enum ViewAction {
    Continue,
    Close,
    /// The view queued blocking work. The loop redraws once so the busy state
    /// is visible, then calls [`View::run_pending`].
    Busy,
}

pub trait View {
    fn draw(&mut self, frame: &mut Frame);
    fn handle_key(&mut self, code: KeyCode) -> ViewAction;
    fn run_pending(&mut self) {}
}

/// Discard keys typed while blocking work was running.
fn drain_input() -> Result<()> {
    while event::poll(Duration::ZERO)? {
        let _ = event::read()?;
    }
    Ok(())
}

/// Run a full-screen view until it closes. Installs a panic hook that
/// restores the terminal.
pub fn run_view(view: &mut dyn View) -> Result<()> {
    let hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        ratatui::restore();
        hook(info);
    }));

    let mut terminal = ratatui::init();

    let result: Result<()> = loop {
        if let Err(e) = terminal.draw(|frame| view.draw(frame)) {
            break Err(e.into());
        }

        match event::read() {
            Err(e) => break Err(e.into()),
            Ok(Event::Key(key)) => {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if key.modifiers.contains(KeyModifiers::CONTROL)
                    && key.code == KeyCode::Char('c')
                {
                    break Ok(());
                }
                match view.handle_key(key.code) {
                    ViewAction::Close => break Ok(()),
                    ViewAction::Continue => {}
                    ViewAction::Busy => {
                        if let Err(e) = terminal.draw(|frame| view.draw(frame)) {
                            break Err(e.into());
                        }
                        view.run_pending();
                        if let Err(e) = drain_input() {
                            break Err(e);
                        }
                    }
                }
            }
            _ => {}
        }
    };

    drop(terminal);
    ratatui::restore();
    result
}
