mod app;
mod event;
mod ui;

use std::time::Duration;

use apilog_core::{CallLog, Outcome};
use crossterm::event::{KeyCode, KeyModifiers};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{event::KeyEventKind, execute};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use crate::app::App;
use crate::event::{Event, EventHandler};

/// Options of the interactive viewer.
#[derive(Debug, Clone)]
pub struct ViewerOptions {
    /// How often the log is reloaded from the store.
    pub refresh_every: Duration,
    /// Wipe the log when the viewer exits (end of demo session).
    pub clear_on_exit: bool,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            refresh_every: Duration::from_secs(2),
            clear_on_exit: false,
        }
    }
}

/// What a key press asks the run loop to do besides updating [`App`].
enum Action {
    None,
    Refresh,
    Clear,
}

pub async fn run_viewer(log: CallLog, options: ViewerOptions) -> std::io::Result<()> {
    // Initialize terminal
    terminal::enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(log.backend_name(), log.capacity());
    reload(&log, &mut app).await;

    let mut events = EventHandler::new(50, options.refresh_every);

    loop {
        terminal.draw(|frame| ui::render(frame, &app))?;

        let action = match events.poll()? {
            Event::Key(key) => {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if app.filter_active {
                    handle_filter_key(&mut app, key.code);
                    Action::None
                } else {
                    handle_normal_key(&mut app, key.code, key.modifiers)
                }
            }
            Event::Refresh => Action::Refresh,
            Event::Tick => Action::None,
        };

        match action {
            Action::None => {}
            Action::Refresh => reload(&log, &mut app).await,
            Action::Clear => clear_and_reload(&log, &mut app).await,
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if options.clear_on_exit {
        log.clear().await;
    }

    Ok(())
}

async fn reload(log: &CallLog, app: &mut App) {
    let mut listing = log.read().await;
    listing.records.reverse();
    app.degraded = match listing.outcome {
        Outcome::Stored => None,
        Outcome::Degraded(reason) => Some(reason),
    };
    app.replace_records(listing.records);
}

/// A failed clear stays visible even when the following read succeeds.
async fn clear_and_reload(log: &CallLog, app: &mut App) {
    let outcome = log.clear().await;
    reload(log, app).await;
    if let Outcome::Degraded(reason) = outcome {
        app.degraded = Some(format!("clear failed: {reason}"));
    }
}

fn handle_normal_key(app: &mut App, code: KeyCode, modifiers: KeyModifiers) -> Action {
    match code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
            app.should_quit = true;
        }
        KeyCode::Char('c') => return Action::Clear,
        KeyCode::Char('r') => return Action::Refresh,
        KeyCode::Char('j') | KeyCode::Down => app.move_down(),
        KeyCode::Char('k') | KeyCode::Up => app.move_up(),
        KeyCode::Char('g') | KeyCode::Home => app.jump_top(),
        KeyCode::Char('G') | KeyCode::End => app.jump_bottom(),
        KeyCode::Tab => app.toggle_pane(),
        KeyCode::Char('/') => app.activate_filter(),
        KeyCode::Esc => app.clear_filter(),
        _ => {}
    }
    Action::None
}

fn handle_filter_key(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Esc => app.deactivate_filter(),
        KeyCode::Enter => app.deactivate_filter(),
        KeyCode::Backspace => app.pop_filter_char(),
        KeyCode::Char(c) => app.push_filter_char(c),
        _ => {}
    }
}
