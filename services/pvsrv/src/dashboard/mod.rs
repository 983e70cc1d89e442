//! Terminal dashboard
//!
//! Blocking ratatui loop; run it on a blocking thread. It only ever reads
//! owned copies of the shared state.

pub mod resample;
pub mod ui;

use std::io::{self, Write};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::cursor::Show;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::runtime::shared::SharedState;
use ui::UiState;

/// Run the dashboard until the user quits or `stop` is cancelled
///
/// Quitting from the keyboard cancels `stop` so the rest of the service
/// shuts down too.
pub fn run_dashboard(state: SharedState, stop: CancellationToken, refresh: Duration) -> Result<()> {
    let mut guard = TerminalGuard::enable(io::stdout())?;
    guard.enter_alternate_screen()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;

    // `terminal` drops before `guard`, which then restores the screen
    run_dashboard_loop(&mut terminal, &state, &stop, refresh)
}

/// Raw-mode terminal session, restored on drop
///
/// Covers every exit path, including a setup step failing after raw mode
/// is already on.
struct TerminalGuard<W: Write> {
    out: W,
    alternate_screen: bool,
}

impl<W: Write> TerminalGuard<W> {
    fn enable(out: W) -> Result<Self> {
        enable_raw_mode().context("Failed to enable raw mode")?;
        Ok(Self {
            out,
            alternate_screen: false,
        })
    }

    fn enter_alternate_screen(&mut self) -> Result<()> {
        self.out
            .execute(EnterAlternateScreen)
            .context("Failed to enter alternate screen")?;
        self.alternate_screen = true;
        Ok(())
    }
}

impl<W: Write> Drop for TerminalGuard<W> {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            warn!("Failed to disable raw mode: {}", e);
        }
        if self.alternate_screen {
            if let Err(e) = self.out.execute(LeaveAlternateScreen) {
                warn!("Failed to leave alternate screen: {}", e);
            }
        }
        if let Err(e) = self.out.execute(Show) {
            warn!("Failed to show cursor: {}", e);
        }
    }
}

fn run_dashboard_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: &SharedState,
    stop: &CancellationToken,
    refresh: Duration,
) -> Result<()> {
    let mut ui_state = UiState::default();
    let mut last_tick = Instant::now();

    while !stop.is_cancelled() {
        let view = state.view();
        terminal.draw(|f| ui::draw(f, &view, &ui_state))?;

        let timeout = refresh.saturating_sub(last_tick.elapsed());
        if event::poll(timeout).context("Failed to poll events")? {
            if let Event::Key(key) = event::read().context("Failed to read event")? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => {
                            debug!("Dashboard quit requested");
                            stop.cancel();
                        },
                        KeyCode::Char('a') => ui_state.show_breakdown = !ui_state.show_breakdown,
                        KeyCode::Char('r') => {
                            terminal.clear().context("Failed to clear terminal")?;
                        },
                        _ => {},
                    }
                }
            }
        }

        if last_tick.elapsed() >= refresh {
            last_tick = Instant::now();
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    const LEAVE_ALTERNATE: &str = "\x1b[?1049l";
    const SHOW_CURSOR: &str = "\x1b[?25h";

    /// Writer whose every write fails
    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_guard_leaves_alternate_screen_on_drop() {
        let mut out = Vec::new();
        {
            let mut guard = TerminalGuard {
                out: &mut out,
                alternate_screen: false,
            };
            guard.enter_alternate_screen().unwrap();
            assert!(guard.alternate_screen);
        }

        let written = String::from_utf8(out).unwrap();
        assert!(written.starts_with("\x1b[?1049h"));
        assert!(written.contains(LEAVE_ALTERNATE));
        assert!(written.ends_with(SHOW_CURSOR));
    }

    #[test]
    fn test_guard_skips_screen_it_never_entered() {
        let mut out = Vec::new();
        drop(TerminalGuard {
            out: &mut out,
            alternate_screen: false,
        });

        let written = String::from_utf8(out).unwrap();
        assert!(!written.contains(LEAVE_ALTERNATE));
        assert_eq!(written, SHOW_CURSOR);
    }

    #[test]
    fn test_failed_setup_still_restores() {
        let mut guard = TerminalGuard {
            out: BrokenPipe,
            alternate_screen: false,
        };
        let err = guard.enter_alternate_screen().unwrap_err();
        assert!(err.to_string().contains("alternate screen"));
        assert!(!guard.alternate_screen);
        // Restore errors are logged, never panic
        drop(guard);
    }
}
