use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, MouseEventKind};
use ratatui::{Terminal, backend::CrosstermBackend};

use crate::App;
use crate::ui;

pub fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> anyhow::Result<()> {
    loop {
        if app.should_quit {
            return Ok(());
        }

        // Drain log messages
        app.drain_logs();

        // Render
        terminal.draw(|f| ui::draw(f, app))?;

        // Poll for events with 100ms timeout (keeps TUI responsive)
        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        match event::read()? {
            Event::Key(key) => {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if let Some(dialog) = app.confirm.as_mut() {
                    match key.code {
                        KeyCode::Left | KeyCode::Right | KeyCode::Tab | KeyCode::Char('h') | KeyCode::Char('l') => {
                            dialog.toggle();
                        }
                        KeyCode::Enter => {
                            let yes = dialog.selected;
                            app.answer_confirm(yes);
                        }
                        KeyCode::Char('y') | KeyCode::Char('Y') => app.answer_confirm(true),
                        KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => app.answer_confirm(false),
                        _ => {}
                    }
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Char('Q') => {
                        app.request_quit();
                    }
                    KeyCode::Up | KeyCode::Char('k') | KeyCode::Char('K') => {
                        app.move_up();
                    }
                    KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('J') => {
                        app.move_down();
                    }
                    KeyCode::Char(' ') => {
                        app.select_current();
                    }
                    KeyCode::Char('s') | KeyCode::Char('S') => {
                        app.start_stop();
                    }
                    KeyCode::Char('r') | KeyCode::Char('R') => {
                        app.rescan();
                    }
                    KeyCode::Char('l') | KeyCode::Char('L') => {
                        app.toggle_log();
                    }
                    _ => {}
                }
            }
            Event::Mouse(mouse) => match mouse.kind {
                MouseEventKind::ScrollUp => app.scroll_log_up(3),
                MouseEventKind::ScrollDown => app.scroll_log_down(3),
                _ => {}
            },
            _ => {}
        }
    }
}
