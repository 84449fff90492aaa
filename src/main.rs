use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, mpsc};
use std::sync::atomic::AtomicBool;
use std::thread;

use anyhow::{Context, Result};
use crossterm::{
    execute,
    event::{EnableMouseCapture, DisableMouseCapture},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{Terminal, backend::CrosstermBackend};

use autohunt_core::{logger, settings::Settings};
use autohunt_core::orchestrator::{self, Orchestrator};
use autohunt_core::platform::{create_platform, hotkey};
use autohunt_core::types::{Command, HuntStatus};

fn main() -> Result<()> {
    let force_stub = std::env::args().any(|a| a == "--stub");

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    logger::init(&cwd.join("logs")).context("creating logs directory")?;
    logger::register_prefix("engine", logger::COLOR_BLUE);
    logger::register_prefix("detect", logger::COLOR_GREEN);

    let settings_path = cwd.join("settings.json");
    let settings = Settings::load(&settings_path)?;

    let platform = create_platform(force_stub);

    // Initial window scan so the panel has something to show
    let status = Arc::new(Mutex::new(HuntStatus::new(Vec::new())));
    orchestrator::scan_windows(
        &status,
        platform.as_ref(),
        &settings.window_pattern,
        settings.last_window_title.as_deref(),
    );

    // Channels
    let (log_tx, log_rx) = mpsc::channel::<String>();
    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();

    logger::set_panel_sender(log_tx);
    logger::info("autohunt started");

    // Global stop hotkey (Ctrl+Shift+K)
    let stop_flag = Arc::new(AtomicBool::new(false));
    hotkey::start_hotkey_listener(Arc::clone(&stop_flag));

    // Engine thread
    let orch = Orchestrator::new(platform, settings, Some(settings_path), Arc::clone(&status));
    let engine_thread = thread::spawn(move || orchestrator::orchestrate(orch, cmd_rx, stop_flag));

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = autohunt_tui::App::new(status, log_rx, cmd_tx);
    let result = autohunt_tui::event::run(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    // The engine finishes its current step before honoring Quit
    drop(app);
    engine_thread.join().ok();

    result
}
