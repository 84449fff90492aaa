use std::sync::{mpsc, Arc, Mutex};

use autohunt_core::types::{Command, HuntStatus, RunState};

use crate::confirm::ConfirmDialog;

pub struct App {
    pub status: Arc<Mutex<HuntStatus>>,
    pub cursor: usize,
    pub log_visible: bool,
    pub log_messages: Vec<String>,
    pub log_scroll: usize, // scroll offset from bottom (0 = latest)
    pub log_rx: mpsc::Receiver<String>,
    pub cmd_tx: mpsc::Sender<Command>,
    pub confirm: Option<ConfirmDialog>,
    pub should_quit: bool,
}

impl App {
    pub fn new(
        status: Arc<Mutex<HuntStatus>>,
        log_rx: mpsc::Receiver<String>,
        cmd_tx: mpsc::Sender<Command>,
    ) -> Self {
        let cursor = status.lock().ok().and_then(|s| s.selected).unwrap_or(0);
        Self {
            status,
            cursor,
            log_visible: true,
            log_messages: Vec::new(),
            log_scroll: 0,
            log_rx,
            cmd_tx,
            confirm: None,
            should_quit: false,
        }
    }

    fn run_state(&self) -> RunState {
        self.status.lock().map(|s| s.run_state).unwrap_or(RunState::Stopped)
    }

    fn window_count(&self) -> usize {
        self.status.lock().map(|s| s.windows.len()).unwrap_or(0)
    }

    pub fn drain_logs(&mut self) {
        while let Ok(msg) = self.log_rx.try_recv() {
            self.log_messages.push(msg);
        }
    }

    pub fn scroll_log_up(&mut self, n: usize) {
        self.log_scroll = self.log_scroll.saturating_add(n);
    }

    pub fn scroll_log_down(&mut self, n: usize) {
        self.log_scroll = self.log_scroll.saturating_sub(n);
    }

    pub fn move_up(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
        }
    }

    pub fn move_down(&mut self) {
        if self.cursor + 1 < self.window_count() {
            self.cursor += 1;
        }
    }

    pub fn select_current(&mut self) {
        if self.cursor < self.window_count() {
            self.cmd_tx.send(Command::Select(self.cursor)).ok();
        }
    }

    pub fn start_stop(&mut self) {
        if let Ok(mut s) = self.status.lock() {
            if s.run_state == RunState::Running {
                s.run_state = RunState::Stopping;
            }
        }
        self.cmd_tx.send(Command::StartStop).ok();
    }

    pub fn rescan(&mut self) {
        self.cmd_tx.send(Command::Rescan).ok();
    }

    pub fn toggle_log(&mut self) {
        self.log_visible = !self.log_visible;
    }

    /// Quit right away when idle; ask first while a hunt is running.
    pub fn request_quit(&mut self) {
        if self.run_state() == RunState::Stopped {
            self.quit();
        } else {
            self.confirm = Some(ConfirmDialog::new("A hunt is running. Quit?"));
        }
    }

    /// Close the dialog, quitting if Yes was chosen.
    pub fn answer_confirm(&mut self, yes: bool) {
        self.confirm = None;
        if yes {
            self.quit();
        }
    }

    pub fn quit(&mut self) {
        self.cmd_tx.send(Command::Quit).ok();
        self.should_quit = true;
    }
}
