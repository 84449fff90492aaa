use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{mpsc, Mutex, OnceLock};

use chrono::Local;

static LOGGER: OnceLock<Mutex<Logger>> = OnceLock::new();

struct Logger {
    file: File,
    panel_tx: Option<mpsc::Sender<String>>,
    prefixes: HashMap<String, u8>, // prefix -> color index
}

// Color indices for panel rendering (mapped in the tui crate)
pub const COLOR_GRAY: u8 = 1;
pub const COLOR_BLUE: u8 = 2;
pub const COLOR_GREEN: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

/// Initialize the global logger, truncating `log_dir/app.log`.
/// Calls made before `init` are dropped.
pub fn init(log_dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(log_dir)?;
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_dir.join("app.log"))?;

    LOGGER
        .set(Mutex::new(Logger { file, panel_tx: None, prefixes: HashMap::new() }))
        .ok();
    Ok(())
}

/// Wire the control panel's log channel.
pub fn set_panel_sender(tx: mpsc::Sender<String>) {
    if let Some(Ok(mut l)) = LOGGER.get().map(|l| l.lock()) {
        l.panel_tx = Some(tx);
    }
}

/// Register a prefix with a color; `*_p` calls with this prefix render in it.
pub fn register_prefix(prefix: &str, color: u8) {
    if let Some(Ok(mut l)) = LOGGER.get().map(|l| l.lock()) {
        l.prefixes.insert(prefix.to_string(), color);
    }
}

/// File gets plain text. The panel channel gets
/// level\x1fprefix\x1fcolor\x1ftimestamp\x1fmessage
fn write_log(level: Level, prefix: &str, msg: &str) {
    let Some(logger) = LOGGER.get() else { return };
    let Ok(mut l) = logger.lock() else { return };

    let ts = Local::now().format("%H:%M:%S").to_string();
    let color = l.prefixes.get(prefix).copied().unwrap_or(0);

    let file_line = if prefix.is_empty() {
        format!("[{}] [{}] {}", ts, level.as_str(), msg)
    } else {
        format!("[{}] [{}] [{}] {}", ts, level.as_str(), prefix, msg)
    };
    writeln!(l.file, "{}", file_line).ok();

    if let Some(tx) = &l.panel_tx {
        tx.send(format!("{}\x1f{}\x1f{}\x1f{}\x1f{}", level.as_str(), prefix, color, ts, msg)).ok();
    }
}

pub fn info(msg: &str) {
    write_log(Level::Info, "", msg);
}

pub fn warn(msg: &str) {
    write_log(Level::Warn, "", msg);
}

pub fn error(msg: &str) {
    write_log(Level::Error, "", msg);
}

pub fn info_p(prefix: &str, msg: &str) {
    write_log(Level::Info, prefix, msg);
}

pub fn warn_p(prefix: &str, msg: &str) {
    write_log(Level::Warn, prefix, msg);
}

pub fn error_p(prefix: &str, msg: &str) {
    write_log(Level::Error, prefix, msg);
}
