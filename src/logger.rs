//! Redaction activity log.
//!
//! One plain-text file per GUI run, replaced at every launch:
//!   Windows:  `%APPDATA%\RedactFE\redactfe.log`
//!   Linux:    `$XDG_DATA_HOME/RedactFE/redactfe.log` (or `~/.local/share`)
//!   macOS:    `~/Library/Application Support/RedactFE/redactfe.log`
//!
//! Each line reads `[HH:MM:SS] [LEVEL] message`. Call sites use `log_info!`,
//! `log_warn!` and `log_err!`. Nothing is written before [`init`]; the CLI
//! and the tests never open a log.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

struct Sink {
    file: Mutex<File>,
    path: PathBuf,
}

static SINK: OnceLock<Sink> = OnceLock::new();

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn tag(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

/// Where the open log lives, once [`init`] succeeded.
pub fn log_path() -> Option<&'static Path> {
    SINK.get().map(|s| s.path.as_path())
}

fn append(line: &str) {
    if let Some(sink) = SINK.get()
        && let Ok(mut file) = sink.file.lock()
    {
        // A full disk must not interrupt an edit.
        let _ = writeln!(file, "{}", line);
    }
}

pub fn write(level: Level, msg: &str) {
    if SINK.get().is_some() {
        append(&format!("[{}] [{}] {}", clock(), level.tag(), msg));
    }
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Info, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Warn, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Error, &format!($($arg)*))
    };
}

/// Start the GUI log in the platform data directory.
pub fn init() {
    init_at(&data_dir().join("RedactFE").join("redactfe.log"));
}

/// Start logging to `path`, truncating it. Later calls are ignored.
///
/// Panics are copied into the log before the previous hook runs.
pub fn init_at(path: &Path) {
    if SINK.get().is_some() {
        return;
    }
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let file = match OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
    {
        Ok(f) => f,
        Err(e) => {
            eprintln!("redactfe: no log at {}: {}", path.display(), e);
            return;
        }
    };
    let sink = Sink {
        file: Mutex::new(file),
        path: path.to_path_buf(),
    };
    if SINK.set(sink).is_err() {
        return;
    }

    append(&format!("# RedactFE log, started at unix time {}", unix_secs()));

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        append(&format!("[{}] [PANIC] {}", clock(), info));
        previous(info);
    }));
}

fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(appdata) = std::env::var("APPDATA") {
        return PathBuf::from(appdata);
    }
    #[cfg(target_os = "macos")]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join("Library").join("Application Support");
    }
    match (std::env::var("XDG_DATA_HOME"), std::env::var("HOME")) {
        (Ok(xdg), _) => PathBuf::from(xdg),
        (_, Ok(home)) => PathBuf::from(home).join(".local").join("share"),
        _ => PathBuf::from("."),
    }
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// UTC wall clock, `HH:MM:SS`.
fn clock() -> String {
    let secs = unix_secs() % 86_400;
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
