//! Session log: every `log::info!` / `log::warn!` / `log::error!` call in the
//! crate lands in one file in the OS data directory.
//!
//! The file is truncated at each launch, so it only holds the most recent
//! session.
//!
//! Log location:
//!   Windows:  `%APPDATA%\CutMaker\cutmaker.log`
//!   Linux:    `~/.local/share/CutMaker/cutmaker.log`
//!   macOS:    `~/Library/Application Support/CutMaker/cutmaker.log`
//!
//! Panics are mirrored into the file by a hook installed in [`init`].

use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

pub const APP_DIR_NAME: &str = "CutMaker";
const LOG_FILE_NAME: &str = "cutmaker.log";

static LOGGER: OnceLock<SessionLogger> = OnceLock::new();

struct SessionLogger {
    file: Mutex<File>,
    path: PathBuf,
    /// Also echo warnings and errors to stderr (headless runs).
    echo_stderr: bool,
}

impl Log for SessionLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        // Dependencies (reqwest, eframe) are noisy at debug level.
        metadata.level() <= Level::Info || metadata.target().starts_with("cutmaker")
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(record.level(), &record.args().to_string());
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{}", line);
        }
        if self.echo_stderr && record.level() <= Level::Warn {
            eprintln!("{}", line);
        }
    }

    fn flush(&self) {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}

/// Path of the current session's log file, once [`init`] succeeded.
pub fn log_path() -> Option<&'static Path> {
    LOGGER.get().map(|l| l.path.as_path())
}

/// Installs the session logger. Safe to call more than once; only the first
/// call has an effect. Failing to open the file is not fatal, logging is
/// simply disabled.
pub fn init(echo_stderr: bool) {
    if LOGGER.get().is_some() {
        return;
    }
    let path = app_data_dir().join(LOG_FILE_NAME);
    let file = match open_truncated(&path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("[logger] Failed to open log file {:?}: {}", path, e);
            return;
        }
    };

    let logger = LOGGER.get_or_init(|| SessionLogger {
        file: Mutex::new(file),
        path,
        echo_stderr,
    });
    if log::set_logger(logger).is_err() {
        return;
    }
    log::set_max_level(LevelFilter::Debug);

    if let Ok(mut f) = logger.file.lock() {
        let _ = writeln!(f, "=== CutMaker session started (unix {}) ===", unix_seconds());
        let _ = writeln!(f, "Log file: {}", logger.path.display());
        let _ = writeln!(f);
    }

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        log::error!("PANIC: {}", info);
        log::logger().flush();
        prev(info);
    }));
}

fn open_truncated(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
}

fn format_line(level: Level, msg: &str) -> String {
    format!("[{}] [{}] {}", timestamp(), level, msg)
}

/// `<data dir>/CutMaker`, shared with the settings file.
pub fn app_data_dir() -> PathBuf {
    data_dir().join(APP_DIR_NAME)
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library").join("Application Support");
        }
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// `HH:MM:SS` within the current UTC day.
fn timestamp() -> String {
    let secs = unix_seconds();
    format!("{:02}:{:02}:{:02}", (secs % 86400) / 3600, (secs % 3600) / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_format() {
        let line = format_line(Level::Warn, "disk full");
        assert!(line.ends_with("] [WARN] disk full"));
        assert_eq!(&line[0..1], "[");
        assert_eq!(&line[9..10], "]");
    }

    #[test]
    fn app_dir_is_namespaced() {
        assert!(app_data_dir().ends_with(APP_DIR_NAME));
    }
}
