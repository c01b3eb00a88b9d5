//! Session logger: backs the `log` facade with a single file in the OS data
//! directory.
//!
//! The file is truncated at each launch, so it only holds the most recent
//! session. Warnings and errors are also echoed to stderr.
//!
//! Log location:
//!   Windows:  `%APPDATA%\TextureFE\texturefe.log`
//!   Linux:    `~/.local/share/TextureFE/texturefe.log`
//!   macOS:    `~/Library/Application Support/TextureFE/texturefe.log`

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{Level, LevelFilter, Log, Metadata, Record};

static LOGGER: OnceLock<SessionLogger> = OnceLock::new();

pub struct SessionLogger {
    file: Option<Mutex<File>>,
    path: Option<PathBuf>,
    level: LevelFilter,
    echo_level: LevelFilter,
}

impl SessionLogger {
    /// Open (and truncate) `path`. A file that cannot be opened leaves the
    /// logger writing to stderr only.
    pub fn open(path: &Path, level: LevelFilter) -> Self {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path);
        match file {
            Ok(f) => Self {
                file: Some(Mutex::new(f)),
                path: Some(path.to_path_buf()),
                level,
                echo_level: LevelFilter::Warn,
            },
            Err(e) => {
                eprintln!("[logger] Failed to open log file {:?}: {}", path, e);
                Self::stderr_only(level)
            }
        }
    }

    pub fn stderr_only(level: LevelFilter) -> Self {
        Self { file: None, path: None, level, echo_level: LevelFilter::Warn }
    }

    /// Echo everything at or above `level` to stderr (the default is warnings).
    pub fn with_echo_level(mut self, level: LevelFilter) -> Self {
        self.echo_level = level;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn write_line(&self, line: &str) {
        if let Some(mutex) = &self.file
            && let Ok(mut file) = mutex.lock()
        {
            let _ = writeln!(file, "{}", line);
        }
    }
}

impl Log for SessionLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level || metadata.level() <= self.echo_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(record.level(), record.target(), &record.args().to_string());
        if record.level() <= self.level {
            self.write_line(&line);
        }
        if record.level() <= self.echo_level {
            eprintln!("{}", line);
        }
    }

    fn flush(&self) {
        if let Some(mutex) = &self.file
            && let Ok(mut file) = mutex.lock()
        {
            let _ = file.flush();
        }
    }
}

/// Returns the path to the current session log file.
pub fn log_path() -> Option<&'static Path> {
    LOGGER.get().and_then(|l| l.path())
}

/// Install the session logger. Only the first call has any effect.
///
/// Also installs a panic hook that mirrors the panic message to the log
/// before running the default handler.
pub fn init(level: LevelFilter, verbose: bool) {
    let path = log_file_path();
    let mut logger = SessionLogger::open(&path, level);
    if verbose {
        logger = logger.with_echo_level(level);
    }
    if LOGGER.set(logger).is_err() {
        return;
    }
    let Some(logger) = LOGGER.get() else { return };
    if log::set_logger(logger).is_err() {
        return;
    }
    log::set_max_level(level.max(logger.echo_level));

    logger.write_line(&format!("=== TextureFE session started (unix {}) ===", unix_secs()));
    logger.write_line(&format!("Log file: {}", path.display()));
    logger.write_line("");

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if let Some(logger) = LOGGER.get() {
            logger.write_line(&format_line(Level::Error, "panic", &format!("PANIC: {}", info)));
            logger.flush();
        }
        prev(info);
    }));
}

fn format_line(level: Level, target: &str, msg: &str) -> String {
    format!("[{}] [{}] [{}] {}", timestamp(), level, target, msg)
}

fn log_file_path() -> PathBuf {
    data_dir().join("TextureFE").join("texturefe.log")
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

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// HH:MM:SS (UTC) within the current day.
fn timestamp() -> String {
    let secs = unix_secs();
    format!("{:02}:{:02}:{:02}", (secs % 86400) / 3600, (secs % 3600) / 60, secs % 60)
}
