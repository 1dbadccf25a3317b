//! File logging for taskweave runs.
//!
//! Records go to `~/.taskweave/taskweave.log`, which is truncated at startup.
//! INFO and above are always written. `--debug` or `TASKWEAVE_DEBUG=1` adds
//! per-node traversal records, and `TASKWEAVE_DEBUG=trace` also adds full
//! prompts and completions.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static LOGGER: OnceLock<Logger> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };
        f.write_str(label)
    }
}

/// Parse a `TASKWEAVE_DEBUG` value into the most verbose level it enables.
fn level_from_env(value: &str) -> Option<Level> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "debug" => Some(Level::Debug),
        "trace" => Some(Level::Trace),
        _ => None,
    }
}

/// Appends timestamped records at or below `max` to one file.
#[derive(Debug)]
pub struct Logger {
    path: PathBuf,
    max: Level,
}

impl Logger {
    pub fn new(path: impl Into<PathBuf>, max: Level) -> Self {
        Self {
            path: path.into(),
            max,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn enabled(&self, level: Level) -> bool {
        level <= self.max
    }

    pub fn append(&self, level: Level, args: fmt::Arguments<'_>) {
        if !self.enabled(level) {
            return;
        }
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let stamp = chrono::Local::now().format("%H:%M:%S%.3f");
            let _ = writeln!(file, "[{}] [{}] {}", stamp, level, args);
        }
    }
}

/// Install the process-wide logger. Later calls are ignored.
pub fn init(debug: bool) {
    let from_env = std::env::var("TASKWEAVE_DEBUG")
        .ok()
        .and_then(|v| level_from_env(&v));
    let max = match (debug, from_env) {
        (_, Some(level)) => level,
        (true, None) => Level::Debug,
        (false, None) => Level::Info,
    };

    let Some(dir) = dirs::home_dir().map(|h| h.join(".taskweave")) else {
        return;
    };
    let _ = std::fs::create_dir_all(&dir);
    let path = dir.join("taskweave.log");
    let _ = std::fs::write(&path, "");
    let _ = LOGGER.set(Logger::new(path, max));
}

/// Write through the installed logger; a no-op before `init`.
pub fn write(level: Level, args: fmt::Arguments<'_>) {
    if let Some(logger) = LOGGER.get() {
        logger.append(level, args);
    }
}

#[macro_export]
macro_rules! twlog {
    ($($arg:tt)*) => {
        $crate::log::write($crate::log::Level::Info, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! twlog_error {
    ($($arg:tt)*) => {
        $crate::log::write($crate::log::Level::Error, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! twlog_warn {
    ($($arg:tt)*) => {
        $crate::log::write($crate::log::Level::Warn, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! twlog_debug {
    ($($arg:tt)*) => {
        $crate::log::write($crate::log::Level::Debug, format_args!($($arg)*))
    };
}

/// Prompts and raw completions.
#[macro_export]
macro_rules! twlog_trace {
    ($($arg:tt)*) => {
        $crate::log::write($crate::log::Level::Trace, format_args!($($arg)*))
    };
}
