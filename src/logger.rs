//! Session log for the `memerist` binary.
//!
//! One file per run, truncated on start:
//!   Windows:  `%APPDATA%\Memerist\memerist.log`
//!   Linux:    `~/.local/share/Memerist/memerist.log`
//!   macOS:    `~/Library/Application Support/Memerist/memerist.log`
//!
//! Use the `log_info!` / `log_warn!` / `log_err!` macros.  Before [`init`]
//! (library use, unit tests) every call is a no-op.  With `echo` on, lines
//! are mirrored to stderr as well.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
    Panic,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Panic => "PANIC",
        })
    }
}

struct Sink {
    file: Mutex<File>,
    path: PathBuf,
    echo: bool,
}

static SINK: OnceLock<Sink> = OnceLock::new();

/// Path of this run's log, once [`init`] succeeded.
pub fn log_path() -> Option<&'static PathBuf> {
    SINK.get().map(|s| &s.path)
}

fn format_line(secs: u64, level: Level, msg: &str) -> String {
    let (h, m, s) = ((secs % 86_400) / 3600, (secs % 3600) / 60, secs % 60);
    format!("[{:02}:{:02}:{:02}] [{}] {}", h, m, s, level, msg)
}

fn raw_line(line: &str) {
    let Some(sink) = SINK.get() else { return };
    if let Ok(mut file) = sink.file.lock() {
        let _ = writeln!(file, "{}", line);
    }
    if sink.echo {
        eprintln!("{}", line);
    }
}

/// Append one timestamped line.  I/O errors are dropped.
pub fn write(level: Level, msg: &str) {
    if SINK.get().is_none() {
        return;
    }
    raw_line(&format_line(unix_seconds(), level, msg));
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Info, &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Warn, &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Error, &format!($($arg)*));
    };
}

/// Open (truncating) the session log and hook panics into it.
///
/// A log that can't be opened is reported on stderr and logging stays off.
pub fn init(echo: bool) {
    let path = data_dir().join("Memerist").join("memerist.log");
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let file = match OpenOptions::new().create(true).write(true).truncate(true).open(&path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("[logger] cannot open {}: {}", path.display(), e);
            return;
        }
    };
    if SINK.set(Sink { file: Mutex::new(file), path: path.clone(), echo }).is_err() {
        return;
    }

    raw_line(&format!("=== Memerist {} (unix {}) ===", env!("CARGO_PKG_VERSION"), unix_seconds()));
    raw_line(&format!("Log file: {}", path.display()));

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write(Level::Panic, &info.to_string());
        prev(info);
    }));
}

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
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".local").join("share")))
        .unwrap_or_else(|_| PathBuf::from("."))
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_carries_time_of_day_and_level() {
        // 1 day + 01:02:03
        let secs = 86_400 + 3600 + 2 * 60 + 3;
        assert_eq!(format_line(secs, Level::Warn, "low on fonts"), "[01:02:03] [WARN] low on fonts");
        assert_eq!(format_line(0, Level::Error, "x"), "[00:00:00] [ERROR] x");
    }

    #[test]
    fn logging_before_init_is_silent() {
        log_info!("nobody is listening {}", 1);
        assert!(log_path().is_none());
    }
}
