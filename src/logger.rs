//! Session log for RetroPaint.
//!
//! One file per session, truncated on every `init()`:
//!   Windows:  `%APPDATA%\RetroPaint\retropaint.log`
//!   Linux:    `~/.local/share/RetroPaint/retropaint.log`
//!   macOS:    `~/Library/Application Support/RetroPaint/retropaint.log`
//!
//! Use the `log_info!` / `log_warn!` / `log_err!` / `log_debug!` macros from
//! anywhere in the crate.  Before `init()` has run every macro is a no-op,
//! which keeps the library silent inside unit tests.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

static LOG_FILE: OnceLock<Mutex<File>> = OnceLock::new();
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();
static ECHO_STDERR: AtomicBool = AtomicBool::new(false);

/// Path of the current session log, if `init()` succeeded.
pub fn log_path() -> Option<&'static PathBuf> {
    LOG_PATH.get()
}

/// Mirror every log line to stderr as well (CLI `--verbose`).
pub fn set_echo_stderr(enabled: bool) {
    ECHO_STDERR.store(enabled, Ordering::Relaxed);
}

pub fn echo_enabled() -> bool {
    ECHO_STDERR.load(Ordering::Relaxed)
}

/// Append a raw line.  I/O errors are swallowed.
pub fn write_line(line: &str) {
    if echo_enabled() {
        eprintln!("{}", line);
    }
    if let Some(mutex) = LOG_FILE.get() {
        let mut file = mutex.lock().unwrap_or_else(|e| e.into_inner());
        let _ = writeln!(file, "{}", line);
    }
}

/// Append a timestamped, level-tagged line.
pub fn write(level: &str, msg: &str) {
    if LOG_FILE.get().is_none() && !echo_enabled() {
        return;
    }
    write_line(&format!("[{}] [{}] {}", timestamp(), level, msg));
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write("INFO", &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write("WARN", &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write("ERROR", &format!($($arg)*))
    };
}

/// Only emitted when stderr echo is on; skipped for the file otherwise.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if $crate::logger::echo_enabled() {
            $crate::logger::write("DEBUG", &format!($($arg)*))
        }
    };
}

/// Open (truncating) the session log and install the panic hook.
pub fn init() {
    let path = log_file_path();

    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path);

    match file {
        Ok(f) => {
            let _ = LOG_PATH.set(path.clone());
            let _ = LOG_FILE.set(Mutex::new(f));
        }
        Err(e) => {
            eprintln!("[logger] cannot open {:?}: {}", path, e);
            return;
        }
    }

    write_line(&format!(
        "=== RetroPaint {} session started {} ===",
        env!("CARGO_PKG_VERSION"),
        human_timestamp()
    ));
    write_line(&format!("Log file: {}", path.display()));
    write_line("");

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write_line(&format!("[{}] [PANIC] {}", timestamp(), info));
        prev(info);
    }));
}

fn log_file_path() -> PathBuf {
    data_dir().join("RetroPaint").join("retropaint.log")
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
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support");
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

/// HH:MM:SS (UTC) within the current day.
fn timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => format_clock(d.as_secs()),
        Err(_) => "??:??:??".to_string(),
    }
}

fn format_clock(secs: u64) -> String {
    let h = (secs % 86400) / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    format!("{:02}:{:02}:{:02}", h, m, s)
}

fn human_timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => format!("(unix {})", d.as_secs()),
        Err(_) => "(unknown time)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_wraps_at_midnight() {
        assert_eq!(format_clock(0), "00:00:00");
        assert_eq!(format_clock(3661), "01:01:01");
        assert_eq!(format_clock(86400 + 59), "00:00:59");
    }

    #[test]
    fn writing_before_init_is_silent() {
        write("INFO", "nobody is listening");
        log_info!("still {}", "fine");
    }
}
