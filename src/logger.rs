//! Terminal output: `[module] message` lines and the rebuild status block.
//!
//! ```ignore
//! log!("build"; "fetching missing package {}", package);
//! debug!("watch"; "{} files tracked", count);   // --verbose only
//! status_success("rebuilt in 1.2s");
//! status_error("build failed", "app/controllers/app.go:12: undefined: x");
//! ```

use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType},
};
use owo_colors::OwoColorize;
use parking_lot::Mutex;
use std::{
    io::{Write, stdout},
    sync::atomic::{AtomicBool, Ordering},
    time::SystemTime,
};

static VERBOSE: AtomicBool = AtomicBool::new(false);

pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::Relaxed);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

/// `log!("module"; "format {}", args)`
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Like `log!`, printed only with `--verbose`.
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

pub fn log(module: &str, message: &str) {
    let prefix = module_prefix(module);
    let mut stdout = stdout().lock();
    execute!(stdout, Clear(ClearType::UntilNewLine)).ok();
    writeln!(stdout, "{prefix} {message}").ok();
    stdout.flush().ok();
}

fn module_prefix(module: &str) -> String {
    let prefix = format!("[{module}]");
    match module {
        "harness" | "proxy" => prefix.bright_blue().bold().to_string(),
        "watch" => prefix.bright_green().bold().to_string(),
        "app" => prefix.bright_magenta().bold().to_string(),
        "error" => prefix.bright_red().bold().to_string(),
        "warn" => prefix.yellow().bold().to_string(),
        _ => prefix.bright_yellow().bold().to_string(),
    }
}

/// UTC wall clock as `HH:MM:SS`.
fn clock(now: SystemTime) -> String {
    let secs = now
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!(
        "{:02}:{:02}:{:02}",
        (secs / 3600) % 24,
        (secs / 60) % 60,
        secs % 60
    )
}

/// Outcome of the latest rebuild, redrawn in place.
///
/// Only the block printed by the previous outcome is erased, so a fixed
/// build replaces the stale compiler error on screen.
struct RebuildStatus {
    /// Height of the block printed last.
    drawn: usize,
}

static REBUILD_STATUS: Mutex<RebuildStatus> = Mutex::new(RebuildStatus { drawn: 0 });

impl RebuildStatus {
    fn show(&mut self, symbol: String, message: &str) {
        let mut stdout = stdout().lock();
        if self.drawn > 0 {
            let lines = u16::try_from(self.drawn).unwrap_or(u16::MAX);
            execute!(stdout, cursor::MoveUp(lines), Clear(ClearType::FromCursorDown)).ok();
        }

        let stamp = format!("[{}]", clock(SystemTime::now())).dimmed().to_string();
        writeln!(stdout, "{stamp} {symbol} {message}").ok();
        stdout.flush().ok();

        self.drawn = block_height(message);
    }
}

fn block_height(message: &str) -> usize {
    message.lines().count().max(1)
}

pub fn status_success(message: &str) {
    REBUILD_STATUS
        .lock()
        .show("✓".green().to_string(), message);
}

/// Print `summary` with the compiler output in `detail` below it.
pub fn status_error(summary: &str, detail: &str) {
    let message = match detail.trim_end() {
        "" => summary.to_string(),
        detail => format!("{summary}\n{detail}"),
    };
    REBUILD_STATUS.lock().show("✗".red().to_string(), &message);
}
