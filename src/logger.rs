//! Structured console logging with box-drawing layout.
//!
//! All output of the library and the binary goes through the macros defined
//! here. Logging can be disabled at runtime (JSON output mode, tests), debug
//! lines are gated separately, and output can be redirected to a file through a
//! background writer thread.
//!
//! When a simulated time source is installed every line carries the simulated
//! timestamp, so fast-forwarded schedules read like a real run.

use std::io::Write;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Sender, channel};

static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);
static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

// Channel for routing output to a file when --log is active
static LOG_CHANNEL: OnceLock<Option<Sender<LogMessage>>> = OnceLock::new();

enum LogMessage {
    Formatted(String),
    Shutdown,
}

/// Logging switchboard.
///
/// ## Conventions
///
/// - **`log_block_start!`** opens a new conceptual block (node started, schedule
///   armed, table computed). Prints a spacer pipe then `┣ message`.
/// - **`log_decorated!`** continues a block: `┣ message`.
/// - **`log_indented!`** nests details under the previous line: `┃   message`.
/// - **`log_pipe!`** inserts a single `┃` spacer.
/// - **`log_version!`** / **`log_end!`** frame a whole run.
/// - **`log_info!`, `log_warning!`, `log_error!`, `log_debug!`** carry a
///   `[LEVEL]` tag. `log_debug!` prints only after `Log::set_debug(true)`.
pub struct Log;

impl Log {
    /// Enable or disable all output.
    pub fn set_enabled(enabled: bool) {
        LOGGING_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled() -> bool {
        LOGGING_ENABLED.load(Ordering::SeqCst)
    }

    /// Enable or disable `log_debug!` output.
    pub fn set_debug(enabled: bool) {
        DEBUG_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_debug() -> bool {
        Self::is_enabled() && DEBUG_ENABLED.load(Ordering::SeqCst)
    }

    /// Start file logging to the specified path.
    pub fn start_file_logging(file_path: String) -> anyhow::Result<LoggerGuard> {
        let (tx, rx) = channel();

        LOG_CHANNEL
            .set(Some(tx.clone()))
            .map_err(|_| anyhow::anyhow!("Logger channel already initialized"))?;

        let handle = std::thread::spawn(move || {
            let mut file = std::fs::File::create(&file_path)?;

            loop {
                match rx.recv() {
                    Ok(LogMessage::Formatted(text)) => {
                        file.write_all(text.as_bytes())?;
                    }
                    Ok(LogMessage::Shutdown) | Err(_) => {
                        file.flush()?;
                        break;
                    }
                }
            }

            Ok::<(), anyhow::Error>(())
        });

        Ok(LoggerGuard {
            tx,
            handle: Some(handle),
        })
    }

    /// Timestamp prefix for simulated runs, empty otherwise.
    pub fn get_timestamp_prefix() -> String {
        if crate::time::source::is_initialized() && crate::time::source::is_simulated() {
            let now = crate::time::source::now();
            format!("[{}] ", now.format("%Y-%m-%d %H:%M:%S"))
        } else {
            String::new()
        }
    }
}

/// Guard for file logging that flushes and joins the writer on drop.
pub struct LoggerGuard {
    tx: Sender<LogMessage>,
    handle: Option<std::thread::JoinHandle<anyhow::Result<()>>>,
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(LogMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == 'm' {
                    break;
                }
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Route a formatted line to the log file or stdout (used by the macros).
pub fn write_output(text: &str) {
    if let Some(Some(tx)) = LOG_CHANNEL.get() {
        let _ = tx.send(LogMessage::Formatted(strip_ansi_codes(text)));
    } else {
        print!("{text}");
        let _ = std::io::stdout().flush();
    }
}

/// Shared expansion for all line macros: `$layout` receives the prefix and message.
#[doc(hidden)]
#[macro_export]
macro_rules! __log_line {
    ($gate:expr, $layout:literal, $($arg:tt)*) => {{
        if $gate {
            let prefix = $crate::logger::Log::get_timestamp_prefix();
            let message = format!($($arg)*);
            let formatted = format!($layout, prefix = prefix, message = message);
            $crate::logger::write_output(&formatted);
        }
    }};
}

/// Log a decorated message as part of an existing block.
#[macro_export]
macro_rules! log_decorated {
    ($($arg:tt)*) => {
        $crate::__log_line!($crate::logger::Log::is_enabled(), "{prefix}┣ {message}\n", $($arg)*)
    };
}

/// Log an indented detail line.
#[macro_export]
macro_rules! log_indented {
    ($($arg:tt)*) => {
        $crate::__log_line!($crate::logger::Log::is_enabled(), "{prefix}┃   {message}\n", $($arg)*)
    };
}

/// Log a visual pipe separator for vertical spacing.
#[macro_export]
macro_rules! log_pipe {
    () => {
        $crate::__log_line!($crate::logger::Log::is_enabled(), "{prefix}┃{message}\n", "")
    };
}

/// Start a new block of related log lines.
#[macro_export]
macro_rules! log_block_start {
    ($($arg:tt)*) => {
        $crate::__log_line!(
            $crate::logger::Log::is_enabled(),
            "{prefix}┃\n{prefix}┣ {message}\n",
            $($arg)*
        )
    };
}

/// Log the application version header.
#[macro_export]
macro_rules! log_version {
    () => {
        $crate::__log_line!(
            $crate::logger::Log::is_enabled(),
            "{prefix}┏ suntimer v{message} ━━╸\n",
            "{}",
            env!("CARGO_PKG_VERSION")
        )
    };
}

/// Log the final termination marker.
#[macro_export]
macro_rules! log_end {
    () => {
        $crate::__log_line!($crate::logger::Log::is_enabled(), "{prefix}╹{message}\n", "")
    };
}

/// Log a warning in yellow.
#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)*) => {
        $crate::__log_line!(
            $crate::logger::Log::is_enabled(),
            "{prefix}┣[\x1b[33mWARNING\x1b[0m] {message}\n",
            $($arg)*
        )
    };
}

/// Log an error in red.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::__log_line!(
            $crate::logger::Log::is_enabled(),
            "{prefix}┣[\x1b[31mERROR\x1b[0m] {message}\n",
            $($arg)*
        )
    };
}

/// Log an error that terminates the current flow.
#[macro_export]
macro_rules! log_error_exit {
    ($($arg:tt)*) => {
        $crate::__log_line!(
            $crate::logger::Log::is_enabled(),
            "{prefix}┃\n{prefix}┗[\x1b[31mERROR\x1b[0m] {message}\n",
            $($arg)*
        )
    };
}

/// Log an informational message in green.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::__log_line!(
            $crate::logger::Log::is_enabled(),
            "{prefix}┣[\x1b[32mINFO\x1b[0m] {message}\n",
            $($arg)*
        )
    };
}

/// Log a debug message; silent unless debug output is enabled.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::__log_line!(
            $crate::logger::Log::is_debug(),
            "{prefix}┣[\x1b[36mDEBUG\x1b[0m] {message}\n",
            $($arg)*
        )
    };
}
